use std::collections::HashMap;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;

use trail_gate::InMemoryDeviceDirectory;
use trail_server::auth::{StaticTokenResolver, TokenEntry};
use trail_server::config::ServerConfig;
use trail_server::context::AppContext;
use trail_server::server::TrailServer;

#[derive(Parser)]
#[command(
    name = "trail-server",
    about = "Device trail synchronization service",
    version
)]
struct Args {
    /// Path to a TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the configured bind address.
    #[arg(short, long)]
    bind: Option<SocketAddr>,

    /// TOML file mapping bearer tokens to callers.
    #[arg(long)]
    tokens: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => ServerConfig::load(path)?,
        None => ServerConfig::default(),
    };
    if let Some(bind) = args.bind {
        config.bind_addr = bind;
    }

    let resolver = match &args.tokens {
        Some(path) => {
            let raw = std::fs::read_to_string(path)?;
            let entries: HashMap<String, TokenEntry> = toml::from_str(&raw)?;
            StaticTokenResolver::from_entries(entries)?
        }
        None => StaticTokenResolver::new(),
    };

    let directory = Arc::new(InMemoryDeviceDirectory::new());
    let ctx = AppContext::in_memory(&config, directory, Arc::new(resolver));
    TrailServer::new(config, ctx).serve().await?;
    Ok(())
}
