use std::net::SocketAddr;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{ServerError, ServerResult};

/// Service configuration, loadable from TOML.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_addr: SocketAddr,
    /// Whether missing objects may be autolinked from public sources
    /// instead of requiring an explicit upload.
    pub auto_link: bool,
    /// Per-owner object quota when the plan source has no override.
    pub default_quota_bytes: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:12365".parse().expect("static addr"),
            auto_link: true,
            default_quota_bytes: 2 * 1024 * 1024 * 1024,
        }
    }
}

impl ServerConfig {
    /// Load the configuration from a TOML file.
    pub fn load(path: &Path) -> ServerResult<Self> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| ServerError::Config(format!("read {}: {e}", path.display())))?;
        toml::from_str(&raw)
            .map_err(|e| ServerError::Config(format!("parse {}: {e}", path.display())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let c = ServerConfig::default();
        assert_eq!(c.bind_addr, "127.0.0.1:12365".parse::<SocketAddr>().unwrap());
        assert!(c.auto_link);
        assert_eq!(c.default_quota_bytes, 2 * 1024 * 1024 * 1024);
    }

    #[test]
    fn partial_toml_falls_back_to_defaults() {
        let c: ServerConfig = toml::from_str("auto_link = false").unwrap();
        assert!(!c.auto_link);
        assert_eq!(c.bind_addr, ServerConfig::default().bind_addr);
    }
}
