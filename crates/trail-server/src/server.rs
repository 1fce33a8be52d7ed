use tokio::net::TcpListener;
use tracing::info;

use crate::config::ServerConfig;
use crate::context::AppContext;
use crate::error::{ServerError, ServerResult};
use crate::router::build_router;

/// The trail service HTTP server.
pub struct TrailServer {
    config: ServerConfig,
    ctx: AppContext,
}

impl TrailServer {
    pub fn new(config: ServerConfig, ctx: AppContext) -> Self {
        Self { config, ctx }
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Build the router (useful for testing).
    pub fn router(&self) -> axum::Router {
        build_router(self.ctx.clone())
    }

    /// Start serving requests.
    pub async fn serve(self) -> ServerResult<()> {
        let app = build_router(self.ctx);
        let listener = TcpListener::bind(&self.config.bind_addr)
            .await
            .map_err(|e| ServerError::Internal(e.to_string()))?;
        info!("trail server listening on {}", self.config.bind_addr);
        axum::serve(listener, app)
            .await
            .map_err(|e| ServerError::Internal(e.to_string()))
    }
}
