//! API Server
//!
//! Serves the REST router until the shutdown token fires. The same token is
//! the parent of every request's cancellation token, so in-flight flows stop
//! at their next step when the server shuts down.

use crate::error::{Error, Result};
use crate::response::ResponseBuilder;
use crate::sync::ComponentSynchronizer;
use std::net::SocketAddr;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use super::rest::RestRouter;

// =============================================================================
// Server Configuration
// =============================================================================

/// Configuration for the API server
#[derive(Debug, Clone)]
pub struct ApiServerConfig {
    /// REST API bind address
    pub rest_addr: SocketAddr,
}

impl Default for ApiServerConfig {
    fn default() -> Self {
        Self {
            rest_addr: SocketAddr::from(([0, 0, 0, 0], 8090)),
        }
    }
}

// =============================================================================
// API Server
// =============================================================================

/// REST API server for components
pub struct ApiServer {
    config: ApiServerConfig,
    synchronizer: ComponentSynchronizer,
    responses: ResponseBuilder,
    shutdown: CancellationToken,
}

impl ApiServer {
    /// Create a new API server
    pub fn new(
        config: ApiServerConfig,
        synchronizer: ComponentSynchronizer,
        responses: ResponseBuilder,
    ) -> Self {
        Self {
            config,
            synchronizer,
            responses,
            shutdown: CancellationToken::new(),
        }
    }

    /// Token cancelled on shutdown
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Run the API server until shutdown
    pub async fn run(&self) -> Result<()> {
        info!("Starting component API server");
        info!("  REST API: {}", self.config.rest_addr);

        let handle = self.spawn();
        match handle.await {
            Ok(result) => result,
            Err(e) => {
                error!("REST server task failed: {:?}", e);
                Err(Error::Internal(format!("REST server task failed: {}", e)))
            }
        }
    }

    /// Spawn the REST server
    pub fn spawn(&self) -> tokio::task::JoinHandle<Result<()>> {
        let addr = self.config.rest_addr;
        let router = RestRouter::new(
            self.synchronizer.clone(),
            self.responses.clone(),
            self.shutdown.clone(),
        );
        let shutdown = self.shutdown.clone();

        tokio::spawn(async move { run_rest_server(addr, router, shutdown).await })
    }

    /// Trigger graceful shutdown
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }
}

/// Run the REST API server
async fn run_rest_server(
    addr: SocketAddr,
    router: RestRouter,
    shutdown: CancellationToken,
) -> Result<()> {
    let app = router.build();

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| Error::Internal(format!("Failed to bind REST server: {}", e)))?;

    info!("REST API listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown.cancelled().await;
            info!("REST server shutting down");
        })
        .await
        .map_err(|e| Error::Internal(format!("REST server error: {}", e)))?;

    Ok(())
}
