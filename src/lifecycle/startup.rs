//! Startup orchestration.
//!
//! # Responsibilities
//! - Initialize logging and the metrics exporter from configuration
//! - Open the shared store; an unreachable server is logged, not fatal
//! - Build the pipeline, then bind the listener and serve
//!
//! # Design Decisions
//! - Subsystems initialize in order, not concurrently
//! - Listeners start last (traffic only when ready)

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;

use crate::config::{GatewayConfig, DEV_JWT_SECRET};
use crate::http::HttpServer;
use crate::lifecycle::Shutdown;
use crate::observability::{logging, metrics};
use crate::routing::RouteError;
use crate::store::{RedisStore, SharedStore, StoreError};

#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error("shared store: {0}")]
    Store(#[from] StoreError),
    #[error("route table: {0}")]
    Routes(#[from] RouteError),
    #[error("listener: {0}")]
    Io(#[from] std::io::Error),
}

/// Bring the gateway up and serve until a termination signal.
pub async fn run(config: GatewayConfig) -> Result<(), StartupError> {
    logging::init(&config.observability.log_level);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "edge-gateway starting");

    if config.auth.jwt_secret == DEV_JWT_SECRET {
        tracing::warn!("Using the built-in development JWT secret; set JWT_SECRET in production");
    }

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse::<SocketAddr>() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(e) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                error = %e,
                "Failed to parse metrics address"
            ),
        }
    }

    let store = RedisStore::open(&config.store.url, Duration::from_millis(config.store.op_timeout_ms))?;
    if let Err(e) = store.ping().await {
        tracing::warn!(
            error = %e,
            "Shared store unreachable, serving anyway: rate limiting fails open and protected routes fail closed until it recovers"
        );
    }
    let store: Arc<dyn SharedStore> = Arc::new(store);

    let bind_address = config.listener.bind_address.clone();
    let server = HttpServer::new(config, store)?;

    let listener = TcpListener::bind(&bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let shutdown = Shutdown::new();
    let signal_task = shutdown.trigger_on_signal();

    let result = server.run(listener, shutdown.subscribe()).await;
    signal_task.abort();
    result?;

    tracing::info!("Shutdown complete");
    Ok(())
}
