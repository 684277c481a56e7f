//! Startup orchestration.
//!
//! # Responsibilities
//! - Start the metrics exporter when enabled
//! - Connect the data store
//! - Bind the listener and serve until shutdown completes
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - Subsystems initialize in order, not concurrently
//! - The listener binds last (traffic only when ready)

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use metrics_exporter_prometheus::BuildError;
use tokio::net::TcpListener;

use crate::config::GatewayConfig;
use crate::http::HttpServer;
use crate::lifecycle::shutdown::{ShutdownCoordinator, ShutdownOutcome};
use crate::lifecycle::signals;
use crate::observability::metrics;
use crate::resources::questions::QuestionHandler;
use crate::security::KeyError;
use crate::store::{self, StoreError};

/// Fatal startup failures.
#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error("Invalid metrics address '{0}'")]
    MetricsAddress(String),
    #[error("Metrics exporter failed: {0}")]
    Metrics(#[from] BuildError),
    #[error("Data store connection failed: {0}")]
    Store(#[from] StoreError),
    #[error("Security setup failed: {0}")]
    Key(#[from] KeyError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Bring the gateway up and block until it has shut down.
pub async fn run(config: GatewayConfig) -> Result<ShutdownOutcome, StartupError> {
    if config.observability.metrics_enabled {
        let addr: SocketAddr = config
            .observability
            .metrics_address
            .parse()
            .map_err(|_| StartupError::MetricsAddress(config.observability.metrics_address.clone()))?;
        metrics::init_metrics(addr)?;
    }

    let store = store::connect(&config.database).await?;
    tracing::info!(database = %config.database.name, "Data store connected");

    let questions = Arc::new(QuestionHandler::new(store.clone()));

    let listener = TcpListener::bind(&config.server.bind_address).await?;

    let coordinator = Arc::new(ShutdownCoordinator::new(
        store.clone(),
        Duration::from_secs(config.shutdown.deadline_secs),
    ));
    signals::spawn_signal_listener(coordinator.clone());

    let server = HttpServer::new(config, store, questions)?;
    Ok(server.run(listener, coordinator).await?)
}
