//! Data store abstraction.
//!
//! # Responsibilities
//! - Expose the readiness and close hooks the health probe and shutdown
//!   coordinator depend on
//! - Map store failures onto the API error model
//!
//! # Design Decisions
//! - The request path talks to resources, never to the store trait; the
//!   trait only carries lifecycle concerns
//! - `close` is async and may fail; callers decide how to surface that

pub mod memory;

use std::sync::Arc;

use axum::http::StatusCode;
use futures_util::future::BoxFuture;

use crate::config::DatabaseConfig;
use crate::error::ApiError;

pub use memory::{Document, MemoryStore};

/// Store failures.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Store is closed")]
    Closed,
    #[error("Snapshot I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("Snapshot is not valid JSON: {0}")]
    Snapshot(#[from] serde_json::Error),
    #[error("Unsupported database url '{0}'")]
    UnsupportedUrl(String),
}

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::Closed => ApiError::new(
                "Database unavailable",
                StatusCode::SERVICE_UNAVAILABLE,
                Some("ERR_DB_UNAVAILABLE"),
                None,
            ),
            other => ApiError::internal(other),
        }
    }
}

/// Lifecycle view of a data store connection.
pub trait DataStore: Send + Sync {
    /// Logical database name.
    fn name(&self) -> &str;

    /// True while the store accepts operations.
    fn is_ready(&self) -> bool;

    /// Release the connection. Safe to call more than once.
    fn close(&self) -> BoxFuture<'_, Result<(), StoreError>>;
}

/// Open the store described by `config.url`.
pub async fn connect(config: &DatabaseConfig) -> Result<Arc<MemoryStore>, StoreError> {
    let store = MemoryStore::open(config).await?;
    tracing::info!(
        name = %config.name,
        url = %config.url,
        documents = store.len(),
        "Connected to data store"
    );
    Ok(Arc::new(store))
}
