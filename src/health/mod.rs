//! Health reporting subsystem.
//!
//! # Data Flow
//! ```text
//! GET /health (served beside the pipeline, never rate limited)
//!     → probe.rs (process stats + data store readiness)
//!     → 200 UP / 503 DOWN
//! ```
//!
//! # Design Decisions
//! - DOWN whenever the data store is not ready
//! - Read-only: taking a snapshot never changes state
//! - Host statistics are best effort and omitted where unavailable

pub mod probe;

pub use probe::{HealthProbe, HealthSnapshot, HealthStatus};
