//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Config → Metrics exporter → Data store → Bind listener → Serve
//!
//! Shutdown (shutdown.rs):
//!     Signal received → Stop accepting → Drain in-flight → Close store → Exit
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → ShutdownCoordinator::initiate
//! ```
//!
//! # Design Decisions
//! - Ordered startup: config first, then core, then listeners
//! - Ordered shutdown: stop accept, drain, close
//! - Shutdown has a deadline measured from the first signal; exceeding it
//!   is reported through a distinct exit code

pub mod shutdown;
pub mod signals;
pub mod startup;

pub use shutdown::{Shutdown, ShutdownCoordinator, ShutdownOutcome, ShutdownState};
pub use startup::StartupError;
