//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, tower-http layers, /health)
//!     → pipeline (stages, then handlers.rs)
//!     → response.rs (success replies, error envelopes)
//!     → Send to client
//! ```

pub mod handlers;
pub mod response;
pub mod server;

pub use handlers::ApiHandlers;
pub use response::{ErrorFormatter, Reply};
pub use server::{AppState, HttpServer};
