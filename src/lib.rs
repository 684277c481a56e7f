//! Quiz content API gateway library.

pub mod config;
pub mod error;
pub mod health;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod pipeline;
pub mod resources;
pub mod routing;
pub mod security;
pub mod store;
pub mod validation;

pub use config::schema::GatewayConfig;
pub use error::ApiError;
pub use http::HttpServer;
pub use lifecycle::{ShutdownCoordinator, ShutdownOutcome};
