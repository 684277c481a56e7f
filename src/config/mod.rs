//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! optional TOML file
//!     → loader.rs (parse & deserialize)
//!     → environment overrides (PORT, DATABASE_URL, secrets, NODE_ENV...)
//!     → validation.rs (semantic checks)
//!     → GatewayConfig (validated, immutable)
//!     → handed to the server constructor at startup
//! ```
//!
//! # Design Decisions
//! - Config is built once at process start and injected; nothing reads
//!   the environment after startup
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, ConfigError};
pub use schema::{
    CorsConfig, CsrfConfig, DatabaseConfig, Environment, GatewayConfig, LogFormat,
    ObservabilityConfig, RateLimitConfig, SecurityConfig, ServerConfig, SessionConfig,
    ShutdownConfig,
};
