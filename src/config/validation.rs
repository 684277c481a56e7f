//! Semantic configuration checks.
//!
//! Serde handles syntax; this pass checks value ranges, parseability of
//! addresses and origins, and refuses placeholder secrets in production.
//! All problems are reported at once.

use std::fmt;
use std::net::SocketAddr;

use axum::http::{HeaderName, HeaderValue, Method};

use crate::config::schema::{GatewayConfig, DEFAULT_COOKIE_SECRET, DEFAULT_SESSION_SECRET};

/// A single failed configuration check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Validate a loaded configuration, collecting every problem.
pub fn validate_config(config: &GatewayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.server.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "server.bind_address",
            format!("'{}' is not a socket address", config.server.bind_address),
        ));
    }
    if config.server.request_timeout_secs == 0 {
        errors.push(ValidationError::new("server.request_timeout_secs", "must be > 0"));
    }
    if !config.server.api_prefix.starts_with('/') {
        errors.push(ValidationError::new("server.api_prefix", "must start with '/'"));
    }

    let url = config.database.url.as_str();
    if !(url.starts_with("memory://") || url.starts_with("file://")) {
        errors.push(ValidationError::new(
            "database.url",
            format!("unsupported scheme in '{}'", url),
        ));
    }

    if config.security.max_body_size == 0 {
        errors.push(ValidationError::new("security.max_body_size", "must be > 0"));
    }

    if config.rate_limit.window_secs == 0 {
        errors.push(ValidationError::new("rate_limit.window_secs", "must be > 0"));
    }
    if config.rate_limit.max_requests == 0 {
        errors.push(ValidationError::new("rate_limit.max_requests", "must be > 0"));
    }
    if config.rate_limit.sweep_interval_secs == 0 {
        errors.push(ValidationError::new("rate_limit.sweep_interval_secs", "must be > 0"));
    }

    if config.session.ttl_secs == 0 {
        errors.push(ValidationError::new("session.ttl_secs", "must be > 0"));
    }
    if config.session.sweep_interval_secs == 0 {
        errors.push(ValidationError::new("session.sweep_interval_secs", "must be > 0"));
    }
    if config.session.secret.is_empty() {
        errors.push(ValidationError::new("session.secret", "must not be empty"));
    }
    if config.session.cookie_name.is_empty()
        || !config.session.cookie_name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
    {
        errors.push(ValidationError::new("session.cookie_name", "must be a plain token"));
    }
    if config.csrf.secret.is_empty() {
        errors.push(ValidationError::new("csrf.secret", "must not be empty"));
    }
    if HeaderName::try_from(config.csrf.header_name.as_str()).is_err() {
        errors.push(ValidationError::new("csrf.header_name", "is not a valid header name"));
    }

    if config.is_production() {
        if config.session.secret == DEFAULT_SESSION_SECRET {
            errors.push(ValidationError::new("session.secret", "placeholder secret in production"));
        }
        if config.csrf.secret == DEFAULT_COOKIE_SECRET {
            errors.push(ValidationError::new("csrf.secret", "placeholder secret in production"));
        }
    }

    for origin in &config.cors.allowed_origins {
        if origin == "*" || HeaderValue::from_str(origin).is_err() {
            errors.push(ValidationError::new(
                "cors.allowed_origins",
                format!("'{}' is not an explicit origin", origin),
            ));
        }
    }
    for method in &config.cors.allowed_methods {
        if method.parse::<Method>().is_err() {
            errors.push(ValidationError::new(
                "cors.allowed_methods",
                format!("'{}' is not an HTTP method", method),
            ));
        }
    }
    for header in &config.cors.allowed_headers {
        if HeaderName::try_from(header.as_str()).is_err() {
            errors.push(ValidationError::new(
                "cors.allowed_headers",
                format!("'{}' is not a header name", header),
            ));
        }
    }

    if config.shutdown.deadline_secs == 0 {
        errors.push(ValidationError::new("shutdown.deadline_secs", "must be > 0"));
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            "is not a socket address",
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
