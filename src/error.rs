//! Application error model.
//!
//! Every failure that reaches a client is an [`ApiError`]. Each variant
//! carries exactly the fields its class of failure needs, and every variant
//! resolves to an HTTP status and a machine-readable `ERR_*` code.
//!
//! # Operational vs. internal
//! - Operational errors are anticipated (bad input, missing record, CSRF
//!   mismatch) and their message is safe to show to the caller.
//! - [`ApiError::Internal`] wraps anything unclassified. It maps to
//!   500/`ERR_SERVER` and its message is redacted in production.

use std::borrow::Cow;
use std::fmt;

use axum::http::StatusCode;
use serde::Serialize;
use serde_json::Value;

/// Canonical error codes.
pub mod codes {
    pub const BAD_REQUEST: &str = "ERR_BAD_REQUEST";
    pub const VALIDATION: &str = "ERR_VALIDATION";
    pub const UNAUTHORIZED: &str = "ERR_UNAUTHORIZED";
    pub const FORBIDDEN: &str = "ERR_FORBIDDEN";
    pub const CSRF: &str = "ERR_CSRF";
    pub const NOT_FOUND: &str = "ERR_NOT_FOUND";
    pub const PAYLOAD_TOO_LARGE: &str = "ERR_PAYLOAD_TOO_LARGE";
    pub const RATE_LIMIT: &str = "ERR_RATE_LIMIT";
    pub const TIMEOUT: &str = "ERR_TIMEOUT";
    pub const SERVER: &str = "ERR_SERVER";
}

/// A single failed field constraint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

type Code = Cow<'static, str>;

/// Typed application error.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ApiError {
    #[error("{message}")]
    BadRequest { message: String, code: Code },

    #[error("{message}")]
    Validation {
        message: String,
        details: Vec<FieldError>,
    },

    #[error("{message}")]
    Unauthorized { message: String, code: Code },

    #[error("{message}")]
    Forbidden { message: String, code: Code },

    /// Missing or mismatched anti-forgery token.
    #[error("Invalid or missing CSRF token")]
    Csrf,

    #[error("{message}")]
    NotFound { message: String, code: Code },

    #[error("Request body exceeds the {limit} byte limit")]
    PayloadTooLarge { limit: usize },

    #[error("Too many requests from this IP, please try again in {retry_after_secs} seconds")]
    RateLimited { retry_after_secs: u64 },

    #[error("Request did not complete within {secs} seconds")]
    Timeout { secs: u64 },

    #[error("{message}")]
    Server { message: String, code: Code },

    /// Operational error with an arbitrary status.
    #[error("{message}")]
    Custom {
        message: String,
        status: StatusCode,
        code: Code,
        details: Option<Value>,
    },

    /// Unclassified failure. Never safe to describe to the client.
    #[error("{message}")]
    Internal { message: String, stack: String },
}

impl ApiError {
    /// Build an operational error from its raw parts.
    ///
    /// `code` defaults to `ERR_<status>` when omitted.
    pub fn new(
        message: impl Into<String>,
        status: StatusCode,
        code: Option<&'static str>,
        details: Option<Value>,
    ) -> Self {
        let code = match code {
            Some(code) => Cow::Borrowed(code),
            None => Cow::Owned(format!("ERR_{}", status.as_u16())),
        };
        Self::Custom {
            message: message.into(),
            status,
            code,
            details,
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest {
            message: message.into(),
            code: Cow::Borrowed(codes::BAD_REQUEST),
        }
    }

    pub fn validation(details: Vec<FieldError>) -> Self {
        Self::Validation {
            message: "Validation failed".to_string(),
            details,
        }
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::Unauthorized {
            message: message.into(),
            code: Cow::Borrowed(codes::UNAUTHORIZED),
        }
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::Forbidden {
            message: message.into(),
            code: Cow::Borrowed(codes::FORBIDDEN),
        }
    }

    pub fn csrf() -> Self {
        Self::Csrf
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound {
            message: message.into(),
            code: Cow::Borrowed(codes::NOT_FOUND),
        }
    }

    pub fn payload_too_large(limit: usize) -> Self {
        Self::PayloadTooLarge { limit }
    }

    pub fn rate_limited(retry_after_secs: u64) -> Self {
        Self::RateLimited { retry_after_secs }
    }

    pub fn timeout(secs: u64) -> Self {
        Self::Timeout { secs }
    }

    pub fn server_error(message: impl Into<String>) -> Self {
        Self::Server {
            message: message.into(),
            code: Cow::Borrowed(codes::SERVER),
        }
    }

    /// Wrap an unexpected failure, capturing a backtrace for the logs.
    pub fn internal(error: impl fmt::Display) -> Self {
        Self::Internal {
            message: error.to_string(),
            stack: std::backtrace::Backtrace::force_capture().to_string(),
        }
    }

    /// Replace the default code of a code-carrying variant.
    pub fn with_code(self, new_code: &'static str) -> Self {
        let new_code = Cow::Borrowed(new_code);
        match self {
            Self::BadRequest { message, .. } => Self::BadRequest { message, code: new_code },
            Self::Unauthorized { message, .. } => Self::Unauthorized { message, code: new_code },
            Self::Forbidden { message, .. } => Self::Forbidden { message, code: new_code },
            Self::NotFound { message, .. } => Self::NotFound { message, code: new_code },
            Self::Server { message, .. } => Self::Server { message, code: new_code },
            Self::Custom {
                message,
                status,
                details,
                ..
            } => Self::Custom {
                message,
                status,
                code: new_code,
                details,
            },
            other => other,
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest { .. } | Self::Validation { .. } => StatusCode::BAD_REQUEST,
            Self::Unauthorized { .. } => StatusCode::UNAUTHORIZED,
            Self::Forbidden { .. } | Self::Csrf => StatusCode::FORBIDDEN,
            Self::NotFound { .. } => StatusCode::NOT_FOUND,
            Self::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            Self::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            Self::Timeout { .. } => StatusCode::REQUEST_TIMEOUT,
            Self::Server { .. } | Self::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Custom { status, .. } => *status,
        }
    }

    pub fn code(&self) -> &str {
        match self {
            Self::BadRequest { code, .. }
            | Self::Unauthorized { code, .. }
            | Self::Forbidden { code, .. }
            | Self::NotFound { code, .. }
            | Self::Server { code, .. }
            | Self::Custom { code, .. } => code,
            Self::Validation { .. } => codes::VALIDATION,
            Self::Csrf => codes::CSRF,
            Self::PayloadTooLarge { .. } => codes::PAYLOAD_TOO_LARGE,
            Self::RateLimited { .. } => codes::RATE_LIMIT,
            Self::Timeout { .. } => codes::TIMEOUT,
            Self::Internal { .. } => codes::SERVER,
        }
    }

    /// Structured payload attached to the error, if any.
    pub fn details(&self) -> Option<Value> {
        match self {
            Self::Validation { details, .. } => serde_json::to_value(details).ok(),
            Self::Custom { details, .. } => details.clone(),
            _ => None,
        }
    }

    pub fn is_operational(&self) -> bool {
        !matches!(self, Self::Internal { .. })
    }

    /// Captured backtrace of an internal error.
    pub fn stack(&self) -> Option<&str> {
        match self {
            Self::Internal { stack, .. } => Some(stack),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(e: serde_json::Error) -> Self {
        Self::internal(e)
    }
}
