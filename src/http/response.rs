//! Response construction.
//!
//! # Responsibilities
//! - Success payloads produced by the API handlers ([`Reply`])
//! - The uniform error envelope ([`ErrorFormatter`])
//!
//! # Design Decisions
//! - Every failure leaves through the formatter, so the envelope shape and
//!   the production redaction rules live in exactly one place
//! - Internal messages and 5xx details never reach clients in production

use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::{json, Map, Value};

use crate::error::ApiError;
use crate::pipeline::RequestContext;

/// Message shown for redacted server errors.
pub const REDACTED_MESSAGE: &str = "Internal server error";

/// Successful handler output.
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    Json { status: StatusCode, body: Value },
    Text { status: StatusCode, body: String },
}

impl Reply {
    pub fn ok(body: Value) -> Self {
        Self::Json {
            status: StatusCode::OK,
            body,
        }
    }

    pub fn created(body: Value) -> Self {
        Self::Json {
            status: StatusCode::CREATED,
            body,
        }
    }

    pub fn text(body: impl Into<String>) -> Self {
        Self::Text {
            status: StatusCode::OK,
            body: body.into(),
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::Json { status, .. } | Self::Text { status, .. } => *status,
        }
    }
}

impl IntoResponse for Reply {
    fn into_response(self) -> Response {
        match self {
            Self::Json { status, body } => (status, Json(body)).into_response(),
            Self::Text { status, body } => (status, body).into_response(),
        }
    }
}

/// Renders errors as `{status:"error", error:{message, code, details?, stack?}}`.
#[derive(Debug, Clone, Copy)]
pub struct ErrorFormatter {
    production: bool,
}

impl ErrorFormatter {
    pub fn new(production: bool) -> Self {
        Self { production }
    }

    /// The JSON envelope for `err`, redacted per execution mode.
    pub fn envelope(&self, err: &ApiError) -> Value {
        let status = err.status();
        let server_error = status.is_server_error();

        let message = if self.production && server_error {
            REDACTED_MESSAGE.to_string()
        } else {
            err.to_string()
        };

        let mut error = Map::new();
        error.insert("message".into(), Value::String(message));
        error.insert("code".into(), Value::String(err.code().to_string()));

        if let Some(details) = err.details() {
            if !self.production || !server_error {
                error.insert("details".into(), details);
            }
        }
        if !self.production {
            if let Some(stack) = err.stack() {
                error.insert("stack".into(), Value::String(stack.to_string()));
            }
        }

        json!({ "status": "error", "error": error })
    }

    /// Log `err` with its request context and build the response.
    pub fn render(&self, err: &ApiError, ctx: &RequestContext) -> Response {
        let status = err.status();
        let details = err.details().map(|d| d.to_string());

        if status.is_server_error() {
            tracing::error!(
                request_id = %ctx.request_id,
                method = %ctx.method,
                path = %ctx.original_url(),
                ip = %ctx.client_ip,
                code = %err.code(),
                status = status.as_u16(),
                details = details.as_deref(),
                stack = err.stack(),
                "{}",
                err
            );
        } else {
            tracing::warn!(
                request_id = %ctx.request_id,
                method = %ctx.method,
                path = %ctx.original_url(),
                ip = %ctx.client_ip,
                code = %err.code(),
                status = status.as_u16(),
                details = details.as_deref(),
                "{}",
                err
            );
        }

        let mut response = (status, Json(self.envelope(err))).into_response();
        if let ApiError::RateLimited { retry_after_secs } = err {
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from(*retry_after_secs));
        }
        response
    }
}
