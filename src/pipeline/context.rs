//! Per-request state threaded through the pipeline stages.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use axum::body::Body;
use axum::http::{request::Parts, HeaderMap, Method, Uri};
use serde_json::Value;

use crate::routing::{PathParams, Route};
use crate::security::rate_limit::RateStatus;
use crate::security::session::Session;

/// Everything the stages learn about one request.
///
/// Built from the raw request, then enriched in place: each stage fills
/// in the fields it owns and later stages read them.
pub struct RequestContext {
    pub method: Method,
    pub uri: Uri,
    pub headers: HeaderMap,
    pub client_ip: String,
    pub request_id: String,
    pub started: Instant,

    /// Decoded query string. Repeated keys keep the last value.
    pub query: HashMap<String, String>,

    /// Unread body; taken by the body stage.
    pub raw_body: Option<Body>,
    /// Parsed body, `Null` when absent.
    pub body: Value,
    /// The body was urlencoded, so every value arrived as text.
    pub form_body: bool,

    pub rate_status: Option<RateStatus>,
    pub session: Option<Session>,
    pub route: Option<Arc<Route>>,
    pub params: PathParams,
}

impl RequestContext {
    pub fn new(parts: Parts, body: Body, client_ip: String) -> Self {
        let request_id = parts
            .headers
            .get("x-request-id")
            .and_then(|v| v.to_str().ok())
            .unwrap_or("unknown")
            .to_string();

        let query = parts
            .uri
            .query()
            .map(|q| url::form_urlencoded::parse(q.as_bytes()).into_owned().collect())
            .unwrap_or_default();

        Self {
            method: parts.method,
            uri: parts.uri,
            headers: parts.headers,
            client_ip,
            request_id,
            started: Instant::now(),
            query,
            raw_body: Some(body),
            body: Value::Null,
            form_body: false,
            rate_status: None,
            session: None,
            route: None,
            params: PathParams::new(),
        }
    }

    pub fn path(&self) -> &str {
        self.uri.path()
    }

    /// Path plus query, as the client sent it.
    pub fn original_url(&self) -> &str {
        self.uri
            .path_and_query()
            .map(|pq| pq.as_str())
            .unwrap_or_else(|| self.uri.path())
    }

    /// Route pattern for metrics labels; never the raw path.
    pub fn route_label(&self) -> &str {
        self.route
            .as_ref()
            .map(|route| route.pattern.as_str())
            .unwrap_or("unmatched")
    }

    /// Whether the path is inside `prefix` (segment-aware).
    pub fn is_under(&self, prefix: &str) -> bool {
        let prefix = prefix.trim_end_matches('/');
        let path = self.path();
        path == prefix
            || path
                .strip_prefix(prefix)
                .is_some_and(|rest| rest.starts_with('/'))
    }
}
