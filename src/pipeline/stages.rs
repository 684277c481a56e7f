//! The built-in pipeline stages, in execution order.

use std::error::Error as StdError;
use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, HeaderMap, HeaderValue, Method};
use axum::response::Response;
use futures_util::future::BoxFuture;
use http_body_util::LengthLimitError;
use serde_json::{Map, Value};

use crate::error::ApiError;
use crate::pipeline::{RequestContext, Stage};
use crate::routing::RouteTable;
use crate::security::csrf::CsrfGuard;
use crate::security::rate_limit::{ceil_secs, RateLimiter};
use crate::security::session::SessionStore;
use crate::validation::{coerce_form_integers, validate, ValidationInput};

/// Fixed-window limit for requests under the API prefix.
pub struct RateLimitStage {
    limiter: Arc<RateLimiter>,
    api_prefix: String,
}

impl RateLimitStage {
    pub fn new(limiter: Arc<RateLimiter>, api_prefix: impl Into<String>) -> Self {
        Self {
            limiter,
            api_prefix: api_prefix.into(),
        }
    }
}

impl Stage for RateLimitStage {
    fn name(&self) -> &'static str {
        "rate_limit"
    }

    fn run<'a>(&'a self, ctx: &'a mut RequestContext) -> BoxFuture<'a, Result<(), ApiError>> {
        Box::pin(async move {
            if ctx.is_under(&self.api_prefix) {
                ctx.rate_status = Some(self.limiter.check(&ctx.client_ip)?);
            }
            Ok(())
        })
    }

    fn after(&self, ctx: &RequestContext, response: &mut Response) {
        let Some(status) = ctx.rate_status else {
            return;
        };
        let headers = response.headers_mut();
        headers.insert("ratelimit-limit", HeaderValue::from(status.limit));
        headers.insert("ratelimit-remaining", HeaderValue::from(status.remaining));
        headers.insert("ratelimit-reset", HeaderValue::from(ceil_secs(status.reset_after)));
    }
}

/// Attach the server-side session; store it and set the cookie afterwards.
pub struct SessionStage {
    sessions: Arc<SessionStore>,
}

impl SessionStage {
    pub fn new(sessions: Arc<SessionStore>) -> Self {
        Self { sessions }
    }
}

impl Stage for SessionStage {
    fn name(&self) -> &'static str {
        "session"
    }

    fn run<'a>(&'a self, ctx: &'a mut RequestContext) -> BoxFuture<'a, Result<(), ApiError>> {
        Box::pin(async move {
            ctx.session = Some(self.sessions.load(&ctx.headers));
            Ok(())
        })
    }

    fn after(&self, ctx: &RequestContext, response: &mut Response) {
        let Some(session) = &ctx.session else {
            return;
        };
        if let Some(cookie) = self.sessions.persist(session) {
            match HeaderValue::from_str(&cookie) {
                Ok(value) => {
                    response.headers_mut().append(header::SET_COOKIE, value);
                }
                Err(e) => tracing::error!(error = %e, "Session cookie is not a valid header value"),
            }
        }
    }
}

/// Double-submit token check for state-changing API requests.
pub struct CsrfStage {
    guard: Arc<CsrfGuard>,
    api_prefix: String,
}

impl CsrfStage {
    pub fn new(guard: Arc<CsrfGuard>, api_prefix: impl Into<String>) -> Self {
        Self {
            guard,
            api_prefix: api_prefix.into(),
        }
    }
}

impl Stage for CsrfStage {
    fn name(&self) -> &'static str {
        "csrf"
    }

    fn run<'a>(&'a self, ctx: &'a mut RequestContext) -> BoxFuture<'a, Result<(), ApiError>> {
        Box::pin(async move {
            if !ctx.is_under(&self.api_prefix) || self.guard.is_exempt(&ctx.method, ctx.path()) {
                return Ok(());
            }

            let token = self.guard.token_from_headers(&ctx.headers);
            let verdict = match &ctx.session {
                Some(session) => self.guard.verify(session, token),
                None => Err(ApiError::csrf()),
            };

            if verdict.is_err() {
                tracing::error!(
                    ip = %ctx.client_ip,
                    path = %ctx.original_url(),
                    method = %ctx.method,
                    token_present = token.is_some(),
                    "CSRF attack detected"
                );
            }
            verdict
        })
    }
}

/// Read and decode JSON or urlencoded bodies.
pub struct BodyStage {
    limit: usize,
}

impl BodyStage {
    pub fn new(limit: usize) -> Self {
        Self { limit }
    }
}

fn declared_length(headers: &HeaderMap) -> Option<usize> {
    headers
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse().ok())
}

fn content_type(headers: &HeaderMap) -> String {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(';').next())
        .map(|v| v.trim().to_ascii_lowercase())
        .unwrap_or_default()
}

const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

/// Whether a body read failed on the size limit rather than on I/O.
fn exceeds_limit(err: &axum::Error) -> bool {
    let mut source: Option<&(dyn StdError + 'static)> = Some(err);
    while let Some(e) = source {
        if e.is::<LengthLimitError>() {
            return true;
        }
        source = e.source();
    }
    false
}

/// Decode `bytes` per content type. Unknown types yield `Null`.
pub fn parse_body(content_type: &str, bytes: &[u8]) -> Result<Value, ApiError> {
    if bytes.is_empty() {
        return Ok(Value::Null);
    }
    if content_type == "application/json" || content_type.ends_with("+json") {
        return serde_json::from_slice(bytes).map_err(|e| {
            ApiError::bad_request(format!("Malformed JSON body: {}", e))
        });
    }
    if content_type == FORM_CONTENT_TYPE {
        let form: Map<String, Value> = url::form_urlencoded::parse(bytes)
            .into_owned()
            .map(|(k, v)| (k, Value::String(v)))
            .collect();
        return Ok(Value::Object(form));
    }
    Ok(Value::Null)
}

impl Stage for BodyStage {
    fn name(&self) -> &'static str {
        "body"
    }

    fn run<'a>(&'a self, ctx: &'a mut RequestContext) -> BoxFuture<'a, Result<(), ApiError>> {
        Box::pin(async move {
            let raw = ctx.raw_body.take().unwrap_or_else(Body::empty);
            if matches!(ctx.method, Method::GET | Method::HEAD | Method::OPTIONS) {
                return Ok(());
            }

            if declared_length(&ctx.headers).is_some_and(|len| len > self.limit) {
                return Err(ApiError::payload_too_large(self.limit));
            }

            let bytes = axum::body::to_bytes(raw, self.limit).await.map_err(|e| {
                if exceeds_limit(&e) {
                    ApiError::payload_too_large(self.limit)
                } else {
                    ApiError::bad_request(format!("Could not read request body: {}", e))
                }
            })?;

            let content_type = content_type(&ctx.headers);
            ctx.form_body = content_type == FORM_CONTENT_TYPE;
            ctx.body = parse_body(&content_type, &bytes)?;
            Ok(())
        })
    }
}

/// Resolve the route; unmatched paths are a 404.
pub struct RouteStage {
    table: Arc<RouteTable>,
}

impl RouteStage {
    pub fn new(table: Arc<RouteTable>) -> Self {
        Self { table }
    }
}

impl Stage for RouteStage {
    fn name(&self) -> &'static str {
        "route"
    }

    fn run<'a>(&'a self, ctx: &'a mut RequestContext) -> BoxFuture<'a, Result<(), ApiError>> {
        Box::pin(async move {
            let matched = self.table.resolve(&ctx.method, ctx.path()).ok_or_else(|| {
                ApiError::not_found(format!("Cannot find {} on this server", ctx.original_url()))
            })?;
            ctx.route = Some(matched.route);
            ctx.params = matched.params;
            Ok(())
        })
    }
}

/// Run the matched route's field rules.
pub struct ValidateStage;

impl Stage for ValidateStage {
    fn name(&self) -> &'static str {
        "validate"
    }

    fn run<'a>(&'a self, ctx: &'a mut RequestContext) -> BoxFuture<'a, Result<(), ApiError>> {
        Box::pin(async move {
            let Some(route) = &ctx.route else {
                return Ok(());
            };
            if ctx.form_body {
                coerce_form_integers(&route.rules, &mut ctx.body);
            }
            let input = ValidationInput {
                body: &ctx.body,
                params: &ctx.params,
                query: &ctx.query,
            };
            validate(&route.rules, &input).into_result()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;
    use serde_json::json;

    fn context(method: Method, content_type: &str, body: Body) -> RequestContext {
        let (parts, body) = Request::builder()
            .method(method)
            .uri("/api/questions")
            .header(header::CONTENT_TYPE, content_type)
            .body(body)
            .unwrap()
            .into_parts();
        RequestContext::new(parts, body, "127.0.0.1".to_string())
    }

    #[tokio::test]
    async fn test_undeclared_oversized_body_is_payload_too_large() {
        let mut ctx = context(Method::POST, "application/json", Body::from(vec![b'a'; 4096]));
        assert!(declared_length(&ctx.headers).is_none());

        let err = BodyStage::new(1024).run(&mut ctx).await.unwrap_err();
        assert_eq!(err.status(), axum::http::StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(err.code(), "ERR_PAYLOAD_TOO_LARGE");
    }

    #[tokio::test]
    async fn test_form_body_is_flagged() {
        let mut ctx = context(
            Method::POST,
            "application/x-www-form-urlencoded; charset=utf-8",
            Body::from("questionNumber=7"),
        );
        BodyStage::new(1024).run(&mut ctx).await.unwrap();
        assert!(ctx.form_body);
        assert_eq!(ctx.body["questionNumber"], "7");

        let mut ctx = context(Method::POST, "application/json", Body::from(r#"{"questionNumber":"7"}"#));
        BodyStage::new(1024).run(&mut ctx).await.unwrap();
        assert!(!ctx.form_body);
    }

    #[test]
    fn test_parse_json_body() {
        let value = parse_body("application/json", br#"{"a":1}"#).unwrap();
        assert_eq!(value, json!({ "a": 1 }));
    }

    #[test]
    fn test_malformed_json_is_bad_request() {
        let err = parse_body("application/json", b"{nope").unwrap_err();
        assert_eq!(err.code(), "ERR_BAD_REQUEST");
    }

    #[test]
    fn test_parse_urlencoded_body() {
        let value = parse_body("application/x-www-form-urlencoded", b"answer=Paris&category=geo").unwrap();
        assert_eq!(value["answer"], "Paris");
        assert_eq!(value["category"], "geo");
    }

    #[test]
    fn test_unknown_or_empty_body_is_null() {
        assert_eq!(parse_body("text/plain", b"hello").unwrap(), Value::Null);
        assert_eq!(parse_body("application/json", b"").unwrap(), Value::Null);
    }
}
