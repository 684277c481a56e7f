//! Response hardening headers, CORS and client address resolution.
//!
//! # Responsibilities
//! - Resolve the client IP (peer address or trusted `X-Forwarded-For`)
//! - Build the CORS layer from the configured origin allow-list
//! - Attach hardening headers to every response
//!
//! # Design Decisions
//! - `X-Forwarded-For` is ignored unless `trust_proxy` is set
//! - Headers already set by a handler are never overwritten

use std::net::SocketAddr;

use axum::http::{HeaderMap, HeaderName, HeaderValue, Method};
use axum::Router;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::set_header::SetResponseHeaderLayer;

use crate::config::CorsConfig;
use crate::security::rate_limit::UNKNOWN_CLIENT;

const CONTENT_SECURITY_POLICY: &str = "default-src 'self';script-src 'self' 'unsafe-inline';\
style-src 'self' 'unsafe-inline';img-src 'self' data:;connect-src 'self';font-src 'self';\
object-src 'none';media-src 'self';frame-src 'none';form-action 'self';upgrade-insecure-requests";

const STRICT_TRANSPORT_SECURITY: &str = "max-age=15552000; includeSubDomains; preload";

/// Identify the client for rate limiting and audit logs.
pub fn client_ip(headers: &HeaderMap, peer: Option<SocketAddr>, trust_proxy: bool) -> String {
    if trust_proxy {
        let forwarded = headers
            .get("x-forwarded-for")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .map(str::trim)
            .filter(|v| !v.is_empty());
        if let Some(ip) = forwarded {
            return ip.to_string();
        }
    }

    peer.map(|addr| addr.ip().to_string())
        .unwrap_or_else(|| UNKNOWN_CLIENT.to_string())
}

/// CORS policy restricted to the configured origins.
pub fn cors_layer(config: &CorsConfig) -> CorsLayer {
    let origins: Vec<HeaderValue> = config
        .allowed_origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %origin, "Ignoring unparsable CORS origin");
                None
            }
        })
        .collect();

    let methods: Vec<Method> = config
        .allowed_methods
        .iter()
        .filter_map(|m| m.parse().ok())
        .collect();

    let headers: Vec<HeaderName> = config
        .allowed_headers
        .iter()
        .filter_map(|h| HeaderName::from_bytes(h.as_bytes()).ok())
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods(methods)
        .allow_headers(headers)
        .allow_credentials(config.allow_credentials)
}

/// Hardening headers added to every response.
pub fn security_headers(production: bool) -> Vec<(HeaderName, HeaderValue)> {
    let mut headers = vec![
        ("content-security-policy", CONTENT_SECURITY_POLICY),
        ("cross-origin-embedder-policy", "require-corp"),
        ("cross-origin-opener-policy", "same-origin"),
        ("cross-origin-resource-policy", "same-origin"),
        ("x-dns-prefetch-control", "off"),
        ("x-frame-options", "DENY"),
        ("referrer-policy", "strict-origin-when-cross-origin"),
        ("x-content-type-options", "nosniff"),
        ("x-xss-protection", "0"),
    ];
    if production {
        headers.push(("strict-transport-security", STRICT_TRANSPORT_SECURITY));
    }

    headers
        .into_iter()
        .map(|(name, value)| (HeaderName::from_static(name), HeaderValue::from_static(value)))
        .collect()
}

/// Wrap `router` so every response carries the hardening headers.
pub fn with_security_headers<S>(router: Router<S>, production: bool) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    security_headers(production)
        .into_iter()
        .fold(router, |router, (name, value)| {
            router.layer(SetResponseHeaderLayer::if_not_present(name, value))
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn forwarded(value: &'static str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_static(value));
        headers
    }

    #[test]
    fn test_client_ip_uses_peer_by_default() {
        let peer: SocketAddr = "10.1.2.3:5555".parse().unwrap();
        let headers = forwarded("203.0.113.9");

        assert_eq!(client_ip(&headers, Some(peer), false), "10.1.2.3");
    }

    #[test]
    fn test_client_ip_trusts_left_most_forwarded() {
        let peer: SocketAddr = "10.1.2.3:5555".parse().unwrap();
        let headers = forwarded("203.0.113.9, 10.0.0.1");

        assert_eq!(client_ip(&headers, Some(peer), true), "203.0.113.9");
    }

    #[test]
    fn test_client_ip_unknown_without_peer() {
        assert_eq!(client_ip(&HeaderMap::new(), None, true), UNKNOWN_CLIENT);
    }

    #[test]
    fn test_hsts_only_in_production() {
        let has_hsts = |production| {
            security_headers(production)
                .iter()
                .any(|(name, _)| name == "strict-transport-security")
        };
        assert!(has_hsts(true));
        assert!(!has_hsts(false));
    }
}
