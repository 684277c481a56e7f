//! Metrics collection and exposition.
//!
//! # Responsibilities
//! - Define gateway metrics (requests, latency, security rejections, sessions)
//! - Expose a Prometheus-compatible endpoint when enabled
//!
//! # Metrics
//! - `gateway_requests_total` (counter): requests by method, route, status
//! - `gateway_request_duration_seconds` (histogram): latency distribution
//! - `gateway_rate_limited_total` (counter): 429 rejections
//! - `gateway_csrf_rejections_total` (counter): failed CSRF checks
//! - `gateway_sessions_active` (gauge): stored sessions
//!
//! # Design Decisions
//! - Recording is a no-op until a recorder is installed, so unit tests
//!   and library users pay nothing
//! - Route labels use the route pattern, never the raw path

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

/// Install the Prometheus recorder and its scrape listener.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;

    describe_counter!("gateway_requests_total", "Total requests handled");
    describe_histogram!(
        "gateway_request_duration_seconds",
        metrics::Unit::Seconds,
        "Request latency"
    );
    describe_counter!("gateway_rate_limited_total", "Requests rejected by the rate limiter");
    describe_counter!("gateway_csrf_rejections_total", "Requests rejected by CSRF verification");
    describe_gauge!("gateway_sessions_active", "Sessions held in the store");

    tracing::info!(address = %addr, "Metrics endpoint listening");
    Ok(())
}

/// Record a completed request.
pub fn record_request(method: &str, route: &str, status: u16, start: Instant) {
    let labels = [
        ("method", method.to_string()),
        ("route", route.to_string()),
        ("status", status.to_string()),
    ];
    counter!("gateway_requests_total", &labels[..]).increment(1);
    histogram!("gateway_request_duration_seconds", &labels[..2]).record(start.elapsed().as_secs_f64());
}

pub fn record_rate_limited() {
    counter!("gateway_rate_limited_total").increment(1);
}

pub fn record_csrf_rejection() {
    counter!("gateway_csrf_rejections_total").increment(1);
}

pub fn record_active_sessions(count: usize) {
    gauge!("gateway_sessions_active").set(count as f64);
}
