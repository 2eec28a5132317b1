//! Metrics collection and exposition.
//!
//! # Metrics
//! - `gateway_requests_total` (counter): fetch requests by outcome
//!   (success, denied, blocked, upstream_error, internal_error)
//! - `gateway_denials_total` (counter): validator denials by code
//! - `gateway_rate_limited_total` (counter): admission rejections
//! - `gateway_request_duration_seconds` (histogram): request latency
//!
//! # Design Decisions
//! - Low-overhead metric updates (atomic operations)
//! - Prometheus exporter runs on its own listener, off the request path

use std::net::SocketAddr;
use std::time::Instant;

use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus exporter on the given address.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(error = %e, "Failed to install metrics exporter"),
    }
}

/// Record a completed fetch request.
pub fn record_request(outcome: &'static str, start: Instant) {
    metrics::counter!("gateway_requests_total", "outcome" => outcome).increment(1);
    metrics::histogram!("gateway_request_duration_seconds").record(start.elapsed().as_secs_f64());
}

/// Record a validator denial by its stable code.
pub fn record_denied(code: &'static str) {
    metrics::counter!("gateway_denials_total", "code" => code).increment(1);
}

/// Record an admission-control rejection.
pub fn record_rate_limited() {
    metrics::counter!("gateway_rate_limited_total").increment(1);
}
