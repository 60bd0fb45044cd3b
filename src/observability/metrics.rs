//! Metrics collection and exposition.
//!
//! # Responsibilities
//! - Define server metrics (requests, latency, queue depth, cache, limits)
//! - Expose Prometheus-compatible metrics endpoint
//!
//! # Metrics
//! - `server_requests_total` (counter): requests by method, status
//! - `server_request_duration_seconds` (histogram): latency distribution
//! - `server_queue_depth` (gauge): buffered requests
//! - `server_queue_rejected_total` (counter): answered 503 on a full queue
//! - `server_rate_limited_total` (counter): refused by the rate limiter
//! - `server_file_cache_hits_total` / `server_file_cache_misses_total` (counters)
//! - `server_generation`, `server_routes`, `server_middleware` (gauges): live
//!   configuration generation and its size
//!
//! # Design Decisions
//! - Low-overhead metric updates (atomic operations)
//! - Labels limited to method, status code and reason

use std::net::SocketAddr;
use std::time::Duration;

use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus recorder and its HTTP listener on `addr`.
///
/// Must be called from within a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint started"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to start metrics endpoint"),
    }
}

pub fn record_request(method: &str, status: u16, elapsed: Duration) {
    metrics::counter!(
        "server_requests_total",
        "method" => method.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
    metrics::histogram!("server_request_duration_seconds", "method" => method.to_string())
        .record(elapsed.as_secs_f64());
}

pub fn record_queue_depth(depth: usize) {
    metrics::gauge!("server_queue_depth").set(depth as f64);
}

pub fn record_rate_limited(reason: &'static str) {
    metrics::counter!("server_rate_limited_total", "reason" => reason).increment(1);
}

pub fn record_cache_lookup(hit: bool) {
    if hit {
        metrics::counter!("server_file_cache_hits_total").increment(1);
    } else {
        metrics::counter!("server_file_cache_misses_total").increment(1);
    }
}

pub fn record_queue_rejected() {
    metrics::counter!("server_queue_rejected_total").increment(1);
}

pub fn record_generation(id: u64, routes: usize, middleware: usize) {
    metrics::gauge!("server_generation").set(id as f64);
    metrics::gauge!("server_routes").set(routes as f64);
    metrics::gauge!("server_middleware").set(middleware as f64);
}
