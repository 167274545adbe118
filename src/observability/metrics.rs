//! Metrics collection and exposition.
//!
//! # Metrics
//! - `bridge_active_connections` (gauge): live socket connections
//! - `bridge_registered_connections` (gauge): registry size
//! - `bridge_requests_total` (counter): replies sent, by method and status
//! - `bridge_request_duration_seconds` (histogram): pipeline latency
//! - `bridge_rejected_requests_total` (counter): wire events failing validation
//! - `bridge_discarded_responses_total` (counter): responses for closed sockets
//!
//! Without an installed recorder every call is a no-op.

use std::net::SocketAddr;
use std::time::Instant;

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

/// Install the Prometheus recorder and its scrape endpoint.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics endpoint listening");
    Ok(())
}

pub fn record_connection_opened() {
    metrics::gauge!("bridge_active_connections").increment(1.0);
}

pub fn record_connection_closed() {
    metrics::gauge!("bridge_active_connections").decrement(1.0);
}

pub fn record_registry_size(size: usize) {
    metrics::gauge!("bridge_registered_connections").set(size as f64);
}

/// Record a reply delivered to a socket client.
pub fn record_request(method: &str, status: u16, started: Instant) {
    metrics::counter!(
        "bridge_requests_total",
        "method" => method.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
    metrics::histogram!("bridge_request_duration_seconds", "method" => method.to_string())
        .record(started.elapsed().as_secs_f64());
}

pub fn record_rejected(reason: &str) {
    metrics::counter!("bridge_rejected_requests_total", "reason" => reason.to_string()).increment(1);
}

pub fn record_discarded() {
    metrics::counter!("bridge_discarded_responses_total").increment(1);
}
