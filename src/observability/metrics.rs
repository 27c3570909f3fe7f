//! Metrics collection and exposition.
//!
//! # Metrics
//! - `router_probe_total` (counter): probes by server, healthy
//! - `router_probe_latency_ms` (histogram): probe wall-clock latency by server
//! - `router_server_healthy` (gauge): 1=healthy, 0=unhealthy
//! - `router_selection_total` (counter): selections by outcome
//! - `router_active_streams` (gauge): currently open streams
//! - `router_stream_errors_total` (counter): stream failures by error kind

use std::net::SocketAddr;

use metrics_exporter_prometheus::PrometheusBuilder;

use crate::diagnostics::ErrorKind;

/// Start the Prometheus exporter on `addr`.
///
/// Must be called from within a tokio runtime.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_probe(server_id: &str, healthy: bool, latency_ms: u64) {
    metrics::counter!(
        "router_probe_total",
        "server" => server_id.to_string(),
        "healthy" => if healthy { "true" } else { "false" }
    )
    .increment(1);
    metrics::histogram!("router_probe_latency_ms", "server" => server_id.to_string()).record(latency_ms as f64);
    metrics::gauge!("router_server_healthy", "server" => server_id.to_string()).set(if healthy { 1.0 } else { 0.0 });
}

/// `outcome` is one of `best`, `fallback`, `hosted`, `none`.
pub fn record_selection(outcome: &'static str) {
    metrics::counter!("router_selection_total", "outcome" => outcome).increment(1);
}

pub fn record_active_streams(count: usize) {
    metrics::gauge!("router_active_streams").set(count as f64);
}

pub fn record_stream_error(kind: ErrorKind) {
    metrics::counter!("router_stream_errors_total", "kind" => kind.label()).increment(1);
}
