//! Metrics collection and exposition.
//!
//! # Metrics
//! - `clearnode_rpc_requests_total` (counter): RPC calls by method, outcome
//! - `clearnode_rpc_duration_seconds` (histogram): time from send to response
//! - `clearnode_connected` (gauge): 1 while the node socket is up
//! - `faucet_transfers_total` (counter): transfers by outcome
//!
//! # Design Decisions
//! - Recording goes through the `metrics` facade; it is a no-op until a
//!   recorder is installed
//! - The Prometheus exporter is opt-in from the binary

use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use std::time::Instant;

/// Install the Prometheus recorder and serve `/metrics` on `addr`.
///
/// Must be called from within a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Prometheus exporter listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install Prometheus exporter"),
    }
}

/// Record one completed RPC call.
pub fn record_rpc(method: &str, outcome: &'static str, start_time: Instant) {
    let method = method.to_string();
    ::metrics::counter!(
        "clearnode_rpc_requests_total",
        "method" => method.clone(),
        "outcome" => outcome
    )
    .increment(1);
    ::metrics::histogram!("clearnode_rpc_duration_seconds", "method" => method)
        .record(start_time.elapsed().as_secs_f64());
}

/// Track node connectivity.
pub fn record_connected(connected: bool) {
    ::metrics::gauge!("clearnode_connected").set(if connected { 1.0 } else { 0.0 });
}

/// Record a transfer outcome (`success` / `failure`).
pub fn record_transfer(outcome: &'static str) {
    ::metrics::counter!("faucet_transfers_total", "outcome" => outcome).increment(1);
}
