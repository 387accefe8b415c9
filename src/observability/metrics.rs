//! Metrics collection and exposition.
//!
//! # Metrics
//! - `relay_sessions_total` (counter): sessions accepted
//! - `relay_sessions_closed_total` (counter): sessions ended, by outcome
//! - `relay_active_sessions` (gauge): current session count
//! - `relay_exchanges_total` (counter): completed request/response pairs
//! - `relay_bytes_total` (counter): bytes written, by direction
//! - `relay_errors_total` (counter): session errors, by kind
//!
//! # Design Decisions
//! - Recording goes through the `metrics` facade; without an installed
//!   recorder every call is a no-op
//! - The Prometheus exporter is opt-in

use std::net::SocketAddr;

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

/// Install the Prometheus recorder and its scrape listener.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics exporter listening");
    Ok(())
}

pub fn record_session_opened() {
    ::metrics::counter!("relay_sessions_total").increment(1);
}

pub fn record_session_closed(outcome: &'static str) {
    ::metrics::counter!("relay_sessions_closed_total", "outcome" => outcome).increment(1);
}

pub fn set_active_sessions(count: u64) {
    ::metrics::gauge!("relay_active_sessions").set(count as f64);
}

pub fn record_exchange() {
    ::metrics::counter!("relay_exchanges_total").increment(1);
}

pub fn record_bytes(direction: &'static str, bytes: usize) {
    ::metrics::counter!("relay_bytes_total", "direction" => direction).increment(bytes as u64);
}

pub fn record_error(kind: &'static str) {
    ::metrics::counter!("relay_errors_total", "kind" => kind).increment(1);
}
