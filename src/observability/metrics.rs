//! Metrics collection and exposition.
//!
//! # Metrics
//! - `dualport_routed_total` (counter): requests by protocol
//! - `dualport_calls_total` (counter): calls by method, protocol, code
//! - `dualport_call_duration_seconds` (histogram): call latency by method
//! - `dualport_rate_limited_total` (counter): rejected calls by method
//! - `dualport_active_connections` (gauge): open connections

use std::net::SocketAddr;

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

use crate::interceptors::logging::CallRecord;
use crate::mux::Protocol;

/// Start the Prometheus exporter on `addr`.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => {
            tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter")
        }
    }
}

/// Count one request routed to `protocol`.
pub fn record_routed(protocol: Protocol) {
    counter!("dualport_routed_total", "protocol" => protocol.as_str()).increment(1);
}

/// Record the outcome and duration of a completed call.
pub fn record_call(record: &CallRecord) {
    let code = record
        .error
        .as_ref()
        .map(|status| status.code().as_str())
        .unwrap_or("ok");

    counter!(
        "dualport_calls_total",
        "method" => record.method.clone(),
        "protocol" => record.protocol.as_str(),
        "code" => code
    )
    .increment(1);
    histogram!("dualport_call_duration_seconds", "method" => record.method.clone())
        .record(record.duration.as_secs_f64());
}

pub fn record_rate_limited(method: &str) {
    counter!("dualport_rate_limited_total", "method" => method.to_string()).increment(1);
}

pub fn connection_opened() {
    gauge!("dualport_active_connections").increment(1.0);
}

pub fn connection_closed() {
    gauge!("dualport_active_connections").decrement(1.0);
}
