//! Metrics collection and exposition.
//!
//! # Metrics
//! - `exchange_traces_started_total` (counter): trace files opened
//! - `exchange_traces_failed_total` (counter): exchanges served untraced
//!   because no trace file could be created
//! - `exchange_traces_completed_total` (counter): traces finalized
//! - `exchange_trace_duration_seconds` (histogram): trace start to close

use std::net::SocketAddr;
use std::time::Duration;

use metrics_exporter_prometheus::PrometheusBuilder;

pub const TRACES_STARTED: &str = "exchange_traces_started_total";
pub const TRACES_FAILED: &str = "exchange_traces_failed_total";
pub const TRACES_COMPLETED: &str = "exchange_traces_completed_total";
pub const TRACE_DURATION: &str = "exchange_trace_duration_seconds";

/// Install the Prometheus exporter with its own HTTP listener.
///
/// Must be called from within a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => {
            ::metrics::describe_counter!(TRACES_STARTED, "Trace files opened");
            ::metrics::describe_counter!(TRACES_FAILED, "Exchanges served without a trace");
            ::metrics::describe_counter!(TRACES_COMPLETED, "Traces finalized");
            ::metrics::describe_histogram!(TRACE_DURATION, "Time from trace start to close");
            tracing::info!(address = %addr, "Metrics endpoint listening");
        }
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_trace_started() {
    ::metrics::counter!(TRACES_STARTED).increment(1);
}

pub fn record_trace_failed() {
    ::metrics::counter!(TRACES_FAILED).increment(1);
}

pub fn record_trace_completed(elapsed: Duration) {
    ::metrics::counter!(TRACES_COMPLETED).increment(1);
    ::metrics::histogram!(TRACE_DURATION).record(elapsed.as_secs_f64());
}
