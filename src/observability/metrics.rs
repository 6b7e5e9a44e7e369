//! Metrics collection and exposition.
//!
//! # Metrics
//! - `formgate_requests_total` (counter): requests by method and status
//! - `formgate_rate_limited_total` (counter): denied by the rate limiter
//! - `formgate_csrf_rejected_total` (counter): rejected by CSRF validation
//! - `formgate_panics_recovered_total` (counter): panics caught by recovery
//! - `formgate_sessions_active` (gauge): live session records

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

/// Install the global Prometheus recorder and return the render handle.
///
/// The recorder is process-global; installing twice fails, so this is only
/// called from `main`. Tests run without a recorder (metric macros become
/// no-ops).
pub fn install() -> Option<PrometheusHandle> {
    match PrometheusBuilder::new().install_recorder() {
        Ok(handle) => Some(handle),
        Err(e) => {
            tracing::warn!(error = %e, "Failed to install metrics recorder");
            None
        }
    }
}

pub fn record_request(method: &str, status: u16) {
    metrics::counter!(
        "formgate_requests_total",
        "method" => method.to_string(),
        "status" => status.to_string(),
    )
    .increment(1);
}

pub fn record_rate_limited() {
    metrics::counter!("formgate_rate_limited_total").increment(1);
}

pub fn record_csrf_rejected() {
    metrics::counter!("formgate_csrf_rejected_total").increment(1);
}

pub fn record_panic_recovered() {
    metrics::counter!("formgate_panics_recovered_total").increment(1);
}

pub fn set_active_sessions(count: usize) {
    metrics::gauge!("formgate_sessions_active").set(count as f64);
}
