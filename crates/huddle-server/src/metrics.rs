//! Metrics collection and export for Huddle.
//!
//! Uses the `metrics` crate for instrumentation and exports
//! to Prometheus format.

use huddle_core::SweepReport;
use metrics::{counter, gauge};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use tracing::info;

/// Metric names.
pub mod names {
    pub const REQUESTS_TOTAL: &str = "huddle_requests_total";
    pub const ERRORS_TOTAL: &str = "huddle_errors_total";
    pub const MESSAGES_TOTAL: &str = "huddle_messages_total";
    pub const REGISTRATIONS_TOTAL: &str = "huddle_registrations_total";
    pub const PARTICIPANTS_ACTIVE: &str = "huddle_participants_active";
}

/// Initialize the metrics system.
pub fn init_metrics() {
    metrics::describe_counter!(names::REQUESTS_TOTAL, "Total number of requests by route");
    metrics::describe_counter!(names::ERRORS_TOTAL, "Total number of error responses by kind");
    metrics::describe_counter!(names::MESSAGES_TOTAL, "Total number of posted messages by kind");
    metrics::describe_counter!(
        names::REGISTRATIONS_TOTAL,
        "Total number of successful registrations"
    );
    metrics::describe_gauge!(
        names::PARTICIPANTS_ACTIVE,
        "Participants currently registered"
    );

    info!("Metrics initialized");
}

/// Start the Prometheus metrics server.
///
/// # Errors
///
/// Returns an error if the server cannot be started.
pub fn start_metrics_server(port: u16) -> Result<(), Box<dyn std::error::Error>> {
    let addr: SocketAddr = format!("0.0.0.0:{}", port).parse()?;

    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()?;

    info!("Metrics server listening on {}", addr);
    Ok(())
}

/// Record a request to `route`.
pub fn record_request(route: &'static str) {
    counter!(names::REQUESTS_TOTAL, "route" => route).increment(1);
}

/// Record an error response.
pub fn record_error(kind: &'static str) {
    counter!(names::ERRORS_TOTAL, "kind" => kind).increment(1);
}

/// Record a posted message.
pub fn record_message(kind: &'static str) {
    counter!(names::MESSAGES_TOTAL, "kind" => kind).increment(1);
}

/// Record a successful registration.
pub fn record_registration() {
    counter!(names::REGISTRATIONS_TOTAL).increment(1);
}

/// Update the active participant gauge.
pub fn set_active_participants(count: usize) {
    gauge!(names::PARTICIPANTS_ACTIVE).set(count as f64);
}

/// A participant registered.
pub fn participant_joined() {
    gauge!(names::PARTICIPANTS_ACTIVE).increment(1.0);
}

/// Account for the participants a sweep removed.
pub fn record_sweep(report: &SweepReport) {
    if report.removed > 0 {
        gauge!(names::PARTICIPANTS_ACTIVE).decrement(report.removed as f64);
    }
}
