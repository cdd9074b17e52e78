//! Metrics collection and exposition.
//!
//! # Metrics
//! - `gate_denials_total` (counter): rejected requests by `reason`
//! - `gate_logins_total` (counter): login attempts by `outcome`
//! - `gate_sessions_terminated_total` (counter): forced logouts by `reason`
//! - `gate_audit_write_failures_total` (counter): audit entries a sink lost
//!
//! Recording is a no-op until a recorder is installed, so library users and
//! tests pay nothing when the exporter is disabled.

use std::net::SocketAddr;

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

/// Install the Prometheus recorder and its scrape listener.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;

    ::metrics::describe_counter!("gate_denials_total", "Requests rejected by a gate stage");
    ::metrics::describe_counter!("gate_logins_total", "Admin login attempts by outcome");
    ::metrics::describe_counter!(
        "gate_sessions_terminated_total",
        "Admin sessions terminated by the session guard"
    );
    ::metrics::describe_counter!(
        "gate_audit_write_failures_total",
        "Security log entries that could not be persisted"
    );

    tracing::info!(address = %addr, "Metrics endpoint listening");
    Ok(())
}

pub fn record_denial(reason: &'static str) {
    ::metrics::counter!("gate_denials_total", "reason" => reason).increment(1);
}

pub fn record_login(outcome: &'static str) {
    ::metrics::counter!("gate_logins_total", "outcome" => outcome).increment(1);
}

pub fn record_session_terminated(reason: &'static str) {
    ::metrics::counter!("gate_sessions_terminated_total", "reason" => reason).increment(1);
}

pub fn record_audit_write_failure() {
    ::metrics::counter!("gate_audit_write_failures_total").increment(1);
}
