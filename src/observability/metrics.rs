//! Metrics collection and exposition.
//!
//! # Metrics
//! - `ruleset_probe_attempts_total` (counter): attempts by behavior, result
//! - `ruleset_probe_attempt_duration_seconds` (histogram): attempt wall time
//! - `ruleset_probe_active_lanes` (gauge): lanes currently draining the queue
//!
//! # Design Decisions
//! - Recording goes through the `metrics` facade and is a no-op until a
//!   recorder is installed
//! - The Prometheus endpoint is opt-in and lives only as long as the run

use std::net::SocketAddr;
use std::time::Duration;

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

use crate::discovery::BehaviorKind;

/// Install the Prometheus recorder and start its HTTP listener.
///
/// Must be called from inside a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics endpoint listening");
    Ok(())
}

pub fn record_attempt(behavior: BehaviorKind, success: bool, elapsed: Duration) {
    let result = if success { "pass" } else { "fail" };
    metrics::counter!(
        "ruleset_probe_attempts_total",
        "behavior" => behavior.as_str(),
        "result" => result
    )
    .increment(1);
    metrics::histogram!(
        "ruleset_probe_attempt_duration_seconds",
        "behavior" => behavior.as_str()
    )
    .record(elapsed.as_secs_f64());
}

pub fn lane_started() {
    metrics::gauge!("ruleset_probe_active_lanes").increment(1.0);
}

pub fn lane_finished() {
    metrics::gauge!("ruleset_probe_active_lanes").decrement(1.0);
}
