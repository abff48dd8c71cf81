//! Prometheus metrics recording for call quality snapshots.

use anyhow::Result;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

use crate::actor::CallId;
use crate::outcome::CallOutcomeCounter;
use crate::snapshot::QualitySnapshot;

/// Install the Prometheus metrics recorder and return the handle for rendering.
///
/// Only one recorder can be installed per process.
pub fn install_prometheus_recorder() -> Result<PrometheusHandle> {
    PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| anyhow::anyhow!("Failed to install Prometheus recorder: {e}"))
}

/// Record a call's current quality snapshot as per-call gauges.
///
/// Each call id adds one series per gauge, and the recorder keeps it until
/// the process exits. Repeated snapshots of one call overwrite its series.
/// Long-running processes that handle an unbounded number of calls should
/// use [`render_snapshot`] with a local recorder, or export only
/// [`record_fleet_outcome`] and [`record_response_latency`], which carry no
/// call label.
pub fn record_snapshot(call_id: &CallId, snapshot: &QualitySnapshot) {
    let labels = [("call_id", call_id.to_string())];
    metrics::gauge!("voxmeter_jitter_ms", &labels).set(snapshot.jitter_ms_avg);
    metrics::gauge!("voxmeter_packet_loss_ratio", &labels).set(snapshot.packet_loss_rate);
    metrics::gauge!("voxmeter_mos_estimate", &labels).set(snapshot.mos_estimate);
    metrics::gauge!("voxmeter_agent_response_ms_avg", &labels)
        .set(snapshot.agent_response_time_ms_avg);
    metrics::gauge!("voxmeter_agent_response_ms_p95", &labels)
        .set(snapshot.agent_response_time_ms_p95);
    metrics::gauge!("voxmeter_failed_call_setup_ratio", &labels)
        .set(snapshot.failed_call_setup_rate);
}

/// Render a single snapshot in Prometheus text format without touching the
/// global recorder.
pub fn render_snapshot(call_id: &CallId, snapshot: &QualitySnapshot) -> String {
    let recorder = PrometheusBuilder::new().build_recorder();
    let handle = recorder.handle();
    metrics::with_local_recorder(&recorder, || record_snapshot(call_id, snapshot));
    handle.render()
}

/// Record one agent response latency measurement.
pub fn record_response_latency(rtt_ms: f64) {
    metrics::histogram!("voxmeter_agent_response_seconds").record(rtt_ms / 1000.0);
}

/// Record fleet-wide call setup totals.
pub fn record_fleet_outcome(outcome: &CallOutcomeCounter) {
    metrics::gauge!("voxmeter_calls_attempted").set(outcome.attempted() as f64);
    metrics::gauge!("voxmeter_calls_established").set(outcome.established() as f64);
}
