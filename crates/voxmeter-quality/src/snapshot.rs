//! Point-in-time quality snapshot.

use serde::{Deserialize, Serialize};

use crate::jitter::JitterLossEstimator;
use crate::latency::ResponseLatencyTracker;
use crate::outcome::CallOutcomeCounter;

/// Best achievable MOS estimate.
pub const MOS_MAX: f64 = 4.5;
/// Worst MOS estimate.
pub const MOS_MIN: f64 = 1.0;
/// MOS penalty per unit of packet loss rate.
pub const MOS_LOSS_WEIGHT: f64 = 10.0;
/// Jitter (ms) costing one MOS point.
pub const MOS_JITTER_DIVISOR_MS: f64 = 100.0;

/// Heuristic Mean-Opinion-Score from inferred loss and mean jitter.
///
/// Not an ITU-T E-model; the constants are fixed heuristics.
pub fn mos_estimate(packet_loss_rate: f64, jitter_ms_avg: f64) -> f64 {
    let raw = MOS_MAX - MOS_LOSS_WEIGHT * packet_loss_rate - jitter_ms_avg / MOS_JITTER_DIVISOR_MS;
    raw.clamp(MOS_MIN, MOS_MAX)
}

/// Derived call quality metrics, as handed to reporting sinks.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QualitySnapshot {
    pub jitter_ms_avg: f64,
    pub packet_loss_rate: f64,
    pub mos_estimate: f64,
    pub agent_response_time_ms_avg: f64,
    pub agent_response_time_ms_p95: f64,
    pub failed_call_setup_rate: f64,
    pub calls_attempted: u64,
    pub calls_established: u64,
}

impl QualitySnapshot {
    /// Derive a snapshot from the estimator parts. Reads only.
    pub fn compose(
        jitter: &JitterLossEstimator,
        latency: &ResponseLatencyTracker,
        outcome: &CallOutcomeCounter,
    ) -> Self {
        let jitter_ms_avg = jitter.jitter_ms_avg();
        let packet_loss_rate = jitter.packet_loss_rate();
        Self {
            jitter_ms_avg,
            packet_loss_rate,
            mos_estimate: mos_estimate(packet_loss_rate, jitter_ms_avg),
            agent_response_time_ms_avg: latency.average_ms(),
            agent_response_time_ms_p95: latency.p95_ms(),
            failed_call_setup_rate: outcome.failed_setup_rate(),
            calls_attempted: outcome.attempted(),
            calls_established: outcome.established(),
        }
    }

    /// One-line human readable summary for logs.
    pub fn summary(&self) -> String {
        format!(
            "MOS={:.2} Jitter={:.1}ms Loss={:.1}% Response avg={:.0}ms p95={:.0}ms Setup failures={:.1}% ({}/{})",
            self.mos_estimate,
            self.jitter_ms_avg,
            self.packet_loss_rate * 100.0,
            self.agent_response_time_ms_avg,
            self.agent_response_time_ms_p95,
            self.failed_call_setup_rate * 100.0,
            self.calls_established,
            self.calls_attempted,
        )
    }
}
