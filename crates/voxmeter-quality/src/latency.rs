//! Agent response latency: time from a finalized user utterance to the
//! start of the agent's synthesized audio.

use std::fmt;
use std::time::Instant;

use tracing::{debug, warn};

use crate::millis_f64;

/// Which pipeline signal closed a latency measurement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseTrigger {
    /// Explicit "synthesis started" signal. Preferred.
    ResponseStarted,
    /// First synthesized-audio chunk delivered after the utterance.
    AudioChunk,
}

impl fmt::Display for ResponseTrigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ResponseStarted => f.write_str("response_started"),
            Self::AudioChunk => f.write_str("audio_chunk"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum TrackerState {
    #[default]
    Idle,
    AwaitingResponse {
        since: Instant,
    },
}

/// Two-state latency tracker: Idle / AwaitingResponse.
///
/// Only the first completion signal after an utterance records a sample,
/// so wiring both `ResponseStarted` and audio chunks never double counts.
/// An utterance that never gets a response stays parked until the next
/// utterance overwrites it.
#[derive(Debug, Default)]
pub struct ResponseLatencyTracker {
    state: TrackerState,
    samples_ms: Vec<f64>,
}

impl ResponseLatencyTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Idle -> AwaitingResponse. Replaces any unconsumed utterance boundary.
    pub fn utterance_completed(&mut self, now: Instant) {
        if let TrackerState::AwaitingResponse { .. } = self.state {
            debug!("Previous utterance never got a response, overwriting boundary");
        }
        self.state = TrackerState::AwaitingResponse { since: now };
    }

    /// AwaitingResponse -> Idle, recording the round trip. No-op while Idle.
    ///
    /// Returns the recorded sample in milliseconds.
    pub fn complete(&mut self, now: Instant, trigger: ResponseTrigger) -> Option<f64> {
        let TrackerState::AwaitingResponse { since } = self.state else {
            return None;
        };
        if now < since {
            warn!(%trigger, "Response timestamp precedes utterance end, recording zero latency");
        }
        let rtt_ms = millis_f64(now.saturating_duration_since(since));
        self.samples_ms.push(rtt_ms);
        self.state = TrackerState::Idle;
        debug!(%trigger, rtt_ms, "Recorded agent response latency");
        Some(rtt_ms)
    }

    pub fn is_awaiting(&self) -> bool {
        matches!(self.state, TrackerState::AwaitingResponse { .. })
    }

    /// Recorded samples in measurement order.
    pub fn samples_ms(&self) -> &[f64] {
        &self.samples_ms
    }

    /// Mean latency, or 0.0 with no samples.
    pub fn average_ms(&self) -> f64 {
        if self.samples_ms.is_empty() {
            return 0.0;
        }
        self.samples_ms.iter().sum::<f64>() / self.samples_ms.len() as f64
    }

    /// 95th percentile latency, or 0.0 with no samples.
    pub fn p95_ms(&self) -> f64 {
        let mut sorted = self.samples_ms.clone();
        sorted.sort_by(f64::total_cmp);
        percentile_nearest_rank(&sorted, 0.95).unwrap_or(0.0)
    }
}

/// Percentile of ascending `sorted` values at index `floor(p * (n - 1))`.
pub fn percentile_nearest_rank(sorted: &[f64], p: f64) -> Option<f64> {
    if sorted.is_empty() {
        return None;
    }
    let idx = (p.clamp(0.0, 1.0) * (sorted.len() - 1) as f64).floor() as usize;
    sorted.get(idx.min(sorted.len() - 1)).copied()
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn test_idle_completion_is_noop() {
        let mut tracker = ResponseLatencyTracker::new();
        assert!(!tracker.is_awaiting());
        assert_eq!(
            tracker.complete(Instant::now(), ResponseTrigger::ResponseStarted),
            None
        );
        assert!(tracker.samples_ms().is_empty());
    }

    #[test]
    fn test_single_measurement() {
        let t0 = Instant::now();
        let mut tracker = ResponseLatencyTracker::new();
        tracker.utterance_completed(t0);
        assert!(tracker.is_awaiting());

        let rtt = tracker
            .complete(t0 + Duration::from_millis(300), ResponseTrigger::AudioChunk)
            .unwrap();
        assert!((rtt - 300.0).abs() < 1e-6);
        assert!(!tracker.is_awaiting());
    }

    #[test]
    fn test_first_trigger_wins() {
        let t0 = Instant::now();
        let mut tracker = ResponseLatencyTracker::new();
        tracker.utterance_completed(t0);
        tracker.complete(t0 + Duration::from_millis(250), ResponseTrigger::ResponseStarted);
        tracker.complete(t0 + Duration::from_millis(400), ResponseTrigger::AudioChunk);

        assert_eq!(tracker.samples_ms().len(), 1);
        assert!((tracker.samples_ms()[0] - 250.0).abs() < 1e-6);
    }

    #[test]
    fn test_new_utterance_overwrites_pending() {
        let t0 = Instant::now();
        let mut tracker = ResponseLatencyTracker::new();
        tracker.utterance_completed(t0);
        tracker.utterance_completed(t0 + Duration::from_secs(2));
        tracker.complete(t0 + Duration::from_millis(2100), ResponseTrigger::ResponseStarted);

        assert_eq!(tracker.samples_ms().len(), 1);
        assert!((tracker.samples_ms()[0] - 100.0).abs() < 1e-6);
    }

    #[test]
    fn test_backwards_response_records_zero() {
        let t0 = Instant::now() + Duration::from_secs(1);
        let mut tracker = ResponseLatencyTracker::new();
        tracker.utterance_completed(t0);
        let rtt = tracker.complete(t0 - Duration::from_millis(10), ResponseTrigger::ResponseStarted);
        assert_eq!(rtt, Some(0.0));
    }

    #[test]
    fn test_average_and_p95() {
        let t0 = Instant::now();
        let mut tracker = ResponseLatencyTracker::new();
        assert_eq!(tracker.average_ms(), 0.0);
        assert_eq!(tracker.p95_ms(), 0.0);

        for ms in [400u64, 100, 300, 200] {
            tracker.utterance_completed(t0);
            tracker.complete(t0 + Duration::from_millis(ms), ResponseTrigger::ResponseStarted);
        }
        // insertion order is preserved
        assert!((tracker.samples_ms()[0] - 400.0).abs() < 1e-6);
        assert!((tracker.average_ms() - 250.0).abs() < 1e-6);
        // floor(0.95 * 3) = 2 -> third smallest
        assert!((tracker.p95_ms() - 300.0).abs() < 1e-6);
    }

    #[test]
    fn test_percentile_nearest_rank() {
        assert_eq!(percentile_nearest_rank(&[], 0.95), None);
        assert_eq!(percentile_nearest_rank(&[7.0], 0.95), Some(7.0));

        let hundred: Vec<f64> = (1..=100).map(f64::from).collect();
        // floor(0.95 * 99) = 94
        assert_eq!(percentile_nearest_rank(&hundred, 0.95), Some(95.0));
        assert_eq!(percentile_nearest_rank(&hundred, 0.0), Some(1.0));
        assert_eq!(percentile_nearest_rank(&hundred, 1.0), Some(100.0));
    }
}
