//! Jitter and packet-loss inference from TTS chunk delivery cadence.
//!
//! Chunks are expected to arrive back-to-back as they are produced, so the
//! playback duration of the previous chunk is the expected spacing to the
//! next one. A gap well beyond that spacing is read as dropped or delayed
//! deliveries.

use std::time::Instant;

use tracing::warn;

use crate::millis_f64;

/// Below this expected spacing (ms) no missing chunks are inferred.
const MIN_EXPECTED_SPACING_MS: f64 = 1.0;

/// Arrival of the most recent chunk.
#[derive(Debug, Clone, Copy)]
struct ChunkArrival {
    at: Instant,
    duration_ms: f64,
}

/// What a single chunk delivery contributed to the running statistics.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChunkObservation {
    /// Playback duration of this chunk.
    pub duration_ms: f64,
    /// Chunks inferred missing between the previous delivery and this one.
    pub missing: u64,
    /// Absolute deviation from the expected spacing. `None` for the first chunk.
    pub jitter_ms: Option<f64>,
}

/// Running jitter/loss accumulator for one call.
#[derive(Debug, Default)]
pub struct JitterLossEstimator {
    packets_expected: u64,
    packets_received: u64,
    jitter_ms_sum: f64,
    jitter_samples: u64,
    prev: Option<ChunkArrival>,
}

impl JitterLossEstimator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Account for one chunk of `duration_ms` delivered at `now`.
    pub fn record_chunk(&mut self, duration_ms: f64, now: Instant) -> ChunkObservation {
        let observation = match self.prev {
            Some(prev) => {
                if now < prev.at {
                    warn!("Audio chunk timestamp went backwards, treating gap as zero");
                }
                let gap_ms = millis_f64(now.saturating_duration_since(prev.at));
                let expected_ms = prev.duration_ms;

                let missing = if expected_ms > MIN_EXPECTED_SPACING_MS {
                    ((gap_ms - expected_ms).max(0.0) / expected_ms).floor() as u64
                } else {
                    0
                };

                self.packets_expected += 1 + missing;
                self.packets_received += 1;

                let jitter_ms = (gap_ms - expected_ms).abs();
                self.jitter_ms_sum += jitter_ms;
                self.jitter_samples += 1;

                ChunkObservation {
                    duration_ms,
                    missing,
                    jitter_ms: Some(jitter_ms),
                }
            }
            None => {
                self.packets_expected += 1;
                self.packets_received += 1;
                ChunkObservation {
                    duration_ms,
                    missing: 0,
                    jitter_ms: None,
                }
            }
        };

        self.prev = Some(ChunkArrival {
            at: now,
            duration_ms,
        });
        observation
    }

    pub fn packets_expected(&self) -> u64 {
        self.packets_expected
    }

    pub fn packets_received(&self) -> u64 {
        self.packets_received
    }

    pub fn jitter_samples(&self) -> u64 {
        self.jitter_samples
    }

    /// Inferred lost chunks, never negative.
    pub fn lost(&self) -> u64 {
        self.packets_expected.saturating_sub(self.packets_received)
    }

    /// Mean absolute jitter in ms, or 0.0 before the second chunk.
    pub fn jitter_ms_avg(&self) -> f64 {
        if self.jitter_samples > 0 {
            self.jitter_ms_sum / self.jitter_samples as f64
        } else {
            0.0
        }
    }

    /// Fraction of expected chunks inferred lost, in [0, 1].
    pub fn packet_loss_rate(&self) -> f64 {
        if self.packets_expected > 0 {
            self.lost() as f64 / self.packets_expected as f64
        } else {
            0.0
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn test_first_chunk_has_no_jitter_sample() {
        let mut est = JitterLossEstimator::new();
        let obs = est.record_chunk(20.0, Instant::now());
        assert_eq!(obs.missing, 0);
        assert!(obs.jitter_ms.is_none());
        assert_eq!(est.packets_expected(), 1);
        assert_eq!(est.packets_received(), 1);
        assert_eq!(est.jitter_samples(), 0);
        assert_eq!(est.jitter_ms_avg(), 0.0);
        assert_eq!(est.packet_loss_rate(), 0.0);
    }

    #[test]
    fn test_back_to_back_chunks() {
        let t0 = Instant::now();
        let mut est = JitterLossEstimator::new();
        est.record_chunk(20.0, t0);
        let obs = est.record_chunk(20.0, t0 + Duration::from_millis(20));
        assert_eq!(obs.missing, 0);
        assert!(obs.jitter_ms.unwrap() < 1e-9);
        assert_eq!(est.packet_loss_rate(), 0.0);
    }

    #[test]
    fn test_gap_of_three_durations_infers_two_missing() {
        let t0 = Instant::now();
        let mut est = JitterLossEstimator::new();
        est.record_chunk(20.0, t0);
        let obs = est.record_chunk(20.0, t0 + Duration::from_millis(60));
        assert_eq!(obs.missing, 2);
        assert_eq!(est.packets_expected(), 4);
        assert_eq!(est.packets_received(), 2);
        assert_eq!(est.lost(), 2);
        assert!((est.packet_loss_rate() - 0.5).abs() < 1e-9);
        assert!((est.jitter_ms_avg() - 40.0).abs() < 1e-9);
    }

    #[test]
    fn test_expected_spacing_uses_previous_chunk() {
        let t0 = Instant::now();
        let mut est = JitterLossEstimator::new();
        est.record_chunk(40.0, t0);
        // 60 ms gap after a 40 ms chunk: (60 - 40) / 40 floors to 0
        let obs = est.record_chunk(10.0, t0 + Duration::from_millis(60));
        assert_eq!(obs.missing, 0);
        assert!((obs.jitter_ms.unwrap() - 20.0).abs() < 1e-9);
        // next spacing is the 10 ms chunk: 35 ms gap -> 2 missing
        let obs = est.record_chunk(10.0, t0 + Duration::from_millis(95));
        assert_eq!(obs.missing, 2);
    }

    #[test]
    fn test_early_arrival_counts_jitter_not_loss() {
        let t0 = Instant::now();
        let mut est = JitterLossEstimator::new();
        est.record_chunk(20.0, t0);
        let obs = est.record_chunk(20.0, t0 + Duration::from_millis(5));
        assert_eq!(obs.missing, 0);
        assert!((obs.jitter_ms.unwrap() - 15.0).abs() < 1e-9);
    }

    #[test]
    fn test_tiny_chunks_never_infer_loss() {
        let t0 = Instant::now();
        let mut est = JitterLossEstimator::new();
        est.record_chunk(0.5, t0);
        let obs = est.record_chunk(0.5, t0 + Duration::from_secs(2));
        assert_eq!(obs.missing, 0);
        assert_eq!(est.packet_loss_rate(), 0.0);
    }

    #[test]
    fn test_backwards_timestamp_clamps_gap() {
        let t0 = Instant::now() + Duration::from_secs(1);
        let mut est = JitterLossEstimator::new();
        est.record_chunk(20.0, t0);
        let obs = est.record_chunk(20.0, t0 - Duration::from_millis(500));
        assert_eq!(obs.missing, 0);
        assert!((obs.jitter_ms.unwrap() - 20.0).abs() < 1e-9);
    }
}
