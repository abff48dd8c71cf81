//! Per-call quality estimator, the session state container.
//!
//! One instance per call, owned by the call's pipeline for its lifetime and
//! dropped when the call ends. All operations are synchronous in-memory
//! arithmetic on caller-supplied timestamps; nothing here blocks, fails, or
//! reorders events. Callers delivering events from several execution
//! contexts must serialize access themselves (see [`crate::actor`]).

use std::time::Instant;

use tracing::{debug, trace};
use voxmeter_core::CallEvent;

use crate::jitter::JitterLossEstimator;
use crate::latency::{ResponseLatencyTracker, ResponseTrigger};
use crate::outcome::CallOutcomeCounter;
use crate::pcm::chunk_duration_ms;
use crate::snapshot::QualitySnapshot;

#[derive(Debug, Default)]
pub struct CallQualityEstimator {
    outcome: CallOutcomeCounter,
    jitter: JitterLossEstimator,
    latency: ResponseLatencyTracker,
}

impl CallQualityEstimator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Call placement or accept initiated. Invoke once per real attempt.
    pub fn record_call_attempted(&mut self) {
        self.outcome.record_attempted();
        debug!(attempted = self.outcome.attempted(), "Call attempted");
    }

    /// Call media path confirmed connected.
    pub fn record_call_established(&mut self) {
        self.outcome.record_established();
        debug!(established = self.outcome.established(), "Call established");
    }

    /// The recognizer finalized a user utterance at `now`.
    pub fn mark_user_utterance_completed(&mut self, now: Instant) {
        self.latency.utterance_completed(now);
        trace!("User utterance completed, awaiting response");
    }

    /// A synthesized-audio chunk was delivered at `now`.
    ///
    /// Feeds the jitter/loss estimator and, if a response is still pending,
    /// closes the latency measurement.
    pub fn record_audio_chunk(
        &mut self,
        byte_count: u64,
        sample_rate_hz: u32,
        channel_count: u16,
        now: Instant,
    ) {
        let duration_ms = chunk_duration_ms(byte_count, sample_rate_hz, channel_count);
        let obs = self.jitter.record_chunk(duration_ms, now);
        trace!(
            byte_count,
            duration_ms,
            missing = obs.missing,
            jitter_ms = obs.jitter_ms,
            "Audio chunk"
        );
        if obs.missing > 0 {
            debug!(missing = obs.missing, "Inferred missing audio chunks");
        }

        self.latency.complete(now, ResponseTrigger::AudioChunk);
    }

    /// Speech synthesis started producing audio at `now`.
    pub fn record_response_started(&mut self, now: Instant) {
        self.latency.complete(now, ResponseTrigger::ResponseStarted);
    }

    /// Route a pipeline event to the matching operation.
    ///
    /// Returns `false` when the event was dropped by intake validation.
    pub fn apply(&mut self, event: &CallEvent, now: Instant) -> bool {
        if !event.is_actionable() {
            debug!(kind = event.kind(), "Ignoring event without content");
            return false;
        }
        match event {
            CallEvent::CallAttempted => self.record_call_attempted(),
            CallEvent::CallEstablished => self.record_call_established(),
            CallEvent::UserUtteranceCompleted { .. } => self.mark_user_utterance_completed(now),
            CallEvent::AudioChunk {
                byte_count,
                sample_rate_hz,
                channel_count,
            } => self.record_audio_chunk(*byte_count, *sample_rate_hz, *channel_count, now),
            CallEvent::ResponseStarted => self.record_response_started(now),
        }
        true
    }

    /// Current metrics. Does not mutate state.
    pub fn metrics(&self) -> QualitySnapshot {
        QualitySnapshot::compose(&self.jitter, &self.latency, &self.outcome)
    }

    pub fn is_awaiting_response(&self) -> bool {
        self.latency.is_awaiting()
    }

    /// Latency samples in measurement order.
    pub fn response_latencies_ms(&self) -> &[f64] {
        self.latency.samples_ms()
    }

    pub fn packets_expected(&self) -> u64 {
        self.jitter.packets_expected()
    }

    pub fn packets_received(&self) -> u64 {
        self.jitter.packets_received()
    }

    pub fn outcome(&self) -> CallOutcomeCounter {
        self.outcome
    }
}
