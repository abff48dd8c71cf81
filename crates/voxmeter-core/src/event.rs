//! Voice pipeline events: the inbound side of the quality estimator.
//!
//! Events are emitted by the owning pipeline at fixed lifecycle points
//! (call accepted, call answered, utterance finalized, TTS audio delivered,
//! TTS playback started). On disk they are stored as JSON Lines, one
//! [`TimedEvent`] per line.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Result, VoxmeterError};

/// A single pipeline lifecycle event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CallEvent {
    /// Call placement or accept initiated.
    CallAttempted,

    /// Call media path confirmed connected.
    CallEstablished,

    /// Speech recognizer finalized a user utterance.
    UserUtteranceCompleted {
        /// Final transcript, when the recognizer reports one.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        transcript: Option<String>,
    },

    /// A synthesized-audio chunk was delivered toward the caller.
    ///
    /// Format fields omitted from a session log deserialize as 0 and are
    /// filled from configuration by [`CallEvent::fill_audio_defaults`].
    AudioChunk {
        byte_count: u64,
        #[serde(default)]
        sample_rate_hz: u32,
        #[serde(default)]
        channel_count: u16,
    },

    /// Speech synthesis began producing audio for a turn.
    ResponseStarted,
}

impl CallEvent {
    /// Short stable name, used as a log field.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::CallAttempted => "call_attempted",
            Self::CallEstablished => "call_established",
            Self::UserUtteranceCompleted { .. } => "user_utterance_completed",
            Self::AudioChunk { .. } => "audio_chunk",
            Self::ResponseStarted => "response_started",
        }
    }

    /// Whether the event carries information the estimator should act on.
    ///
    /// Utterances only count when the recognizer produced text; a transcript
    /// that is present but blank is dropped. A missing transcript is trusted.
    pub fn is_actionable(&self) -> bool {
        match self {
            Self::UserUtteranceCompleted {
                transcript: Some(text),
            } => !text.trim().is_empty(),
            _ => true,
        }
    }

    /// Replace unset (zero) audio format fields with the given defaults.
    pub fn fill_audio_defaults(&mut self, default_sample_rate_hz: u32, default_channel_count: u16) {
        if let Self::AudioChunk {
            sample_rate_hz,
            channel_count,
            ..
        } = self
        {
            if *sample_rate_hz == 0 {
                *sample_rate_hz = default_sample_rate_hz;
            }
            if *channel_count == 0 {
                *channel_count = default_channel_count;
            }
        }
    }
}

/// An event stamped with its offset from session start, in seconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimedEvent {
    pub at_secs: f64,
    #[serde(flatten)]
    pub event: CallEvent,
}

impl TimedEvent {
    pub fn new(at_secs: f64, event: CallEvent) -> Self {
        Self { at_secs, event }
    }

    /// Validate the offset and convert it to a [`Duration`].
    ///
    /// Negative, non-finite and unrepresentably large offsets are rejected.
    pub fn offset(&self) -> Result<Duration> {
        if self.at_secs < 0.0 {
            return Err(VoxmeterError::InvalidTimestamp(self.at_secs));
        }
        Duration::try_from_secs_f64(self.at_secs)
            .map_err(|_| VoxmeterError::InvalidTimestamp(self.at_secs))
    }
}

/// Parse a JSON Lines session log.
///
/// Blank lines and lines starting with `#` are skipped. Errors carry the
/// 1-based line number.
pub fn parse_jsonl(input: &str) -> Result<Vec<TimedEvent>> {
    let mut events = Vec::new();
    for (idx, raw) in input.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let event: TimedEvent =
            serde_json::from_str(line).map_err(|e| VoxmeterError::Replay {
                line: idx + 1,
                message: e.to_string(),
            })?;
        event.offset().map_err(|e| VoxmeterError::Replay {
            line: idx + 1,
            message: e.to_string(),
        })?;
        events.push(event);
    }
    Ok(events)
}
