//! Voice call quality estimation from pipeline timing events.
//!
//! There is no access to transport packets here. Jitter and loss are inferred
//! from the cadence of synthesized-audio chunk deliveries, and responsiveness
//! from the gap between a finalized user utterance and the start of the
//! agent's audio.

pub mod actor;
pub mod estimator;
#[cfg(feature = "metrics")]
pub mod export;
pub mod jitter;
pub mod latency;
pub mod outcome;
pub mod pcm;
pub mod snapshot;

pub use actor::{CallId, EstimatorHandle};
pub use estimator::CallQualityEstimator;
pub use snapshot::QualitySnapshot;

use std::time::Duration;

/// Convert a duration to fractional milliseconds.
pub(crate) fn millis_f64(d: Duration) -> f64 {
    d.as_nanos() as f64 / 1_000_000.0
}
