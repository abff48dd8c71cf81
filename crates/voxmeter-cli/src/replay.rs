//! `voxmeter replay`: drive a fresh estimator from a recorded session log.

use std::path::Path;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::ValueEnum;
use voxmeter_core::VoxmeterError;
use voxmeter_core::config::EstimatorConfig;
use voxmeter_core::event::parse_jsonl;
use voxmeter_quality::{CallId, CallQualityEstimator, QualitySnapshot};

/// How a snapshot is printed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ReportFormat {
    Json,
    Summary,
    Prometheus,
}

/// Replay the events of a JSON Lines log through one estimator.
///
/// Offsets are applied on top of a single base instant, so the estimator sees
/// the same spacing the pipeline recorded.
pub fn replay_str(input: &str, config: &EstimatorConfig) -> Result<QualitySnapshot> {
    let events = parse_jsonl(input)?;
    let base = Instant::now();
    let mut estimator = CallQualityEstimator::new();
    let mut ignored = 0usize;

    for (idx, timed) in events.into_iter().enumerate() {
        let at = base
            .checked_add(timed.offset()?)
            .ok_or(VoxmeterError::InvalidTimestamp(timed.at_secs))
            .with_context(|| format!("Event {} lies beyond the monotonic clock", idx + 1))?;
        let mut event = timed.event;
        event.fill_audio_defaults(config.default_sample_rate_hz, config.default_channel_count);
        if !estimator.apply(&event, at) {
            ignored += 1;
        }
    }

    if ignored > 0 {
        tracing::info!(ignored, "Skipped events without usable content");
    }
    if estimator.is_awaiting_response() {
        tracing::debug!("Log ended while still waiting for an agent response");
    }
    Ok(estimator.metrics())
}

/// Replay a log file.
pub fn replay_file(path: &Path, config: &EstimatorConfig) -> Result<QualitySnapshot> {
    let input = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read session log {}", path.display()))?;
    let snapshot = replay_str(&input, config)
        .with_context(|| format!("Failed to replay {}", path.display()))?;
    tracing::info!(path = %path.display(), "Replay finished: {}", snapshot.summary());
    Ok(snapshot)
}

/// Render a snapshot in the requested format.
pub fn render(snapshot: &QualitySnapshot, format: ReportFormat) -> Result<String> {
    Ok(match format {
        ReportFormat::Json => serde_json::to_string_pretty(snapshot)?,
        ReportFormat::Summary => snapshot.summary(),
        ReportFormat::Prometheus => {
            voxmeter_quality::export::render_snapshot(&CallId::new(), snapshot)
        }
    })
}
