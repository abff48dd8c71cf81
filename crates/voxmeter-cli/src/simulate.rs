//! `voxmeter simulate`: many concurrent synthetic calls, one actor each.
//!
//! Every call follows a seeded script on a virtual timeline, so a run is
//! reproducible for a given seed regardless of scheduling.

use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use voxmeter_core::CallEvent;
use voxmeter_core::config::{EstimatorConfig, MAX_SIM_CHUNK_JITTER_MS, SimulationConfig};
use voxmeter_quality::actor::ActorOptions;
use voxmeter_quality::outcome::CallOutcomeCounter;
use voxmeter_quality::pcm::chunk_bytes_for;
use voxmeter_quality::{CallId, EstimatorHandle, QualitySnapshot};

/// Playback length of one synthesized chunk.
const CHUNK_MS: u32 = 20;

#[derive(Debug, Clone, Serialize)]
pub struct CallReport {
    pub call_id: CallId,
    pub snapshot: QualitySnapshot,
}

#[derive(Debug, Clone, Serialize)]
pub struct SimulationReport {
    pub generated_at: DateTime<Utc>,
    pub seed: u64,
    pub calls: Vec<CallReport>,
    pub calls_attempted: u64,
    pub calls_established: u64,
    pub failed_call_setup_rate: f64,
    /// Mean MOS over calls that were established.
    pub mean_mos: f64,
}

impl SimulationReport {
    fn from_calls(seed: u64, calls: Vec<CallReport>) -> Self {
        let mut fleet = CallOutcomeCounter::new();
        for call in &calls {
            fleet.merge(&CallOutcomeCounter::from_counts(
                call.snapshot.calls_attempted,
                call.snapshot.calls_established,
            ));
        }

        let connected: Vec<f64> = calls
            .iter()
            .filter(|c| c.snapshot.calls_established > 0)
            .map(|c| c.snapshot.mos_estimate)
            .collect();
        let mean_mos = if connected.is_empty() {
            0.0
        } else {
            connected.iter().sum::<f64>() / connected.len() as f64
        };

        Self {
            generated_at: Utc::now(),
            seed,
            calls,
            calls_attempted: fleet.attempted(),
            calls_established: fleet.established(),
            failed_call_setup_rate: fleet.failed_setup_rate(),
            mean_mos,
        }
    }

    pub fn fleet_outcome(&self) -> CallOutcomeCounter {
        CallOutcomeCounter::from_counts(self.calls_attempted, self.calls_established)
    }
}

/// Build the event script for one call, as offsets from call start.
pub fn script_call(
    rng: &mut StdRng,
    sim: &SimulationConfig,
    estimator: &EstimatorConfig,
) -> Vec<(Duration, CallEvent)> {
    let mut script = vec![(Duration::ZERO, CallEvent::CallAttempted)];
    if rng.random_bool(sim.setup_failure_ratio.clamp(0.0, 1.0)) {
        return script;
    }

    let mut t = Duration::from_millis(rng.random_range(200..=1200));
    script.push((t, CallEvent::CallEstablished));

    let chunk_bytes = chunk_bytes_for(
        CHUNK_MS,
        estimator.default_sample_rate_hz,
        estimator.default_channel_count,
    );
    let drop_ratio = sim.drop_ratio.clamp(0.0, 1.0);
    let max_delay_ms = if sim.chunk_jitter_ms.is_finite() {
        sim.chunk_jitter_ms.clamp(0.0, MAX_SIM_CHUNK_JITTER_MS)
    } else {
        0.0
    };

    for turn in 0..sim.turns {
        t += Duration::from_millis(rng.random_range(1500..=4000));
        script.push((
            t,
            CallEvent::UserUtteranceCompleted {
                transcript: Some(format!("caller turn {}", turn + 1)),
            },
        ));

        t += Duration::from_millis(rng.random_range(150..=900));
        script.push((t, CallEvent::ResponseStarted));

        let chunks: u32 = rng.random_range(10..=40);
        let mut nominal = t;
        for _ in 0..chunks {
            nominal += Duration::from_millis(u64::from(CHUNK_MS));
            let delay_ms = if max_delay_ms > 0.0 {
                rng.random_range(0.0..=max_delay_ms)
            } else {
                0.0
            };
            if rng.random_bool(drop_ratio) {
                continue;
            }
            script.push((
                nominal + Duration::from_secs_f64(delay_ms / 1000.0),
                CallEvent::AudioChunk {
                    byte_count: chunk_bytes,
                    sample_rate_hz: estimator.default_sample_rate_hz,
                    channel_count: estimator.default_channel_count,
                },
            ));
        }
        t = nominal;
    }
    script
}

async fn simulate_call(
    index: u32,
    sim: &SimulationConfig,
    estimator: &EstimatorConfig,
    export_metrics: bool,
) -> Result<CallReport> {
    let mut rng = StdRng::seed_from_u64(sim.seed.wrapping_add(u64::from(index)));
    let script = script_call(&mut rng, sim, estimator);

    let call_id = CallId::new();
    let options = ActorOptions::from_config(estimator, export_metrics);
    let (handle, task) = EstimatorHandle::spawn(call_id, options);

    let base = Instant::now();
    for (offset, event) in script {
        handle.record_at(event, base + offset)?;
    }
    let snapshot = handle.snapshot().await?;
    handle.shutdown();
    task.await
        .with_context(|| format!("Estimator task for call {call_id} failed"))?;

    tracing::debug!(%call_id, index, "Simulated call: {}", snapshot.summary());
    Ok(CallReport { call_id, snapshot })
}

/// Run `sim.calls` synthetic calls concurrently and collect their snapshots.
pub async fn run(
    sim: &SimulationConfig,
    estimator: &EstimatorConfig,
    export_metrics: bool,
) -> Result<SimulationReport> {
    tracing::info!(
        calls = sim.calls,
        turns = sim.turns,
        seed = sim.seed,
        "Starting simulation"
    );

    let results = futures::future::join_all(
        (0..sim.calls).map(move |i| simulate_call(i, sim, estimator, export_metrics)),
    )
    .await;
    let calls = results.into_iter().collect::<Result<Vec<_>>>()?;

    let report = SimulationReport::from_calls(sim.seed, calls);
    tracing::info!(
        attempted = report.calls_attempted,
        established = report.calls_established,
        mean_mos = report.mean_mos,
        "Simulation finished"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quiet_sim(calls: u32, turns: u32) -> SimulationConfig {
        SimulationConfig {
            calls,
            turns,
            seed: 7,
            setup_failure_ratio: 0.0,
            chunk_jitter_ms: 0.0,
            drop_ratio: 0.0,
        }
    }

    #[test]
    fn test_script_failed_setup_stops_after_attempt() {
        let sim = SimulationConfig {
            setup_failure_ratio: 1.0,
            ..quiet_sim(1, 3)
        };
        let mut rng = StdRng::seed_from_u64(1);
        let script = script_call(&mut rng, &sim, &EstimatorConfig::default());
        assert_eq!(script.len(), 1);
        assert_eq!(script[0].1, CallEvent::CallAttempted);
    }

    #[test]
    fn test_script_is_ordered_and_seeded() {
        let sim = quiet_sim(1, 4);
        let est = EstimatorConfig::default();
        let a = script_call(&mut StdRng::seed_from_u64(99), &sim, &est);
        let b = script_call(&mut StdRng::seed_from_u64(99), &sim, &est);
        assert_eq!(a, b);
        assert!(a.windows(2).all(|w| w[0].0 <= w[1].0));

        let utterances = a
            .iter()
            .filter(|(_, e)| matches!(e, CallEvent::UserUtteranceCompleted { .. }))
            .count();
        assert_eq!(utterances, 4);
    }

    #[test]
    fn test_script_drops_every_chunk() {
        let sim = SimulationConfig {
            drop_ratio: 1.0,
            ..quiet_sim(1, 2)
        };
        let mut rng = StdRng::seed_from_u64(3);
        let script = script_call(&mut rng, &sim, &EstimatorConfig::default());
        assert!(
            !script
                .iter()
                .any(|(_, e)| matches!(e, CallEvent::AudioChunk { .. }))
        );
    }

    #[test]
    fn test_script_tolerates_unvalidated_jitter() {
        let est = EstimatorConfig::default();
        for jitter in [f64::INFINITY, f64::NAN, 1e300] {
            let sim = SimulationConfig {
                chunk_jitter_ms: jitter,
                ..quiet_sim(1, 1)
            };
            let script = script_call(&mut StdRng::seed_from_u64(5), &sim, &est);
            assert!(
                script
                    .iter()
                    .any(|(_, e)| matches!(e, CallEvent::AudioChunk { .. }))
            );
        }
    }

    #[tokio::test]
    async fn test_default_config_reports_injected_jitter() {
        let sim = SimulationConfig {
            calls: 4,
            ..Default::default()
        };
        let report = run(&sim, &EstimatorConfig::default(), false).await.unwrap();
        for call in &report.calls {
            assert!(call.snapshot.jitter_ms_avg > 0.0);
            assert!(call.snapshot.mos_estimate > 1.0);
        }
    }

    #[tokio::test]
    async fn test_clean_single_turn_calls_score_max() {
        let report = run(&quiet_sim(8, 1), &EstimatorConfig::default(), false)
            .await
            .unwrap();
        assert_eq!(report.calls.len(), 8);
        assert_eq!(report.calls_attempted, 8);
        assert_eq!(report.calls_established, 8);
        assert_eq!(report.failed_call_setup_rate, 0.0);
        for call in &report.calls {
            assert_eq!(call.snapshot.packet_loss_rate, 0.0);
            assert!((call.snapshot.mos_estimate - 4.5).abs() < 1e-9);
            assert!(call.snapshot.agent_response_time_ms_avg >= 150.0);
            assert!(call.snapshot.agent_response_time_ms_avg <= 900.0);
        }
        assert!((report.mean_mos - 4.5).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_all_setups_fail() {
        let sim = SimulationConfig {
            setup_failure_ratio: 1.0,
            ..quiet_sim(5, 2)
        };
        let report = run(&sim, &EstimatorConfig::default(), false).await.unwrap();
        assert_eq!(report.calls_attempted, 5);
        assert_eq!(report.calls_established, 0);
        assert_eq!(report.failed_call_setup_rate, 1.0);
        assert_eq!(report.mean_mos, 0.0);
        assert_eq!(report.fleet_outcome().failed_setup_rate(), 1.0);
    }

    #[tokio::test]
    async fn test_same_seed_same_metrics() {
        let sim = SimulationConfig {
            chunk_jitter_ms: 8.0,
            drop_ratio: 0.1,
            setup_failure_ratio: 0.2,
            ..quiet_sim(6, 3)
        };
        let est = EstimatorConfig::default();
        let first = run(&sim, &est, false).await.unwrap();
        let second = run(&sim, &est, false).await.unwrap();

        assert_eq!(first.calls_established, second.calls_established);
        for (a, b) in first.calls.iter().zip(&second.calls) {
            assert_eq!(a.snapshot, b.snapshot);
        }
    }

    #[tokio::test]
    async fn test_zero_calls() {
        let report = run(&quiet_sim(0, 1), &EstimatorConfig::default(), false)
            .await
            .unwrap();
        assert!(report.calls.is_empty());
        assert_eq!(report.failed_call_setup_rate, 0.0);
    }
}
