//! Per-call estimator actor.
//!
//! Confines a [`CallQualityEstimator`] to a single tokio task so pipeline
//! callbacks running on different tasks can report events without sharing
//! the estimator. Events are applied strictly in send order. Cancelling the
//! call drops anything still queued; there is no drain step.

use std::fmt;
use std::time::{Duration, Instant};

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, info, info_span};
use uuid::Uuid;
use voxmeter_core::config::EstimatorConfig;
use voxmeter_core::{CallEvent, Result, VoxmeterError};

use crate::estimator::CallQualityEstimator;
use crate::snapshot::QualitySnapshot;

/// Identifier of one call session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct CallId(pub Uuid);

impl CallId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for CallId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for CallId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Actor behaviour beyond plain event application.
#[derive(Debug, Clone, Default)]
pub struct ActorOptions {
    /// Log (and export) a snapshot at this period.
    pub report_interval: Option<Duration>,
    /// Record snapshots into the metrics recorder.
    pub export_metrics: bool,
}

impl ActorOptions {
    pub fn from_config(config: &EstimatorConfig, export_metrics: bool) -> Self {
        let report_interval = (config.report_interval_secs > 0)
            .then(|| Duration::from_secs(config.report_interval_secs));
        Self {
            report_interval,
            export_metrics,
        }
    }
}

enum Command {
    Event { event: CallEvent, at: Instant },
    Snapshot(oneshot::Sender<QualitySnapshot>),
}

/// Cloneable handle to a running call estimator.
#[derive(Clone)]
pub struct EstimatorHandle {
    call_id: CallId,
    tx: mpsc::UnboundedSender<Command>,
    cancel: CancellationToken,
}

impl EstimatorHandle {
    /// Spawn the estimator task for a call.
    ///
    /// The join handle resolves to the final snapshot once the call is shut
    /// down or every handle has been dropped.
    pub fn spawn(call_id: CallId, options: ActorOptions) -> (Self, JoinHandle<QualitySnapshot>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();

        let actor = EstimatorActor {
            call_id,
            options,
            estimator: CallQualityEstimator::new(),
        };
        let span = info_span!("call", call_id = %call_id);
        let task = tokio::spawn(actor.run(rx, cancel.clone()).instrument(span));

        (
            Self {
                call_id,
                tx,
                cancel,
            },
            task,
        )
    }

    pub fn call_id(&self) -> CallId {
        self.call_id
    }

    /// Report an event, stamping it with the current monotonic time.
    pub fn record(&self, event: CallEvent) -> Result<()> {
        self.record_at(event, Instant::now())
    }

    /// Report an event that occurred at `at`.
    pub fn record_at(&self, event: CallEvent, at: Instant) -> Result<()> {
        self.tx
            .send(Command::Event { event, at })
            .map_err(|_| VoxmeterError::SessionClosed)
    }

    /// Current metrics, reflecting every event sent before this call.
    pub async fn snapshot(&self) -> Result<QualitySnapshot> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(Command::Snapshot(reply_tx))
            .map_err(|_| VoxmeterError::SessionClosed)?;
        reply_rx.await.map_err(|_| VoxmeterError::SessionClosed)
    }

    /// End the call. Queued events are discarded.
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

struct EstimatorActor {
    call_id: CallId,
    options: ActorOptions,
    estimator: CallQualityEstimator,
}

impl EstimatorActor {
    async fn run(
        mut self,
        mut rx: mpsc::UnboundedReceiver<Command>,
        cancel: CancellationToken,
    ) -> QualitySnapshot {
        debug!("Call estimator started");
        let mut ticker = self.options.report_interval.map(|period| {
            let mut t = tokio::time::interval(period);
            t.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            t
        });
        if let Some(t) = ticker.as_mut() {
            // first tick completes immediately
            t.tick().await;
        }

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                cmd = rx.recv() => match cmd {
                    Some(Command::Event { event, at }) => self.handle_event(&event, at),
                    Some(Command::Snapshot(reply)) => {
                        let _ = reply.send(self.estimator.metrics());
                    }
                    None => break,
                },
                _ = next_tick(&mut ticker) => {
                    self.report("Periodic quality report");
                }
            }
        }

        let snapshot = self.report("Call quality final");
        debug!("Call estimator stopped");
        snapshot
    }

    fn handle_event(&mut self, event: &CallEvent, at: Instant) {
        let samples_before = self.estimator.response_latencies_ms().len();
        self.estimator.apply(event, at);

        if self.options.export_metrics {
            if let Some(&rtt_ms) = self
                .estimator
                .response_latencies_ms()
                .get(samples_before)
            {
                self.export_latency(rtt_ms);
            }
        }
    }

    fn report(&self, message: &str) -> QualitySnapshot {
        let snapshot = self.estimator.metrics();
        info!(
            mos = snapshot.mos_estimate,
            jitter_ms = snapshot.jitter_ms_avg,
            loss = snapshot.packet_loss_rate,
            "{message}: {}",
            snapshot.summary()
        );
        if self.options.export_metrics {
            self.export_snapshot(&snapshot);
        }
        snapshot
    }

    #[cfg(feature = "metrics")]
    fn export_snapshot(&self, snapshot: &QualitySnapshot) {
        crate::export::record_snapshot(&self.call_id, snapshot);
    }

    #[cfg(not(feature = "metrics"))]
    fn export_snapshot(&self, _snapshot: &QualitySnapshot) {
        debug!(call_id = %self.call_id, "Metrics export requested but the `metrics` feature is disabled");
    }

    #[cfg(feature = "metrics")]
    fn export_latency(&self, rtt_ms: f64) {
        crate::export::record_response_latency(rtt_ms);
    }

    #[cfg(not(feature = "metrics"))]
    fn export_latency(&self, _rtt_ms: f64) {}
}

async fn next_tick(ticker: &mut Option<tokio::time::Interval>) {
    match ticker {
        Some(t) => {
            t.tick().await;
        }
        None => std::future::pending().await,
    }
}
