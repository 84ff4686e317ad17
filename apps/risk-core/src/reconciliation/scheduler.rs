//! Background reconciliation scheduling.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info, warn};

use super::{ReconciliationEngine, ReconciliationError};

/// Runs periodic reconciliation passes and on-demand passes requested by the
/// orchestrator after fills.
///
/// The scheduler owns no ledger lock: each pass reads up to a watermark, so
/// order processing is never blocked for longer than that read.
pub struct ReconciliationScheduler {
    engine: Arc<ReconciliationEngine>,
    poll_interval: Duration,
}

impl ReconciliationScheduler {
    /// Create a scheduler polling the engine's due-check at `poll_interval`.
    #[must_use]
    pub const fn new(engine: Arc<ReconciliationEngine>, poll_interval: Duration) -> Self {
        Self {
            engine,
            poll_interval,
        }
    }

    /// Run until the shutdown signal arrives.
    ///
    /// `requests` carries symbols whose fills were just appended; a request
    /// triggers a full pass immediately (the pass always compares every
    /// symbol, the value is for logging only). Snapshot unavailability skips
    /// the pass and retries on the next trigger.
    pub async fn run(
        self,
        mut requests: mpsc::UnboundedReceiver<String>,
        mut shutdown: broadcast::Receiver<()>,
    ) {
        info!(
            poll_interval_ms = self.poll_interval.as_millis(),
            "Reconciliation scheduler started"
        );
        let mut interval = tokio::time::interval(self.poll_interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    if self.engine.is_periodic_due().await {
                        self.run_pass("periodic").await;
                    }
                }

                Some(symbol) = requests.recv() => {
                    debug!(symbol = %symbol, "Post-fill reconciliation requested");
                    self.run_pass("post_fill").await;
                }

                _ = shutdown.recv() => {
                    info!("Reconciliation scheduler shutting down");
                    break;
                }
            }
        }
    }

    async fn run_pass(&self, trigger: &str) {
        match self.engine.reconcile().await {
            Ok(report) => {
                debug!(
                    trigger,
                    diffs = report.diffs.len(),
                    passed = report.passed,
                    "Reconciliation pass finished"
                );
            }
            Err(ReconciliationError::SnapshotUnavailable(reason)) => {
                warn!(trigger, reason = %reason, "Reconciliation skipped, will retry");
            }
            Err(e) => {
                warn!(trigger, error = %e, "Reconciliation pass failed");
            }
        }
    }
}
