//! Ledger-versus-exchange reconciliation.
//!
//! Periodically folds the audit log into position/cash aggregates, compares
//! them against an external account snapshot, and classifies every non-zero
//! divergence into a severity band. Reconciliation is an advisory control:
//! `Warn` and `Info` never block trading, and `Fail` trips the kill switch
//! only when the fail-divergence policy says so.

mod diff;
mod error;
mod report;
mod scheduler;
mod snapshot;

pub use diff::{DiffSeverity, MetricKind, ReconDiff, ToleranceBand};
pub use error::ReconciliationError;
pub use report::{ReconReport, ReportLog};
pub use scheduler::ReconciliationScheduler;
pub use snapshot::{ExternalSnapshot, SnapshotProvider};

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use rust_decimal::Decimal;
use tokio::sync::{Mutex, RwLock};
use tokio::time::Instant;
use tracing::{error, info, warn};

use crate::config::{FailDivergencePolicy, ReconciliationConfig};
use crate::ledger::{AuditLog, LedgerAggregates};
use crate::safety::KillSwitch;

/// Compares internally-derived aggregates against external snapshots.
pub struct ReconciliationEngine {
    config: ReconciliationConfig,
    audit: Arc<AuditLog>,
    provider: Arc<dyn SnapshotProvider>,
    switch: Arc<KillSwitch>,
    reports: Arc<ReportLog>,
    /// Incrementally folded aggregates, advanced on each pass up to the
    /// watermark recorded at the start of that pass.
    cached: Mutex<LedgerAggregates>,
    last_run: RwLock<Option<Instant>>,
}

impl ReconciliationEngine {
    /// Create an engine over a shared audit log and kill switch.
    #[must_use]
    pub fn new(
        config: ReconciliationConfig,
        audit: Arc<AuditLog>,
        provider: Arc<dyn SnapshotProvider>,
        switch: Arc<KillSwitch>,
    ) -> Self {
        Self {
            config,
            audit,
            provider,
            switch,
            reports: Arc::new(ReportLog::default()),
            cached: Mutex::new(LedgerAggregates::new()),
            last_run: RwLock::new(None),
        }
    }

    /// The report log fed by this engine.
    #[must_use]
    pub fn reports(&self) -> Arc<ReportLog> {
        Arc::clone(&self.reports)
    }

    /// Run one reconciliation pass.
    ///
    /// The fold reads only records at or below the watermark captured at the
    /// start of the pass, so fills arriving concurrently never produce a
    /// torn read. Diffs are emitted sorted by symbol with the account-level
    /// cash diff last.
    ///
    /// # Errors
    ///
    /// [`ReconciliationError::SnapshotUnavailable`] when the external fetch
    /// fails (pass skipped, retry later), [`ReconciliationError::Ledger`] on
    /// audit log read failure, [`ReconciliationError::Policy`] when the
    /// fail-divergence policy could not trip the kill switch.
    pub async fn reconcile(&self) -> Result<ReconReport, ReconciliationError> {
        let start = Instant::now();
        // Watermark first: fills landing while the snapshot is in flight
        // stay out of this pass, keeping the skew window to the fetch alone.
        let watermark = self.audit.watermark();
        let snapshot = self.provider.fetch_snapshot().await?;
        let aggregates = {
            let mut cached = self.cached.lock().await;
            let fresh = self.audit.read_range(cached.folded_through(), watermark)?;
            for record in &fresh {
                cached.apply(record);
            }
            cached.clone()
        };

        let (diffs, symbols_compared) = self.diff(&aggregates, &snapshot);

        #[allow(clippy::cast_possible_truncation)]
        let report = ReconReport {
            passed: !diffs.iter().any(|d| d.severity == DiffSeverity::Fail),
            diffs,
            symbols_compared,
            watermark,
            completed_at: chrono::Utc::now().to_rfc3339(),
            duration_ms: start.elapsed().as_millis() as u64,
        };

        if report.passed {
            info!(
                symbols = symbols_compared,
                diffs = report.diffs.len(),
                watermark,
                "Reconciliation pass completed"
            );
        } else {
            error!(
                diffs = report.diffs.len(),
                watermark, "Reconciliation found fail-severity divergence"
            );
            self.apply_fail_policy()?;
        }

        self.reports.append(report.clone());
        *self.last_run.write().await = Some(Instant::now());
        Ok(report)
    }

    /// Diff aggregates against a snapshot: per-symbol quantities in symbol
    /// order, then account cash.
    fn diff(
        &self,
        aggregates: &LedgerAggregates,
        snapshot: &ExternalSnapshot,
    ) -> (Vec<ReconDiff>, usize) {
        let symbols: BTreeSet<&String> = aggregates
            .positions()
            .keys()
            .chain(snapshot.positions.keys())
            .collect();
        let symbols_compared = symbols.len();

        let mut diffs = Vec::new();
        for symbol in symbols {
            let internal = aggregates.position(symbol);
            let external = snapshot.position(symbol);
            if let Some(diff) = make_diff(
                symbol,
                MetricKind::Quantity,
                internal,
                external,
                self.config.quantity_band,
            ) {
                diffs.push(diff);
            }
        }

        if let Some(diff) = make_diff(
            "account",
            MetricKind::Cash,
            aggregates.cash(),
            snapshot.cash,
            self.config.cash_band,
        ) {
            diffs.push(diff);
        }

        (diffs, symbols_compared)
    }

    fn apply_fail_policy(&self) -> Result<(), ReconciliationError> {
        match self.config.fail_policy() {
            FailDivergencePolicy::Alert => {
                warn!("Fail divergence policy is alert-only; trading continues");
                Ok(())
            }
            FailDivergencePolicy::TripKillSwitch => {
                warn!("Fail divergence policy: tripping kill switch");
                self.switch
                    .trip("reconciliation_fail_divergence")
                    .map_err(|e| ReconciliationError::Policy(e.to_string()))
            }
        }
    }

    /// Whether a periodic pass is due. Always false when the interval is 0.
    pub async fn is_periodic_due(&self) -> bool {
        if self.config.interval_secs == 0 {
            return false;
        }
        self.last_run
            .read()
            .await
            .is_none_or(|last| last.elapsed() >= Duration::from_secs(self.config.interval_secs))
    }
}

impl std::fmt::Debug for ReconciliationEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReconciliationEngine")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

fn make_diff(
    symbol: &str,
    metric: MetricKind,
    internal: Decimal,
    external: Decimal,
    band: ToleranceBand,
) -> Option<ReconDiff> {
    let delta = internal - external;
    band.classify(delta).map(|severity| ReconDiff {
        symbol: symbol.to_string(),
        metric,
        internal,
        external,
        delta,
        severity,
    })
}
