//! Reconciliation reports and the report log.

use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::debug;

use super::diff::{DiffSeverity, ReconDiff};

/// Result of one reconciliation pass.
///
/// Diffs are sorted by (symbol, metric type), so two passes over identical
/// inputs serialize byte-identically.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconReport {
    /// All non-zero divergences found.
    pub diffs: Vec<ReconDiff>,
    /// Number of symbols compared.
    pub symbols_compared: usize,
    /// Audit log sequence id the internal aggregates were folded through.
    pub watermark: u64,
    /// Whether the pass found no `Fail` divergence.
    pub passed: bool,
    /// Completion timestamp (RFC3339).
    pub completed_at: String,
    /// Pass duration in milliseconds.
    pub duration_ms: u64,
}

impl ReconReport {
    /// True when any diff classified as `Fail`.
    #[must_use]
    pub fn has_fail(&self) -> bool {
        self.diffs.iter().any(|d| d.severity == DiffSeverity::Fail)
    }
}

/// Append-only in-process log of reconciliation reports.
///
/// Ops collaborators read it two ways: a snapshot of everything appended so
/// far, and a live broadcast stream for alerting. A lagging subscriber loses
/// old reports from its stream but can always re-read the full log.
#[derive(Debug)]
pub struct ReportLog {
    reports: Mutex<Vec<ReconReport>>,
    tx: broadcast::Sender<ReconReport>,
}

impl ReportLog {
    /// Create a log whose broadcast channel buffers `capacity` reports.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self {
            reports: Mutex::new(Vec::new()),
            tx,
        }
    }

    /// Append a report and fan it out to subscribers.
    ///
    /// The log is updated before the broadcast, so a subscriber woken by the
    /// stream always finds the report in [`all`](Self::all)/[`latest`](Self::latest).
    pub fn append(&self, report: ReconReport) {
        self.lock().push(report.clone());
        // Send fails only when nobody is subscribed, which is fine.
        if self.tx.send(report).is_err() {
            debug!("No report subscribers");
        }
    }

    /// Subscribe to the live report stream.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<ReconReport> {
        self.tx.subscribe()
    }

    /// Snapshot of every report appended so far, in append order.
    #[must_use]
    pub fn all(&self) -> Vec<ReconReport> {
        self.lock().clone()
    }

    /// The most recent report, if any pass has completed.
    #[must_use]
    pub fn latest(&self) -> Option<ReconReport> {
        self.lock().last().cloned()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<ReconReport>> {
        match self.reports.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl Default for ReportLog {
    fn default() -> Self {
        Self::new(64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reconciliation::diff::MetricKind;
    use rust_decimal_macros::dec;

    fn report(severity: DiffSeverity) -> ReconReport {
        ReconReport {
            diffs: vec![ReconDiff {
                symbol: "BTC-USD".to_string(),
                metric: MetricKind::Quantity,
                internal: dec!(10),
                external: dec!(12),
                delta: dec!(-2),
                severity,
            }],
            symbols_compared: 1,
            watermark: 7,
            passed: severity != DiffSeverity::Fail,
            completed_at: "2026-01-04T12:00:00Z".to_string(),
            duration_ms: 3,
        }
    }

    #[test]
    fn test_has_fail() {
        assert!(report(DiffSeverity::Fail).has_fail());
        assert!(!report(DiffSeverity::Warn).has_fail());
    }

    #[tokio::test]
    async fn test_append_reaches_subscribers_and_log() {
        let log = ReportLog::default();
        let mut rx = log.subscribe();

        log.append(report(DiffSeverity::Info));

        let streamed = rx.recv().await.unwrap();
        assert_eq!(streamed.symbols_compared, 1);
        assert_eq!(log.all().len(), 1);
        assert_eq!(log.latest().unwrap().watermark, 7);
    }

    #[tokio::test]
    async fn test_subscriber_wakeup_sees_report_in_log() {
        let log = std::sync::Arc::new(ReportLog::default());
        let mut rx = log.subscribe();

        let observer = tokio::spawn({
            let log = std::sync::Arc::clone(&log);
            async move {
                let streamed = rx.recv().await.unwrap();
                // The snapshot views must already contain what the stream
                // just delivered.
                (streamed, log.latest())
            }
        });

        log.append(report(DiffSeverity::Info));

        let (streamed, latest) = observer.await.unwrap();
        assert_eq!(latest, Some(streamed));
    }

    #[test]
    fn test_append_without_subscribers_still_logged() {
        let log = ReportLog::default();
        log.append(report(DiffSeverity::Warn));
        assert_eq!(log.all().len(), 1);
    }
}
