//! Reconciliation error types.

use crate::ledger::LedgerError;

/// Errors from reconciliation operations.
#[derive(Debug, thiserror::Error)]
pub enum ReconciliationError {
    /// External snapshot could not be fetched. The pass is skipped and
    /// retried later; never interpreted as zero divergence.
    #[error("external snapshot unavailable: {0}")]
    SnapshotUnavailable(String),

    /// The audit log could not be read or written.
    #[error("ledger error: {0}")]
    Ledger(#[from] LedgerError),

    /// Fail-divergence policy asked to trip the kill switch and that failed.
    #[error("fail divergence policy error: {0}")]
    Policy(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_unavailable_display() {
        let err = ReconciliationError::SnapshotUnavailable("timeout".to_string());
        assert_eq!(format!("{err}"), "external snapshot unavailable: timeout");
    }
}
