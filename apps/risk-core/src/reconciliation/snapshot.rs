//! External account snapshots for reconciliation.

use std::collections::BTreeMap;

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::error::ReconciliationError;

/// Point-in-time external view of the account, as reported by the exchange
/// or custodian.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalSnapshot {
    /// Net position per symbol.
    pub positions: BTreeMap<String, Decimal>,
    /// Net account cash.
    pub cash: Decimal,
    /// When the snapshot was taken (RFC3339).
    pub taken_at: String,
}

impl ExternalSnapshot {
    /// Net position for a symbol, zero when unreported.
    #[must_use]
    pub fn position(&self, symbol: &str) -> Decimal {
        self.positions.get(symbol).copied().unwrap_or_default()
    }
}

/// Driven port: fetches external account snapshots.
///
/// Timeouts and cancellation are the implementation's concern. A failed
/// fetch means the pass is skipped and retried later, never "no divergence".
#[async_trait]
pub trait SnapshotProvider: Send + Sync {
    /// Fetch the current external snapshot.
    async fn fetch_snapshot(&self) -> Result<ExternalSnapshot, ReconciliationError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_unreported_position_is_zero() {
        let snapshot = ExternalSnapshot::default();
        assert_eq!(snapshot.position("BTC-USD"), Decimal::ZERO);
    }

    #[test]
    fn test_reported_position_round_trips() {
        let mut snapshot = ExternalSnapshot::default();
        snapshot.positions.insert("BTC-USD".to_string(), dec!(1.5));
        assert_eq!(snapshot.position("BTC-USD"), dec!(1.5));
    }
}
