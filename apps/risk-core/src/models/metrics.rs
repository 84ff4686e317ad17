//! Risk metrics snapshot supplied by the portfolio tracker.

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A point-in-time snapshot of account risk metrics.
///
/// Supplied on demand by the external portfolio tracker; consumed, not owned,
/// by the risk gate. All threshold comparisons against these values are
/// deterministic: no wall-clock input enters a gate decision.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RiskMetrics {
    /// Current drawdown as a fraction of peak equity (0.25 = 25%).
    pub drawdown: Decimal,
    /// Gross notional exposure across all positions.
    pub gross_exposure: Decimal,
    /// Net position per symbol. BTreeMap keeps breach reporting ordered.
    pub positions: BTreeMap<String, Decimal>,
    /// Margin currently available.
    pub available_margin: Decimal,
}

impl RiskMetrics {
    /// Net position for a symbol, zero when untracked.
    #[must_use]
    pub fn position(&self, symbol: &str) -> Decimal {
        self.positions.get(symbol).copied().unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_position_lookup_defaults_to_zero() {
        let mut metrics = RiskMetrics::default();
        metrics.positions.insert("BTC-USD".to_string(), dec!(2));
        assert_eq!(metrics.position("BTC-USD"), dec!(2));
        assert_eq!(metrics.position("ETH-USD"), Decimal::ZERO);
    }
}
