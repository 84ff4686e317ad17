//! Divergence records and severity classification.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Metric type a divergence was measured on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricKind {
    /// Net position quantity for one symbol.
    Quantity,
    /// Net account cash.
    Cash,
}

/// Severity of a divergence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiffSeverity {
    /// Informational only.
    Info,
    /// Needs attention, does not block trading.
    Warn,
    /// Actionable alert.
    Fail,
}

/// Two-threshold severity band for one metric type.
///
/// `warn_at` is the t1 boundary and `fail_at` the t2 boundary:
/// `0 < |delta| < t1` classifies as `Info`, `t1 <= |delta| < t2` as `Warn`,
/// `|delta| >= t2` as `Fail`. Zero divergence classifies as nothing at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToleranceBand {
    /// Lower boundary (t1): divergences at or above it are `Warn`.
    pub warn_at: Decimal,
    /// Upper boundary (t2): divergences at or above it are `Fail`.
    pub fail_at: Decimal,
}

impl ToleranceBand {
    /// Classify a signed delta. `None` for exactly zero divergence.
    #[must_use]
    pub fn classify(&self, delta: Decimal) -> Option<DiffSeverity> {
        let magnitude = delta.abs();
        if magnitude.is_zero() {
            None
        } else if magnitude >= self.fail_at {
            Some(DiffSeverity::Fail)
        } else if magnitude >= self.warn_at {
            Some(DiffSeverity::Warn)
        } else {
            Some(DiffSeverity::Info)
        }
    }
}

/// One detected divergence between internal aggregates and the external
/// snapshot. Produced fresh on every pass, never mutated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconDiff {
    /// Symbol, or `account` for the cash metric.
    pub symbol: String,
    /// Metric the divergence was measured on.
    pub metric: MetricKind,
    /// Internally derived value.
    pub internal: Decimal,
    /// Externally reported value.
    pub external: Decimal,
    /// `internal - external`.
    pub delta: Decimal,
    /// Classified severity.
    pub severity: DiffSeverity,
}
