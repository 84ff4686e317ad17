//! The risk gate: pre-trade decision point.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use super::limits::{LimitBreach, LimitSeverity, RiskLimits, breached_limits};
use crate::models::RiskMetrics;
use crate::safety::{KillSwitch, KillSwitchError};

/// Gate decision for one order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum Decision {
    /// Order may proceed to submission.
    Allow,
    /// Order is blocked; `reason` lists every breached limit.
    Block {
        /// Machine-readable reason, comma-joined when several limits breach.
        reason: String,
    },
}

impl Decision {
    /// True for `Allow`.
    #[must_use]
    pub const fn is_allowed(&self) -> bool {
        matches!(self, Self::Allow)
    }

    /// Block reason, if blocked.
    #[must_use]
    pub fn reason(&self) -> Option<&str> {
        match self {
            Self::Allow => None,
            Self::Block { reason } => Some(reason),
        }
    }
}

/// Risk metrics could not be fetched from the portfolio tracker.
#[derive(Debug, Clone, Error)]
#[error("risk metrics unavailable: {0}")]
pub struct MetricsUnavailable(pub String);

/// Driven port: on-demand risk metrics snapshots from the portfolio tracker.
#[async_trait]
pub trait RiskMetricsSource: Send + Sync {
    /// Fetch the current metrics snapshot.
    async fn current_metrics(&self) -> Result<RiskMetrics, MetricsUnavailable>;
}

/// Deterministic pre-trade risk check.
///
/// `evaluate` is a pure function of the metrics, the configured limits, and
/// the kill switch state: identical inputs always yield identical decisions.
/// Its only side effect is tripping the kill switch on a hard breach.
#[derive(Debug)]
pub struct RiskGate {
    limits: RiskLimits,
    switch: Arc<KillSwitch>,
}

impl RiskGate {
    /// Create a gate over a shared kill switch.
    #[must_use]
    pub fn new(limits: RiskLimits, switch: Arc<KillSwitch>) -> Self {
        Self { limits, switch }
    }

    /// Evaluate a metrics snapshot.
    ///
    /// Short-circuits to `Block("kill_switch_tripped")` while the switch is
    /// not armed, without re-checking limits. Hard breaches trip the switch;
    /// soft breaches block only this order. When several limits breach, all
    /// names are retained in the reason and the most severe breach decides
    /// the action.
    ///
    /// # Errors
    ///
    /// Returns an error only when a hard breach cannot be recorded in the
    /// audit log. The switch is already tripped at that point; the failure
    /// is fatal for the caller, never a fallback to `Allow`.
    pub fn evaluate(&self, metrics: &RiskMetrics) -> Result<Decision, KillSwitchError> {
        if !self.switch.is_trading_allowed() {
            debug!("Risk gate short-circuit: kill switch not armed");
            return Ok(Decision::Block {
                reason: "kill_switch_tripped".to_string(),
            });
        }

        let breaches = breached_limits(metrics, &self.limits);
        if breaches.is_empty() {
            return Ok(Decision::Allow);
        }

        let reason = breaches
            .iter()
            .map(LimitBreach::name)
            .collect::<Vec<_>>()
            .join(",");
        let has_hard = breaches.iter().any(|b| b.severity == LimitSeverity::Hard);

        warn!(reason = %reason, hard = has_hard, "Risk limits breached");
        if has_hard {
            self.switch.trip(&reason)?;
        }

        Ok(Decision::Block { reason })
    }

    /// Configured limits.
    #[must_use]
    pub const fn limits(&self) -> &RiskLimits {
        &self.limits
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::AuditLog;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;
    use std::collections::BTreeMap;

    fn gate() -> (RiskGate, Arc<KillSwitch>) {
        let switch = Arc::new(KillSwitch::new(
            RiskLimits::default(),
            Arc::new(AuditLog::in_memory()),
        ));
        (
            RiskGate::new(RiskLimits::default(), Arc::clone(&switch)),
            switch,
        )
    }

    fn metrics(drawdown: Decimal) -> RiskMetrics {
        RiskMetrics {
            drawdown,
            gross_exposure: dec!(1000),
            positions: BTreeMap::new(),
            available_margin: dec!(50000),
        }
    }

    #[test]
    fn test_clean_metrics_allow() {
        let (gate, switch) = gate();
        assert_eq!(gate.evaluate(&metrics(dec!(0.01))).unwrap(), Decision::Allow);
        assert!(switch.is_trading_allowed());
    }

    #[test]
    fn test_hard_breach_blocks_and_trips() {
        let (gate, switch) = gate();
        let decision = gate.evaluate(&metrics(dec!(0.25))).unwrap();
        assert_eq!(decision.reason(), Some("drawdown_hard_limit"));
        assert!(!switch.is_trading_allowed());
    }

    #[test]
    fn test_soft_breach_blocks_without_tripping() {
        let (gate, switch) = gate();
        let mut m = metrics(dec!(0.01));
        m.positions.insert("BTC-USD".to_string(), dec!(20000));

        let decision = gate.evaluate(&m).unwrap();
        assert_eq!(decision.reason(), Some("position_soft_limit"));
        assert!(switch.is_trading_allowed());
    }

    #[test]
    fn test_multiple_breaches_retain_all_names() {
        let (gate, switch) = gate();
        let mut m = metrics(dec!(0.25));
        m.positions.insert("BTC-USD".to_string(), dec!(20000));

        let decision = gate.evaluate(&m).unwrap();
        assert_eq!(
            decision.reason(),
            Some("drawdown_hard_limit,position_soft_limit")
        );
        // Hard wins the tie-break.
        assert!(!switch.is_trading_allowed());
    }

    #[test]
    fn test_tripped_switch_short_circuits() {
        let (gate, switch) = gate();
        switch.trip("manual").unwrap();

        let decision = gate.evaluate(&metrics(dec!(0.01))).unwrap();
        assert_eq!(decision.reason(), Some("kill_switch_tripped"));
    }

    #[test]
    fn test_evaluate_is_deterministic() {
        let (gate, _switch) = gate();
        let m = metrics(dec!(0.05));
        assert_eq!(gate.evaluate(&m).unwrap(), gate.evaluate(&m).unwrap());
    }
}
