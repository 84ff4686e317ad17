//! Migration shim for the pre-state-machine evaluator API.
//!
//! Earlier callers used an evaluator object with `evaluate`/`reset`/
//! `last_status`. This adapter keeps that surface alive on top of
//! [`KillSwitch`] so those call sites can migrate incrementally. It holds no
//! logic of its own and is not load-bearing: new code should use
//! [`KillSwitch`] and [`RiskGate`](crate::risk::RiskGate) directly.

use std::sync::{Arc, Mutex, MutexGuard};

use tracing::warn;

use super::kill_switch::{KillSwitch, KillSwitchError, join_breach_names};
use crate::models::RiskMetrics;
use crate::risk::{LimitSeverity, breached_limits};

/// Adapter exposing the legacy `evaluate`/`reset`/`last_status` surface.
#[derive(Debug)]
pub struct LegacyRiskEvaluator {
    switch: Arc<KillSwitch>,
    last_status: Mutex<String>,
}

impl LegacyRiskEvaluator {
    /// Wrap an existing kill switch.
    #[must_use]
    pub fn new(switch: Arc<KillSwitch>) -> Self {
        Self {
            switch,
            last_status: Mutex::new("ok".to_string()),
        }
    }

    /// Legacy check: returns `true` when trading may proceed.
    ///
    /// Hard breaches trip the underlying switch, matching the old
    /// evaluator's side effect.
    ///
    /// # Errors
    ///
    /// Returns an error if a hard breach cannot be recorded in the audit
    /// log. Legacy callers treated that as fatal and so does this shim.
    pub fn evaluate(&self, metrics: &RiskMetrics) -> Result<bool, KillSwitchError> {
        if !self.switch.is_trading_allowed() {
            *self.status() = "kill_switch_tripped".to_string();
            return Ok(false);
        }

        let breaches = breached_limits(metrics, self.switch.limits());
        if breaches.is_empty() {
            *self.status() = "ok".to_string();
            return Ok(true);
        }

        let reason = join_breach_names(&breaches);
        if breaches.iter().any(|b| b.severity == LimitSeverity::Hard) {
            self.switch.trip(&reason)?;
        }
        *self.status() = reason;
        Ok(false)
    }

    /// Legacy reset: request recovery and immediately confirm with fresh
    /// metrics, collapsing the two-step recovery into the old one-shot call.
    ///
    /// # Errors
    ///
    /// Propagates the state machine's rejection when the switch is not
    /// tripped, or when `metrics` still breach.
    pub fn reset(&self, metrics: &RiskMetrics) -> Result<(), KillSwitchError> {
        warn!("Legacy reset invoked; prefer the two-step recovery flow");
        self.switch.request_recovery()?;
        self.switch.confirm_cleared(metrics)?;
        *self.status() = "ok".to_string();
        Ok(())
    }

    /// Status string from the most recent `evaluate` or `reset`.
    #[must_use]
    pub fn last_status(&self) -> String {
        self.status().clone()
    }

    fn status(&self) -> MutexGuard<'_, String> {
        match self.last_status.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}
