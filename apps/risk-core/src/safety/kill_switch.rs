//! The kill switch state machine.
//!
//! # State Machine
//!
//! ```text
//! Armed → Tripped        (hard limit breach; automatic)
//! Tripped → Recovering   (explicit operator request; never automatic)
//! Recovering → Armed     (re-validated metrics pass the same limits)
//! Recovering → Tripped   (re-validation still fails; reason updated)
//! ```
//!
//! No other transition is legal. Mutation is serialized behind one exclusive
//! lock held only for the transition itself, never across the audit append.

use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{error, info, warn};

use crate::ledger::{AdjustmentKind, AuditLog, LedgerEntry, LedgerError, SwitchPhase};
use crate::models::RiskMetrics;
use crate::risk::{LimitBreach, RiskLimits, breached_limits};

/// Authoritative trading-permission state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum KillSwitchState {
    /// Trading permitted.
    Armed,
    /// Trading halted.
    Tripped {
        /// Human-readable reason, retained for audit.
        reason: String,
        /// When the switch tripped.
        tripped_at: DateTime<Utc>,
    },
    /// Recovery requested; awaiting confirmation that the breach cleared.
    Recovering {
        /// When recovery was requested.
        requested_at: DateTime<Utc>,
    },
}

impl KillSwitchState {
    /// Phase without payload, as persisted in audit records.
    #[must_use]
    pub const fn phase(&self) -> SwitchPhase {
        match self {
            Self::Armed => SwitchPhase::Armed,
            Self::Tripped { .. } => SwitchPhase::Tripped,
            Self::Recovering { .. } => SwitchPhase::Recovering,
        }
    }
}

/// An attempted transition the state machine does not permit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("invalid kill switch transition: {from} -> {to}")]
pub struct InvalidTransition {
    /// Phase at the time of the attempt.
    pub from: SwitchPhase,
    /// Attempted target phase.
    pub to: SwitchPhase,
}

/// Errors from kill switch operations.
#[derive(Debug, Error)]
pub enum KillSwitchError {
    /// The attempted transition is not legal from the current state.
    #[error(transparent)]
    InvalidTransition(#[from] InvalidTransition),

    /// Recovery confirmation re-validated the metrics and they still breach;
    /// the switch returned to `Tripped` with the updated reason.
    #[error("recovery confirmation failed, still breached: {reason}")]
    StillBreached {
        /// Joined names of the limits still breaching.
        reason: String,
    },

    /// The audit log rejected the transition record. For `trip` this is
    /// fatal and must never be swallowed: the state store being unavailable
    /// can never mean "trading allowed".
    #[error("kill switch audit append failed: {0}")]
    Audit(#[from] LedgerError),
}

/// The account-wide kill switch.
///
/// Exactly one instance exists per trading account. It is shared by
/// reference (`Arc`) with the risk gate and the orchestrator; it is never a
/// process-wide global.
pub struct KillSwitch {
    state: Mutex<KillSwitchState>,
    limits: RiskLimits,
    audit: Arc<AuditLog>,
}

impl KillSwitch {
    /// Create an armed kill switch.
    #[must_use]
    pub fn new(limits: RiskLimits, audit: Arc<AuditLog>) -> Self {
        Self {
            state: Mutex::new(KillSwitchState::Armed),
            limits,
            audit,
        }
    }

    /// Rebuild the switch state by replaying accepted transition records
    /// from the audit log.
    ///
    /// # Errors
    ///
    /// Returns an error if the audit log cannot be read.
    pub fn recover(limits: RiskLimits, audit: Arc<AuditLog>) -> Result<Self, LedgerError> {
        let mut state = KillSwitchState::Armed;
        for record in audit.read_all()? {
            let LedgerEntry::Adjustment {
                kind: AdjustmentKind::KillSwitch { to, accepted, .. },
                note,
                at,
                ..
            } = record.entry
            else {
                continue;
            };
            if !accepted {
                continue;
            }
            let at = DateTime::parse_from_rfc3339(&at)
                .map_or_else(|_| Utc::now(), |t| t.with_timezone(&Utc));
            state = match to {
                SwitchPhase::Armed => KillSwitchState::Armed,
                SwitchPhase::Tripped => KillSwitchState::Tripped {
                    reason: note,
                    tripped_at: at,
                },
                SwitchPhase::Recovering => KillSwitchState::Recovering { requested_at: at },
            };
        }

        info!(state = %state.phase(), "Kill switch state recovered from audit log");

        Ok(Self {
            state: Mutex::new(state),
            limits,
            audit,
        })
    }

    /// True only while `Armed`.
    #[must_use]
    pub fn is_trading_allowed(&self) -> bool {
        matches!(*self.lock(), KillSwitchState::Armed)
    }

    /// Current state snapshot.
    #[must_use]
    pub fn state(&self) -> KillSwitchState {
        self.lock().clone()
    }

    /// Trip the switch.
    ///
    /// Idempotent: tripping an already-tripped switch succeeds without
    /// overwriting the original reason (use [`force_trip`](Self::force_trip)
    /// to overwrite). Legal from `Armed`, `Tripped`, and `Recovering`.
    ///
    /// # Errors
    ///
    /// Returns [`KillSwitchError::Audit`] if the transition record cannot be
    /// appended. The switch is already tripped when that error surfaces, so
    /// the failure mode is closed, never open.
    pub fn trip(&self, reason: &str) -> Result<(), KillSwitchError> {
        self.trip_inner(reason, false)
    }

    /// Trip the switch, overwriting the retained reason if already tripped.
    ///
    /// # Errors
    ///
    /// Same as [`trip`](Self::trip).
    pub fn force_trip(&self, reason: &str) -> Result<(), KillSwitchError> {
        self.trip_inner(reason, true)
    }

    fn trip_inner(&self, reason: &str, force: bool) -> Result<(), KillSwitchError> {
        let (from, recorded_reason) = {
            let mut state = self.lock();
            let from = state.phase();
            let recorded_reason = match &*state {
                KillSwitchState::Tripped {
                    reason: existing, ..
                } if !force => existing.clone(),
                _ => {
                    *state = KillSwitchState::Tripped {
                        reason: reason.to_string(),
                        tripped_at: Utc::now(),
                    };
                    reason.to_string()
                }
            };
            (from, recorded_reason)
        };

        warn!(from = %from, reason = %recorded_reason, force, "Kill switch tripped");
        self.log_transition(from, SwitchPhase::Tripped, true, &recorded_reason)?;
        Ok(())
    }

    /// Request recovery. Legal only from `Tripped`.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidTransition`] from any other state, or
    /// [`KillSwitchError::Audit`] if the transition record cannot be
    /// appended.
    pub fn request_recovery(&self) -> Result<(), KillSwitchError> {
        let from = {
            let mut state = self.lock();
            let from = state.phase();
            if from != SwitchPhase::Tripped {
                drop(state);
                return Err(self.reject(from, SwitchPhase::Recovering));
            }
            *state = KillSwitchState::Recovering {
                requested_at: Utc::now(),
            };
            from
        };

        info!("Kill switch recovery requested");
        self.log_transition(from, SwitchPhase::Recovering, true, "recovery_requested")?;
        Ok(())
    }

    /// Confirm the breach has cleared. Legal only from `Recovering`.
    ///
    /// Re-validates `metrics` against the same limits the risk gate uses so
    /// operator error cannot re-arm a still-breached account. On a clean
    /// check the switch returns to `Armed`; otherwise it returns to
    /// `Tripped` with the updated breach names as the reason.
    ///
    /// # Errors
    ///
    /// [`InvalidTransition`] outside `Recovering`,
    /// [`KillSwitchError::StillBreached`] when re-validation fails, or
    /// [`KillSwitchError::Audit`] if the transition record cannot be
    /// appended.
    pub fn confirm_cleared(&self, metrics: &RiskMetrics) -> Result<(), KillSwitchError> {
        let breaches = breached_limits(metrics, &self.limits);

        let outcome = {
            let mut state = self.lock();
            let from = state.phase();
            if from != SwitchPhase::Recovering {
                drop(state);
                return Err(self.reject(from, SwitchPhase::Armed));
            }
            if breaches.is_empty() {
                *state = KillSwitchState::Armed;
                Ok(from)
            } else {
                let reason = join_breach_names(&breaches);
                *state = KillSwitchState::Tripped {
                    reason: reason.clone(),
                    tripped_at: Utc::now(),
                };
                Err((from, reason))
            }
        };

        match outcome {
            Ok(from) => {
                info!("Kill switch re-armed after recovery confirmation");
                self.log_transition(from, SwitchPhase::Armed, true, "recovery_confirmed")?;
                Ok(())
            }
            Err((from, reason)) => {
                warn!(reason = %reason, "Recovery confirmation failed, switch re-tripped");
                self.log_transition(from, SwitchPhase::Tripped, true, &reason)?;
                Err(KillSwitchError::StillBreached { reason })
            }
        }
    }

    /// Limits used for recovery re-validation.
    #[must_use]
    pub const fn limits(&self) -> &RiskLimits {
        &self.limits
    }

    /// Record a rejected transition attempt and build its error.
    fn reject(&self, from: SwitchPhase, to: SwitchPhase) -> KillSwitchError {
        warn!(from = %from, to = %to, "Rejected kill switch transition");
        if let Err(e) = self.log_transition(from, to, false, "rejected") {
            // The rejection itself is the caller's error; the audit failure
            // is account-visible through the orchestrator's halt latch.
            error!(error = %e, "Failed to record rejected kill switch transition");
        }
        KillSwitchError::InvalidTransition(InvalidTransition { from, to })
    }

    /// Append a transition record. Called with the state lock released.
    fn log_transition(
        &self,
        from: SwitchPhase,
        to: SwitchPhase,
        accepted: bool,
        note: &str,
    ) -> Result<(), LedgerError> {
        self.audit
            .append(LedgerEntry::Adjustment {
                kind: AdjustmentKind::KillSwitch { from, to, accepted },
                symbol: None,
                quantity_delta: rust_decimal::Decimal::ZERO,
                cash_delta: rust_decimal::Decimal::ZERO,
                note: note.to_string(),
                at: Utc::now().to_rfc3339(),
            })
            .map(|_| ())
    }

    fn lock(&self) -> MutexGuard<'_, KillSwitchState> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl std::fmt::Debug for KillSwitch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KillSwitch")
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

/// Join breach names into a deterministic reason string.
#[must_use]
pub(crate) fn join_breach_names(breaches: &[LimitBreach]) -> String {
    breaches
        .iter()
        .map(LimitBreach::name)
        .collect::<Vec<_>>()
        .join(",")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::{AuditStore, LedgerRecord};
    use rust_decimal_macros::dec;

    fn make_switch() -> KillSwitch {
        KillSwitch::new(RiskLimits::default(), Arc::new(AuditLog::in_memory()))
    }

    fn clean_metrics() -> RiskMetrics {
        RiskMetrics {
            drawdown: dec!(0.01),
            gross_exposure: dec!(1000),
            positions: std::collections::BTreeMap::new(),
            available_margin: dec!(50000),
        }
    }

    fn breached_metrics() -> RiskMetrics {
        RiskMetrics {
            drawdown: dec!(0.50),
            ..clean_metrics()
        }
    }

    #[test]
    fn test_starts_armed() {
        let switch = make_switch();
        assert!(switch.is_trading_allowed());
        assert_eq!(switch.state(), KillSwitchState::Armed);
    }

    #[test]
    fn test_trip_halts_trading_and_retains_reason() {
        let switch = make_switch();
        switch.trip("drawdown_hard_limit").unwrap();

        assert!(!switch.is_trading_allowed());
        match switch.state() {
            KillSwitchState::Tripped { reason, .. } => {
                assert_eq!(reason, "drawdown_hard_limit");
            }
            other => panic!("unexpected state: {other:?}"),
        }
    }

    #[test]
    fn test_trip_is_idempotent_and_keeps_original_reason() {
        let switch = make_switch();
        switch.trip("first_reason").unwrap();
        switch.trip("second_reason").unwrap();

        match switch.state() {
            KillSwitchState::Tripped { reason, .. } => assert_eq!(reason, "first_reason"),
            other => panic!("unexpected state: {other:?}"),
        }
    }

    #[test]
    fn test_force_trip_overwrites_reason() {
        let switch = make_switch();
        switch.trip("first_reason").unwrap();
        switch.force_trip("second_reason").unwrap();

        match switch.state() {
            KillSwitchState::Tripped { reason, .. } => assert_eq!(reason, "second_reason"),
            other => panic!("unexpected state: {other:?}"),
        }
    }

    #[test]
    fn test_recovery_only_legal_from_tripped() {
        let switch = make_switch();
        let err = switch.request_recovery().unwrap_err();
        assert!(matches!(err, KillSwitchError::InvalidTransition(_)));
    }

    #[test]
    fn test_cannot_rearm_without_passing_through_recovering() {
        let switch = make_switch();
        switch.trip("breach").unwrap();

        // confirm_cleared from Tripped is rejected: the only path back to
        // Armed runs through Recovering.
        let err = switch.confirm_cleared(&clean_metrics()).unwrap_err();
        assert!(matches!(err, KillSwitchError::InvalidTransition(_)));
        assert!(!switch.is_trading_allowed());
    }

    #[test]
    fn test_full_recovery_cycle() {
        let switch = make_switch();
        switch.trip("breach").unwrap();
        switch.request_recovery().unwrap();
        switch.confirm_cleared(&clean_metrics()).unwrap();
        assert!(switch.is_trading_allowed());
    }

    #[test]
    fn test_confirmation_with_breached_metrics_re_trips() {
        let switch = make_switch();
        switch.trip("breach").unwrap();
        switch.request_recovery().unwrap();

        let err = switch.confirm_cleared(&breached_metrics()).unwrap_err();
        assert!(matches!(err, KillSwitchError::StillBreached { .. }));

        match switch.state() {
            KillSwitchState::Tripped { reason, .. } => {
                assert_eq!(reason, "drawdown_hard_limit");
            }
            other => panic!("unexpected state: {other:?}"),
        }
    }

    #[test]
    fn test_trip_from_recovering_is_legal() {
        let switch = make_switch();
        switch.trip("breach").unwrap();
        switch.request_recovery().unwrap();
        switch.trip("fresh_breach").unwrap();

        match switch.state() {
            KillSwitchState::Tripped { reason, .. } => assert_eq!(reason, "fresh_breach"),
            other => panic!("unexpected state: {other:?}"),
        }
    }

    #[test]
    fn test_every_attempt_is_audited() {
        let audit = Arc::new(AuditLog::in_memory());
        let switch = KillSwitch::new(RiskLimits::default(), Arc::clone(&audit));

        switch.trip("breach").unwrap();
        let _ = switch.confirm_cleared(&clean_metrics()); // rejected
        switch.request_recovery().unwrap();
        switch.confirm_cleared(&clean_metrics()).unwrap();

        let records = audit.read_all().unwrap();
        assert_eq!(records.len(), 4);

        let accepted: Vec<bool> = records
            .iter()
            .filter_map(|r| match &r.entry {
                LedgerEntry::Adjustment {
                    kind: AdjustmentKind::KillSwitch { accepted, .. },
                    ..
                } => Some(*accepted),
                _ => None,
            })
            .collect();
        assert_eq!(accepted, vec![true, false, true, true]);
    }

    /// Store whose appends always fail, simulating a full disk.
    struct RejectingStore;

    impl AuditStore for RejectingStore {
        fn append(&mut self, _record: &LedgerRecord) -> Result<(), LedgerError> {
            Err(LedgerError::Io(std::io::Error::new(
                std::io::ErrorKind::StorageFull,
                "disk full",
            )))
        }

        fn read_all(&self) -> Result<Vec<LedgerRecord>, LedgerError> {
            Ok(Vec::new())
        }
    }

    #[test]
    fn test_trip_surfaces_audit_failure_while_staying_tripped() {
        let audit = Arc::new(AuditLog::open(Box::new(RejectingStore)).unwrap());
        let switch = KillSwitch::new(RiskLimits::default(), audit);

        // The append failure is fatal to the caller, but the switch must
        // already be closed: an unavailable audit store can never mean
        // "trading allowed".
        let err = switch.trip("drawdown_hard_limit").unwrap_err();
        assert!(matches!(err, KillSwitchError::Audit(_)));
        assert!(!switch.is_trading_allowed());
        match switch.state() {
            KillSwitchState::Tripped { reason, .. } => {
                assert_eq!(reason, "drawdown_hard_limit");
            }
            other => panic!("unexpected state: {other:?}"),
        }
    }

    #[test]
    fn test_recover_replays_to_latest_state() {
        let audit = Arc::new(AuditLog::in_memory());
        {
            let switch = KillSwitch::new(RiskLimits::default(), Arc::clone(&audit));
            switch.trip("drawdown_hard_limit").unwrap();
            switch.request_recovery().unwrap();
        }

        let recovered = KillSwitch::recover(RiskLimits::default(), audit).unwrap();
        assert!(matches!(
            recovered.state(),
            KillSwitchState::Recovering { .. }
        ));
        assert!(!recovered.is_trading_allowed());
    }

    #[test]
    fn test_recover_from_empty_log_is_armed() {
        let audit = Arc::new(AuditLog::in_memory());
        let switch = KillSwitch::recover(RiskLimits::default(), audit).unwrap();
        assert!(switch.is_trading_allowed());
    }
}
