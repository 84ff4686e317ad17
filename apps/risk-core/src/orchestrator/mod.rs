//! The execution pipeline.
//!
//! Sequences one order through fixed stages: intake validation, risk
//! pre-check, submission, event classification, post-trade mapping, and
//! reconciliation hand-off. The pipeline is linear and fail-fast; an error
//! at one stage halts the rest for that order but never for unrelated
//! orders.

mod adapter;
mod locks;
mod validation;

pub use adapter::{ExchangeAdapter, ExchangeError};
pub use locks::SymbolLocks;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::ledger::{AuditLog, LedgerError, LedgerMapper};
use crate::models::{ExecutionEvent, Order, OrderHandle};
use crate::risk::{Decision, RiskGate, RiskMetricsSource};
use crate::safety::KillSwitchError;

/// Pipeline-fatal errors. Order-scoped rejections are not errors; they come
/// back as [`OrderStatus::Rejected`].
#[derive(Debug, Error)]
pub enum OrchestratorError {
    /// The audit log rejected an append. Fill processing for the account is
    /// halted until [`ExecutionOrchestrator::resume_after_recovery`].
    #[error("ledger write failure: {0}")]
    Ledger(#[from] LedgerError),

    /// The kill switch could not record a hard-breach trip.
    #[error(transparent)]
    KillSwitch(#[from] KillSwitchError),

    /// The account is halted after an earlier ledger write failure.
    #[error("account halted: audit log write previously failed")]
    AccountHalted,
}

/// Terminal status of one order's pipeline run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum OrderStatus {
    /// At least one fill reached the ledger before the stream ended.
    Filled {
        /// Number of fills applied.
        fill_count: usize,
    },
    /// Rejected before or after submission; never produces ledger entries.
    Rejected {
        /// Machine-readable rejection reason.
        reason: String,
    },
    /// Cancelled by the exchange; no further events follow.
    Cancelled,
    /// Stream ended without fills or a terminal event.
    Unfilled,
}

/// Result of [`ExecutionOrchestrator::submit`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmissionOutcome {
    /// Handle identifying the order.
    pub handle: OrderHandle,
    /// Terminal status.
    pub status: OrderStatus,
}

/// Sequences orders through the execution pipeline.
pub struct ExecutionOrchestrator {
    gate: RiskGate,
    metrics: Arc<dyn RiskMetricsSource>,
    adapter: Arc<dyn ExchangeAdapter>,
    mapper: LedgerMapper,
    audit: Arc<AuditLog>,
    locks: SymbolLocks,
    recon_tx: mpsc::UnboundedSender<String>,
    halted: AtomicBool,
}

impl ExecutionOrchestrator {
    /// Wire the pipeline together. `recon_tx` carries post-fill
    /// reconciliation requests to the scheduler.
    #[must_use]
    pub fn new(
        gate: RiskGate,
        metrics: Arc<dyn RiskMetricsSource>,
        adapter: Arc<dyn ExchangeAdapter>,
        audit: Arc<AuditLog>,
        recon_tx: mpsc::UnboundedSender<String>,
    ) -> Self {
        Self {
            gate,
            metrics,
            adapter,
            mapper: LedgerMapper::new(),
            audit,
            locks: SymbolLocks::new(),
            recon_tx,
            halted: AtomicBool::new(false),
        }
    }

    /// Whether fill processing is halted after a ledger write failure.
    #[must_use]
    pub fn is_halted(&self) -> bool {
        self.halted.load(Ordering::SeqCst)
    }

    /// Resume after the audit log is writable again. Operator action.
    pub fn resume_after_recovery(&self) {
        self.halted.store(false, Ordering::SeqCst);
        info!("Account resumed after ledger recovery");
    }

    /// Run one order through the pipeline to its terminal status.
    ///
    /// Pre-submission failures (validation, risk block) come back
    /// synchronously as [`OrderStatus::Rejected`]. Exchange-side failures
    /// arrive as `Reject`/`CancelAck` events and produce no ledger entries;
    /// only confirmed fills create financial state.
    ///
    /// # Errors
    ///
    /// [`OrchestratorError::Ledger`] if a fill could not be appended (the
    /// account halts), [`OrchestratorError::AccountHalted`] when already
    /// halted, [`OrchestratorError::KillSwitch`] if a hard breach could not
    /// be recorded.
    pub async fn submit(&self, order: Order) -> Result<SubmissionOutcome, OrchestratorError> {
        let handle = OrderHandle {
            client_order_id: order.client_order_id.clone(),
            symbol: order.symbol.clone(),
            submitted_at: chrono::Utc::now().to_rfc3339(),
        };

        if self.is_halted() {
            return Err(OrchestratorError::AccountHalted);
        }

        // Stage 1: intake validation.
        if let Err(reason) = validation::validate(&order) {
            debug!(order_id = %handle.client_order_id, reason = %reason, "Order failed validation");
            return Ok(rejected(handle, reason));
        }

        // Stage 2: risk pre-check. An unavailable metrics source fails
        // closed.
        let decision = match self.metrics.current_metrics().await {
            Ok(metrics) => self.gate.evaluate(&metrics)?,
            Err(e) => {
                warn!(error = %e, "Risk metrics unavailable, rejecting order");
                return Ok(rejected(handle, "risk_metrics_unavailable".to_string()));
            }
        };
        if let Decision::Block { reason } = decision {
            info!(order_id = %handle.client_order_id, reason = %reason, "Order blocked by risk gate");
            return Ok(rejected(handle, reason));
        }

        // Stage 3: submission.
        let mut events = match self.adapter.submit(&order).await {
            Ok(events) => events,
            Err(e) => {
                warn!(order_id = %handle.client_order_id, error = %e, "Submission failed");
                return Ok(rejected(handle, "submission_failed".to_string()));
            }
        };

        // Stages 4-6: classify events, map fills, hand off reconciliation.
        let mut fill_count = 0_usize;
        let mut acked = false;
        while let Some(event) = events.recv().await {
            match event {
                ExecutionEvent::Ack => {
                    if acked {
                        debug!(order_id = %handle.client_order_id, "Duplicate ack ignored");
                    }
                    acked = true;
                }
                fill @ ExecutionEvent::Fill { .. } => {
                    self.apply_fill(&handle, &fill).await?;
                    fill_count += 1;
                }
                ExecutionEvent::Reject { reason } => {
                    info!(order_id = %handle.client_order_id, reason = %reason, "Order rejected by exchange");
                    return Ok(rejected(handle, reason));
                }
                ExecutionEvent::CancelAck => {
                    return Ok(SubmissionOutcome {
                        handle,
                        status: OrderStatus::Cancelled,
                    });
                }
            }
        }

        let status = if fill_count > 0 {
            OrderStatus::Filled { fill_count }
        } else {
            OrderStatus::Unfilled
        };
        Ok(SubmissionOutcome { handle, status })
    }

    /// Stage 5 and 6 for one fill: map to entries, append under the symbol
    /// lock, request a reconciliation pass.
    async fn apply_fill(
        &self,
        handle: &OrderHandle,
        fill: &ExecutionEvent,
    ) -> Result<(), OrchestratorError> {
        if self.is_halted() {
            return Err(OrchestratorError::AccountHalted);
        }

        let _guard = self.locks.acquire(&handle.symbol).await;
        let entries = self.mapper.map(fill);
        match self.audit.append_all(entries) {
            Ok(records) => {
                debug!(
                    order_id = %handle.client_order_id,
                    entries = records.len(),
                    "Fill applied to ledger"
                );
            }
            Err(e) => {
                // Dropping a fill is never acceptable: latch the halt and
                // surface the failure to the caller.
                self.halted.store(true, Ordering::SeqCst);
                error!(
                    order_id = %handle.client_order_id,
                    error = %e,
                    "Ledger append failed, halting account"
                );
                return Err(OrchestratorError::Ledger(e));
            }
        }

        // The scheduler may be gone during shutdown; the fill is already
        // durable, so that is not an error.
        if self.recon_tx.send(handle.symbol.clone()).is_err() {
            debug!("Reconciliation scheduler unavailable");
        }
        Ok(())
    }
}

impl std::fmt::Debug for ExecutionOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutionOrchestrator")
            .field("halted", &self.is_halted())
            .finish_non_exhaustive()
    }
}

fn rejected(handle: OrderHandle, reason: String) -> SubmissionOutcome {
    SubmissionOutcome {
        handle,
        status: OrderStatus::Rejected { reason },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{OrderSide, RiskMetrics};
    use crate::risk::{MetricsUnavailable, RiskLimits};
    use crate::safety::KillSwitch;
    use async_trait::async_trait;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;
    use std::collections::BTreeMap;
    use std::sync::Mutex;

    struct FixedMetrics {
        metrics: Mutex<RiskMetrics>,
    }

    impl FixedMetrics {
        fn clean() -> Self {
            Self {
                metrics: Mutex::new(RiskMetrics {
                    drawdown: dec!(0.01),
                    gross_exposure: dec!(1000),
                    positions: BTreeMap::new(),
                    available_margin: dec!(50000),
                }),
            }
        }

        fn breached() -> Self {
            let this = Self::clean();
            this.metrics.lock().unwrap().drawdown = dec!(0.25);
            this
        }
    }

    #[async_trait]
    impl RiskMetricsSource for FixedMetrics {
        async fn current_metrics(&self) -> Result<RiskMetrics, MetricsUnavailable> {
            Ok(self.metrics.lock().unwrap().clone())
        }
    }

    /// Adapter that replays a scripted event sequence for every order.
    struct ScriptedExchange {
        events: Vec<ExecutionEvent>,
    }

    #[async_trait]
    impl ExchangeAdapter for ScriptedExchange {
        async fn submit(
            &self,
            _order: &Order,
        ) -> Result<mpsc::UnboundedReceiver<ExecutionEvent>, ExchangeError> {
            let (tx, rx) = mpsc::unbounded_channel();
            for event in self.events.clone() {
                tx.send(event).map_err(|e| ExchangeError(e.to_string()))?;
            }
            Ok(rx)
        }
    }

    fn fill_event(fee: Option<Decimal>) -> ExecutionEvent {
        ExecutionEvent::Fill {
            symbol: "BTC-USD".to_string(),
            quantity: dec!(0.5),
            price: dec!(50000),
            side: OrderSide::Buy,
            fee,
        }
    }

    fn orchestrator(
        metrics: FixedMetrics,
        events: Vec<ExecutionEvent>,
    ) -> (ExecutionOrchestrator, Arc<AuditLog>, Arc<KillSwitch>) {
        let audit = Arc::new(AuditLog::in_memory());
        let switch = Arc::new(KillSwitch::new(RiskLimits::default(), Arc::clone(&audit)));
        let gate = RiskGate::new(RiskLimits::default(), Arc::clone(&switch));
        let (recon_tx, _recon_rx) = mpsc::unbounded_channel();
        let orchestrator = ExecutionOrchestrator::new(
            gate,
            Arc::new(metrics),
            Arc::new(ScriptedExchange { events }),
            Arc::clone(&audit),
            recon_tx,
        );
        (orchestrator, audit, switch)
    }

    #[tokio::test]
    async fn test_fill_with_fee_reaches_ledger() {
        let events = vec![ExecutionEvent::Ack, fill_event(Some(dec!(5)))];
        let (orchestrator, audit, _) = orchestrator(FixedMetrics::clean(), events);

        let outcome = orchestrator
            .submit(Order::market("BTC-USD", OrderSide::Buy, dec!(0.5)))
            .await
            .unwrap();

        assert_eq!(outcome.status, OrderStatus::Filled { fill_count: 1 });
        let records = audit.read_all().unwrap();
        assert_eq!(records.len(), 2); // Trade + Fee
    }

    #[tokio::test]
    async fn test_validation_failure_is_synchronous_reject() {
        let (orchestrator, audit, _) = orchestrator(FixedMetrics::clean(), vec![]);

        let outcome = orchestrator
            .submit(Order::market("BTC-USD", OrderSide::Buy, Decimal::ZERO))
            .await
            .unwrap();

        assert_eq!(
            outcome.status,
            OrderStatus::Rejected {
                reason: "invalid_quantity".to_string()
            }
        );
        assert!(audit.read_all().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_risk_block_stops_before_submission() {
        let (orchestrator, audit, switch) =
            orchestrator(FixedMetrics::breached(), vec![fill_event(None)]);

        let outcome = orchestrator
            .submit(Order::market("BTC-USD", OrderSide::Buy, dec!(1)))
            .await
            .unwrap();

        assert_eq!(
            outcome.status,
            OrderStatus::Rejected {
                reason: "drawdown_hard_limit".to_string()
            }
        );
        assert!(!switch.is_trading_allowed());
        // No trades appended; only the kill switch transition record.
        let records = audit.read_all().unwrap();
        assert_eq!(records.len(), 1);
    }

    #[tokio::test]
    async fn test_tripped_switch_short_circuits_subsequent_orders() {
        let (orchestrator, _, switch) = orchestrator(FixedMetrics::clean(), vec![]);
        switch.trip("manual").unwrap();

        let outcome = orchestrator
            .submit(Order::market("BTC-USD", OrderSide::Buy, dec!(1)))
            .await
            .unwrap();

        assert_eq!(
            outcome.status,
            OrderStatus::Rejected {
                reason: "kill_switch_tripped".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_exchange_reject_produces_no_ledger_entries() {
        let events = vec![
            ExecutionEvent::Ack,
            ExecutionEvent::Reject {
                reason: "insufficient_margin".to_string(),
            },
        ];
        let (orchestrator, audit, _) = orchestrator(FixedMetrics::clean(), events);

        let outcome = orchestrator
            .submit(Order::market("BTC-USD", OrderSide::Buy, dec!(1)))
            .await
            .unwrap();

        assert_eq!(
            outcome.status,
            OrderStatus::Rejected {
                reason: "insufficient_margin".to_string()
            }
        );
        assert!(audit.read_all().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_duplicate_acks_are_tolerated() {
        let events = vec![
            ExecutionEvent::Ack,
            ExecutionEvent::Ack,
            fill_event(None),
        ];
        let (orchestrator, audit, _) = orchestrator(FixedMetrics::clean(), events);

        let outcome = orchestrator
            .submit(Order::market("BTC-USD", OrderSide::Buy, dec!(0.5)))
            .await
            .unwrap();

        assert_eq!(outcome.status, OrderStatus::Filled { fill_count: 1 });
        assert_eq!(audit.read_all().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_cancel_ack_ends_lifecycle() {
        let events = vec![ExecutionEvent::Ack, ExecutionEvent::CancelAck];
        let (orchestrator, audit, _) = orchestrator(FixedMetrics::clean(), events);

        let outcome = orchestrator
            .submit(Order::market("BTC-USD", OrderSide::Buy, dec!(1)))
            .await
            .unwrap();

        assert_eq!(outcome.status, OrderStatus::Cancelled);
        assert!(audit.read_all().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_stream_end_without_fills_is_unfilled() {
        let events = vec![ExecutionEvent::Ack];
        let (orchestrator, _, _) = orchestrator(FixedMetrics::clean(), events);

        let outcome = orchestrator
            .submit(Order::market("BTC-USD", OrderSide::Buy, dec!(1)))
            .await
            .unwrap();

        assert_eq!(outcome.status, OrderStatus::Unfilled);
    }

    #[tokio::test]
    async fn test_halted_account_refuses_orders_until_resumed() {
        let (orchestrator, _, _) = orchestrator(FixedMetrics::clean(), vec![]);
        orchestrator.halted.store(true, Ordering::SeqCst);

        let err = orchestrator
            .submit(Order::market("BTC-USD", OrderSide::Buy, dec!(1)))
            .await
            .unwrap_err();
        assert!(matches!(err, OrchestratorError::AccountHalted));

        orchestrator.resume_after_recovery();
        let outcome = orchestrator
            .submit(Order::market("BTC-USD", OrderSide::Buy, dec!(1)))
            .await
            .unwrap();
        assert_eq!(outcome.status, OrderStatus::Unfilled);
    }

    #[tokio::test]
    async fn test_fills_request_reconciliation() {
        let audit = Arc::new(AuditLog::in_memory());
        let switch = Arc::new(KillSwitch::new(RiskLimits::default(), Arc::clone(&audit)));
        let gate = RiskGate::new(RiskLimits::default(), Arc::clone(&switch));
        let (recon_tx, mut recon_rx) = mpsc::unbounded_channel();
        let orchestrator = ExecutionOrchestrator::new(
            gate,
            Arc::new(FixedMetrics::clean()),
            Arc::new(ScriptedExchange {
                events: vec![fill_event(None)],
            }),
            audit,
            recon_tx,
        );

        orchestrator
            .submit(Order::market("BTC-USD", OrderSide::Buy, dec!(0.5)))
            .await
            .unwrap();

        assert_eq!(recon_rx.recv().await.unwrap(), "BTC-USD");
    }
}
