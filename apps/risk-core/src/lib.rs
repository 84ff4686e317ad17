// Allow unwrap/expect in tests - tests should panic on unexpected errors
// Allow test-specific patterns and pedantic lints in test code
#![cfg_attr(
    test,
    allow(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::too_many_lines,
        clippy::match_same_arms,
        clippy::needless_pass_by_value,
        clippy::default_trait_access,
        clippy::items_after_statements
    )
)]

//! Risk Core - Execution Risk Control Library
//!
//! The subsystem that decides whether an order may proceed, records its
//! financial effect in an append-only ledger, and verifies that the internal
//! view of positions and cash matches the exchange's.
//!
//! # Components
//!
//! - [`safety::KillSwitch`]: the authoritative "may we trade" state machine.
//! - [`risk::RiskGate`]: deterministic limit evaluation with the kill switch
//!   as enforcement backstop.
//! - [`ledger`]: execution-event-to-entry mapping, the append-only audit
//!   log, and the derived position/cash aggregates.
//! - [`reconciliation`]: severity-classified divergence detection against
//!   external account snapshots.
//! - [`orchestrator::ExecutionOrchestrator`]: the linear pipeline from order
//!   intake to reconciliation hand-off.
//!
//! Exchange connectivity, market data, and portfolio tracking are
//! collaborator seams ([`orchestrator::ExchangeAdapter`],
//! [`risk::RiskMetricsSource`], [`reconciliation::SnapshotProvider`]).

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]

/// Configuration loading and validation.
pub mod config;

/// Core order, event, and metrics types.
pub mod models;

/// Ledger mapping, the audit log, and derived aggregates.
pub mod ledger;

/// Risk limits and the pre-trade gate.
pub mod risk;

/// The kill switch and its legacy evaluator shim.
pub mod safety;

/// Ledger-versus-exchange reconciliation.
pub mod reconciliation;

/// The execution pipeline.
pub mod orchestrator;

/// Tracing setup.
pub mod telemetry;

pub use config::{Config, ConfigError, load_config};
pub use ledger::{AuditLog, LedgerAggregates, LedgerEntry, LedgerMapper, LedgerRecord};
pub use models::{ExecutionEvent, Order, OrderHandle, OrderSide, RiskMetrics};
pub use orchestrator::{ExecutionOrchestrator, OrderStatus, SubmissionOutcome};
pub use reconciliation::{ReconDiff, ReconReport, ReconciliationEngine, ReconciliationScheduler};
pub use risk::{Decision, RiskGate, RiskLimits};
pub use safety::{KillSwitch, KillSwitchState};
