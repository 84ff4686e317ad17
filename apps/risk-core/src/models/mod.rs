//! Core data model for the risk control pipeline.
//!
//! Orders and execution events are transient: they are consumed by the
//! orchestrator and discarded once their financial effect (if any) has been
//! recorded in the audit ledger.

mod event;
mod metrics;
mod order;

pub use event::ExecutionEvent;
pub use metrics::RiskMetrics;
pub use order::{Order, OrderHandle, OrderSide};
