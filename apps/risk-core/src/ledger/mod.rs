//! Append-only financial ledger.
//!
//! Every confirmed fill, fee, and kill-switch transition becomes an immutable
//! [`LedgerRecord`] in the [`AuditLog`]. Records are keyed by a monotonic
//! sequence id assigned at append time, readable in append order, and never
//! rewritten or deleted. Position and cash aggregates are always derived by
//! folding the record stream, never mutated independently.

mod aggregates;
mod audit;
mod entry;
mod error;
mod mapper;
mod store;

pub use aggregates::LedgerAggregates;
pub use audit::AuditLog;
pub use entry::{AdjustmentKind, LedgerEntry, LedgerRecord, SwitchPhase};
pub use error::LedgerError;
pub use mapper::LedgerMapper;
pub use store::{AuditStore, FileStore, MemoryStore};
