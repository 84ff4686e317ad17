//! Ledger entry and record types.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::models::OrderSide;

/// Kill-switch phase as persisted in transition records.
///
/// Carries no payload so transition records stay small; the reason and
/// timestamp live on the surrounding [`LedgerEntry::Adjustment`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SwitchPhase {
    /// Trading permitted.
    Armed,
    /// Trading halted.
    Tripped,
    /// Recovery requested, awaiting confirmation.
    Recovering,
}

impl std::fmt::Display for SwitchPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Armed => write!(f, "armed"),
            Self::Tripped => write!(f, "tripped"),
            Self::Recovering => write!(f, "recovering"),
        }
    }
}

/// Classification of an adjustment entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AdjustmentKind {
    /// A kill-switch transition attempt, accepted or rejected.
    KillSwitch {
        /// Phase before the attempt.
        from: SwitchPhase,
        /// Attempted target phase.
        to: SwitchPhase,
        /// Whether the transition was accepted.
        accepted: bool,
    },
    /// Operator-entered manual correction.
    Manual,
}

/// An immutable financial effect.
///
/// `Trade` and `Fee` are produced by the [`super::LedgerMapper`] from fill
/// events and deliberately carry no wall-clock fields: replaying the same
/// ordered event stream against a fresh log must produce byte-identical
/// records. `Adjustment` entries are written directly (kill-switch
/// transitions, manual corrections) and may carry timestamps.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "entry", rename_all = "snake_case")]
pub enum LedgerEntry {
    /// A realized trade.
    Trade {
        /// Instrument symbol.
        symbol: String,
        /// Filled quantity.
        quantity: Decimal,
        /// Fill price.
        price: Decimal,
        /// Trade side.
        side: OrderSide,
    },
    /// An exchange fee attached to a trade.
    Fee {
        /// Instrument symbol the fee was charged against.
        symbol: String,
        /// Fee amount (positive, reduces cash).
        amount: Decimal,
    },
    /// A non-trade adjustment.
    Adjustment {
        /// What kind of adjustment this is.
        #[serde(flatten)]
        kind: AdjustmentKind,
        /// Affected symbol, if any.
        symbol: Option<String>,
        /// Signed position effect.
        quantity_delta: Decimal,
        /// Signed cash effect.
        cash_delta: Decimal,
        /// Human-readable note (e.g. kill-switch trip reason).
        note: String,
        /// Timestamp (RFC3339).
        at: String,
    },
}

impl LedgerEntry {
    /// Short kind label for logging.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Trade { .. } => "trade",
            Self::Fee { .. } => "fee",
            Self::Adjustment { .. } => "adjustment",
        }
    }
}

/// A ledger entry bound to its sequence id.
///
/// The sequence id is assigned by the [`super::AuditLog`] at append time and
/// increases by exactly one per record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerRecord {
    /// Monotonic sequence id, starting at 1.
    pub seq: u64,
    /// The recorded entry.
    pub entry: LedgerEntry,
}
