//! Derived position and cash aggregates.

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::entry::{LedgerEntry, LedgerRecord};
use crate::models::OrderSide;

/// Position and cash ledgers derived by folding the audit log.
///
/// The fold is order-respecting and incremental: applying records one at a
/// time from a checkpoint yields the same aggregates as a full replay from
/// seq 1, which reconciliation depends on. Aggregates are never mutated
/// except through [`apply`](Self::apply).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerAggregates {
    positions: BTreeMap<String, Decimal>,
    cash: Decimal,
    folded_through: u64,
}

impl LedgerAggregates {
    /// Empty aggregates (checkpoint at seq 0).
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold a full record stream from a cold start.
    #[must_use]
    pub fn fold(records: &[LedgerRecord]) -> Self {
        let mut agg = Self::new();
        for record in records {
            agg.apply(record);
        }
        agg
    }

    /// Apply one record to the aggregates.
    ///
    /// Buys add to the position and spend cash; sells do the reverse. Fees
    /// only reduce cash. Adjustments carry their own explicit deltas, so
    /// kill-switch markers (zero deltas) leave the aggregates untouched.
    pub fn apply(&mut self, record: &LedgerRecord) {
        match &record.entry {
            LedgerEntry::Trade {
                symbol,
                quantity,
                price,
                side,
            } => {
                let notional = *quantity * *price;
                let position = self.positions.entry(symbol.clone()).or_default();
                match side {
                    OrderSide::Buy => {
                        *position += *quantity;
                        self.cash -= notional;
                    }
                    OrderSide::Sell => {
                        *position -= *quantity;
                        self.cash += notional;
                    }
                }
            }
            LedgerEntry::Fee { amount, .. } => {
                self.cash -= *amount;
            }
            LedgerEntry::Adjustment {
                symbol,
                quantity_delta,
                cash_delta,
                ..
            } => {
                if let Some(symbol) = symbol {
                    *self.positions.entry(symbol.clone()).or_default() += *quantity_delta;
                }
                self.cash += *cash_delta;
            }
        }
        self.folded_through = record.seq;
    }

    /// Net position for a symbol, zero when untracked.
    #[must_use]
    pub fn position(&self, symbol: &str) -> Decimal {
        self.positions.get(symbol).copied().unwrap_or_default()
    }

    /// All tracked positions, ordered by symbol.
    #[must_use]
    pub const fn positions(&self) -> &BTreeMap<String, Decimal> {
        &self.positions
    }

    /// Net cash.
    #[must_use]
    pub const fn cash(&self) -> Decimal {
        self.cash
    }

    /// Sequence id of the last record folded in.
    #[must_use]
    pub const fn folded_through(&self) -> u64 {
        self.folded_through
    }
}
