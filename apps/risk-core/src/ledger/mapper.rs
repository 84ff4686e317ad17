//! Deterministic mapping from execution events to ledger entries.

use rust_decimal::Decimal;

use super::entry::LedgerEntry;
use crate::models::ExecutionEvent;

/// Pure mapper from execution events to ledger entries.
///
/// The mapping is exhaustive over the event enum so adding a new event kind
/// is a compile-time decision, not a runtime branch that can fall through:
///
/// - `Fill` → exactly one `Trade`, plus one `Fee` iff the fee is present and
///   non-zero.
/// - `Ack` / `Reject` / `CancelAck` → nothing. Acknowledgements and
///   cancellations are control-plane signals; only realized fills carry
///   financial consequence.
///
/// Entries come back without sequence ids; the audit log assigns them at
/// append, which keeps replay from a cold start byte-identical.
#[derive(Debug, Clone, Copy, Default)]
pub struct LedgerMapper;

impl LedgerMapper {
    /// Create a mapper.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Map one event to its ledger entries.
    #[must_use]
    pub fn map(&self, event: &ExecutionEvent) -> Vec<LedgerEntry> {
        match event {
            ExecutionEvent::Fill {
                symbol,
                quantity,
                price,
                side,
                fee,
            } => {
                let mut entries = vec![LedgerEntry::Trade {
                    symbol: symbol.clone(),
                    quantity: *quantity,
                    price: *price,
                    side: *side,
                }];
                if let Some(fee) = fee {
                    if *fee != Decimal::ZERO {
                        entries.push(LedgerEntry::Fee {
                            symbol: symbol.clone(),
                            amount: *fee,
                        });
                    }
                }
                entries
            }
            ExecutionEvent::Ack | ExecutionEvent::Reject { .. } | ExecutionEvent::CancelAck => {
                Vec::new()
            }
        }
    }
}
