//! Execution events reported back by the exchange adapter.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::OrderSide;

/// An execution event for a submitted order.
///
/// Produced by the exchange adapter and consumed exactly once by the
/// orchestrator. The event source is at-least-once, so duplicate `Ack`s must
/// be tolerated downstream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ExecutionEvent {
    /// Order accepted by the exchange.
    Ack,
    /// A (possibly partial) fill. Only fills carry financial consequence.
    Fill {
        /// Instrument symbol.
        symbol: String,
        /// Filled quantity.
        quantity: Decimal,
        /// Fill price.
        price: Decimal,
        /// Side of the filled order.
        side: OrderSide,
        /// Exchange fee charged for this fill, if any.
        fee: Option<Decimal>,
    },
    /// Order rejected by the exchange.
    Reject {
        /// Machine-readable rejection reason.
        reason: String,
    },
    /// Cancellation confirmed by the exchange.
    CancelAck,
}

impl ExecutionEvent {
    /// Short kind label for logging.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Ack => "ack",
            Self::Fill { .. } => "fill",
            Self::Reject { .. } => "reject",
            Self::CancelAck => "cancel_ack",
        }
    }

    /// Whether this event terminates the order lifecycle.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Reject { .. } | Self::CancelAck)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_event_kinds() {
        assert_eq!(ExecutionEvent::Ack.kind(), "ack");
        assert_eq!(ExecutionEvent::CancelAck.kind(), "cancel_ack");
        let fill = ExecutionEvent::Fill {
            symbol: "BTC-USD".to_string(),
            quantity: dec!(1),
            price: dec!(50000),
            side: OrderSide::Buy,
            fee: None,
        };
        assert_eq!(fill.kind(), "fill");
        assert!(!fill.is_terminal());
    }

    #[test]
    fn test_terminal_events() {
        let reject = ExecutionEvent::Reject {
            reason: "insufficient_margin".to_string(),
        };
        assert!(reject.is_terminal());
        assert!(ExecutionEvent::CancelAck.is_terminal());
        assert!(!ExecutionEvent::Ack.is_terminal());
    }
}
