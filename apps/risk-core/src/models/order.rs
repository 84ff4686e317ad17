//! Order intent and handle types.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Side of an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderSide {
    /// Buy / long.
    Buy,
    /// Sell / short.
    Sell,
}

impl std::fmt::Display for OrderSide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Buy => write!(f, "buy"),
            Self::Sell => write!(f, "sell"),
        }
    }
}

/// An inbound order intent.
///
/// Created by an upstream strategy or operator; immutable once handed to the
/// orchestrator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    /// Client-assigned order id.
    pub client_order_id: String,
    /// Instrument symbol.
    pub symbol: String,
    /// Order side.
    pub side: OrderSide,
    /// Requested quantity (must be positive).
    pub quantity: Decimal,
    /// Optional limit price; `None` means market.
    pub limit_price: Option<Decimal>,
}

impl Order {
    /// Create a market order with a generated client id.
    #[must_use]
    pub fn market(symbol: impl Into<String>, side: OrderSide, quantity: Decimal) -> Self {
        Self {
            client_order_id: uuid::Uuid::new_v4().to_string(),
            symbol: symbol.into(),
            side,
            quantity,
            limit_price: None,
        }
    }

    /// Create a limit order with a generated client id.
    #[must_use]
    pub fn limit(
        symbol: impl Into<String>,
        side: OrderSide,
        quantity: Decimal,
        limit_price: Decimal,
    ) -> Self {
        Self {
            limit_price: Some(limit_price),
            ..Self::market(symbol, side, quantity)
        }
    }
}

/// Handle returned to the caller once an order has passed the pre-submission
/// stages and been handed to the exchange adapter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderHandle {
    /// Client-assigned order id of the submitted order.
    pub client_order_id: String,
    /// Instrument symbol.
    pub symbol: String,
    /// Submission timestamp (RFC3339).
    pub submitted_at: String,
}
