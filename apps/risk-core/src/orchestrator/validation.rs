//! Intake validation: structural order checks.

use std::sync::OnceLock;

use rust_decimal::Decimal;

use crate::models::Order;

/// Symbols are uppercase alphanumeric segments, optionally dash-separated
/// (equities like `AAPL`, pairs like `BTC-USD`).
#[allow(clippy::expect_used)] // Regex is compile-time constant; expect() is safe here
fn symbol_regex() -> &'static regex::Regex {
    static SYMBOL_REGEX: OnceLock<regex::Regex> = OnceLock::new();
    SYMBOL_REGEX.get_or_init(|| {
        regex::Regex::new(r"^[A-Z0-9]+(?:-[A-Z0-9]+)*$").expect("symbol regex is valid")
    })
}

/// Structural checks, run before any risk evaluation. Returns the rejection
/// reason on failure.
pub fn validate(order: &Order) -> Result<(), String> {
    if order.quantity <= Decimal::ZERO {
        return Err("invalid_quantity".to_string());
    }
    if !symbol_regex().is_match(&order.symbol) {
        return Err("invalid_symbol".to_string());
    }
    if let Some(price) = order.limit_price {
        if price <= Decimal::ZERO {
            return Err("invalid_limit_price".to_string());
        }
    }
    Ok(())
}
