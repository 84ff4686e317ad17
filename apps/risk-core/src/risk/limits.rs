//! Configured risk limits and the pure breach check.
//!
//! The breach check is shared by the risk gate and by the kill switch's
//! recovery confirmation, so an operator can never re-arm an account that
//! would immediately re-breach.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::models::RiskMetrics;

/// Severity of a limit breach.
///
/// `Hard` breaches trip the kill switch; `Soft` breaches block only the
/// order under evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LimitSeverity {
    /// Block this order only.
    Soft,
    /// Trip the kill switch.
    Hard,
}

impl std::fmt::Display for LimitSeverity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Soft => write!(f, "soft"),
            Self::Hard => write!(f, "hard"),
        }
    }
}

/// One configurable limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LimitSetting {
    /// Whether this limit is checked at all.
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Threshold value. Ceilings breach above it, floors breach below it.
    pub threshold: Decimal,
    /// Breach severity.
    #[serde(default = "default_severity")]
    pub severity: LimitSeverity,
}

impl LimitSetting {
    /// An enabled hard limit.
    #[must_use]
    pub const fn hard(threshold: Decimal) -> Self {
        Self {
            enabled: true,
            threshold,
            severity: LimitSeverity::Hard,
        }
    }

    /// An enabled soft limit.
    #[must_use]
    pub const fn soft(threshold: Decimal) -> Self {
        Self {
            enabled: true,
            threshold,
            severity: LimitSeverity::Soft,
        }
    }

    /// A disabled limit (threshold kept for reference).
    #[must_use]
    pub const fn disabled(threshold: Decimal) -> Self {
        Self {
            enabled: false,
            threshold,
            severity: LimitSeverity::Soft,
        }
    }
}

const fn default_enabled() -> bool {
    true
}

const fn default_severity() -> LimitSeverity {
    LimitSeverity::Soft
}

/// The four limit categories, each independently toggleable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RiskLimits {
    /// Maximum drawdown as a fraction of peak equity.
    #[serde(default = "default_drawdown_ceiling")]
    pub drawdown_ceiling: LimitSetting,
    /// Maximum gross notional exposure.
    #[serde(default = "default_gross_exposure_ceiling")]
    pub gross_exposure_ceiling: LimitSetting,
    /// Maximum absolute net position per symbol.
    #[serde(default = "default_position_ceiling")]
    pub position_ceiling: LimitSetting,
    /// Minimum available margin.
    #[serde(default = "default_margin_floor")]
    pub margin_floor: LimitSetting,
}

impl Default for RiskLimits {
    fn default() -> Self {
        Self {
            drawdown_ceiling: default_drawdown_ceiling(),
            gross_exposure_ceiling: default_gross_exposure_ceiling(),
            position_ceiling: default_position_ceiling(),
            margin_floor: default_margin_floor(),
        }
    }
}

fn default_drawdown_ceiling() -> LimitSetting {
    LimitSetting::hard(dec!(0.20))
}

fn default_gross_exposure_ceiling() -> LimitSetting {
    LimitSetting::hard(dec!(500000))
}

fn default_position_ceiling() -> LimitSetting {
    LimitSetting::soft(dec!(10000))
}

fn default_margin_floor() -> LimitSetting {
    LimitSetting::hard(Decimal::ZERO)
}

/// Limit category names used in decision reasons.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LimitCategory {
    /// Drawdown ceiling.
    Drawdown,
    /// Gross exposure ceiling.
    GrossExposure,
    /// Per-symbol position ceiling.
    Position,
    /// Margin floor.
    Margin,
}

impl LimitCategory {
    /// Stable lowercase name used in reason strings.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Drawdown => "drawdown",
            Self::GrossExposure => "gross_exposure",
            Self::Position => "position",
            Self::Margin => "margin",
        }
    }
}

/// A single breached limit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LimitBreach {
    /// Which limit category breached.
    pub category: LimitCategory,
    /// Configured severity of the breached limit.
    pub severity: LimitSeverity,
    /// Symbol, for per-symbol limits.
    pub symbol: Option<String>,
    /// Observed metric value.
    pub observed: Decimal,
    /// Configured threshold.
    pub threshold: Decimal,
}

impl LimitBreach {
    /// Machine-readable breach name, e.g. `drawdown_hard_limit`.
    #[must_use]
    pub fn name(&self) -> String {
        format!("{}_{}_limit", self.category.as_str(), self.severity)
    }
}

/// Evaluate metrics against limits, returning every breach.
///
/// The check order is fixed (drawdown, gross exposure, per-symbol positions
/// in symbol order, margin) so reason strings are deterministic for
/// identical inputs.
#[must_use]
pub fn breached_limits(metrics: &RiskMetrics, limits: &RiskLimits) -> Vec<LimitBreach> {
    let mut breaches = Vec::new();

    let drawdown = limits.drawdown_ceiling;
    if drawdown.enabled && metrics.drawdown > drawdown.threshold {
        breaches.push(LimitBreach {
            category: LimitCategory::Drawdown,
            severity: drawdown.severity,
            symbol: None,
            observed: metrics.drawdown,
            threshold: drawdown.threshold,
        });
    }

    let gross = limits.gross_exposure_ceiling;
    if gross.enabled && metrics.gross_exposure > gross.threshold {
        breaches.push(LimitBreach {
            category: LimitCategory::GrossExposure,
            severity: gross.severity,
            symbol: None,
            observed: metrics.gross_exposure,
            threshold: gross.threshold,
        });
    }

    let position = limits.position_ceiling;
    if position.enabled {
        for (symbol, qty) in &metrics.positions {
            if qty.abs() > position.threshold {
                breaches.push(LimitBreach {
                    category: LimitCategory::Position,
                    severity: position.severity,
                    symbol: Some(symbol.clone()),
                    observed: *qty,
                    threshold: position.threshold,
                });
            }
        }
    }

    let margin = limits.margin_floor;
    if margin.enabled && metrics.available_margin < margin.threshold {
        breaches.push(LimitBreach {
            category: LimitCategory::Margin,
            severity: margin.severity,
            symbol: None,
            observed: metrics.available_margin,
            threshold: margin.threshold,
        });
    }

    breaches
}
