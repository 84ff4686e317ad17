//! Risk gating.
//!
//! Deterministic evaluation of portfolio risk metrics against configured
//! limits, with the kill switch as the enforcement backstop for hard
//! breaches.

mod gate;
mod limits;

pub use gate::{Decision, MetricsUnavailable, RiskGate, RiskMetricsSource};
pub use limits::{
    LimitBreach, LimitCategory, LimitSetting, LimitSeverity, RiskLimits, breached_limits,
};
