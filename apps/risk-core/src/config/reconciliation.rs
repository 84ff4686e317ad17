//! Reconciliation configuration.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::reconciliation::ToleranceBand;

/// Policy applied when a pass finds a `Fail`-severity divergence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailDivergencePolicy {
    /// Surface the alert; trading continues.
    Alert,
    /// Trip the kill switch.
    TripKillSwitch,
}

/// Reconciliation behavior: timing, tolerance bands, and fail policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconciliationConfig {
    /// Enable the periodic background pass.
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Periodic pass interval in seconds (0 = on-demand only).
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
    /// Severity band for per-symbol quantity divergence.
    #[serde(default = "default_quantity_band")]
    pub quantity_band: ToleranceBand,
    /// Severity band for account cash divergence.
    #[serde(default = "default_cash_band")]
    pub cash_band: ToleranceBand,
    /// Action on `Fail` divergence: "alert" or `trip_kill_switch`.
    #[serde(default = "default_on_fail_divergence")]
    pub on_fail_divergence: String,
}

impl Default for ReconciliationConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            interval_secs: default_interval_secs(),
            quantity_band: default_quantity_band(),
            cash_band: default_cash_band(),
            on_fail_divergence: default_on_fail_divergence(),
        }
    }
}

impl ReconciliationConfig {
    /// Parse the fail-divergence knob. Unrecognized values fall back to
    /// alert-only, the conservative-for-availability default.
    #[must_use]
    pub fn fail_policy(&self) -> FailDivergencePolicy {
        match self.on_fail_divergence.as_str() {
            "trip_kill_switch" => FailDivergencePolicy::TripKillSwitch,
            _ => FailDivergencePolicy::Alert,
        }
    }
}

const fn default_enabled() -> bool {
    true
}

const fn default_interval_secs() -> u64 {
    300
}

fn default_quantity_band() -> ToleranceBand {
    ToleranceBand {
        warn_at: Decimal::new(1, 1),  // 0.1
        fail_at: Decimal::new(10, 1), // 1.0
    }
}

fn default_cash_band() -> ToleranceBand {
    ToleranceBand {
        warn_at: Decimal::ONE,
        fail_at: Decimal::ONE_HUNDRED,
    }
}

fn default_on_fail_divergence() -> String {
    "alert".to_string()
}
