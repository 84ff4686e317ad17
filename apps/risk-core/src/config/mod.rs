//! Configuration loading and validation.
//!
//! Configuration is read once at process start from a YAML file with
//! `${VAR}` / `${VAR:-default}` environment interpolation, validated, and
//! treated as immutable for the session.

mod ledger;
mod observability;
mod reconciliation;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use ledger::LedgerConfig;
pub use observability::ObservabilityConfig;
pub use reconciliation::{FailDivergencePolicy, ReconciliationConfig};

use crate::risk::RiskLimits;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read the configuration file.
    #[error("failed to read config file '{path}': {source}")]
    Read {
        /// Path to the config file.
        path: String,
        /// The underlying IO error.
        source: std::io::Error,
    },

    /// Failed to parse the YAML.
    #[error("failed to parse config YAML: {0}")]
    Parse(#[from] serde_yaml_bw::Error),

    /// A value failed validation.
    #[error("config validation failed: {0}")]
    Validation(String),
}

/// Root configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Risk limits enforced by the gate and the kill switch.
    #[serde(default)]
    pub limits: RiskLimits,
    /// Reconciliation timing and tolerances.
    #[serde(default)]
    pub reconciliation: ReconciliationConfig,
    /// Audit ledger persistence.
    #[serde(default)]
    pub ledger: LedgerConfig,
    /// Logging.
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

/// Load configuration from a YAML file.
///
/// `path` defaults to `config.yaml`.
///
/// # Errors
///
/// Returns a [`ConfigError`] if the file cannot be read, parsed, or
/// validated.
pub fn load_config(path: Option<&str>) -> Result<Config, ConfigError> {
    let path = path.unwrap_or("config.yaml");
    let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
        path: path.to_string(),
        source: e,
    })?;
    load_config_from_string(&contents)
}

/// Load configuration from a YAML string (useful for testing).
///
/// # Errors
///
/// Returns a [`ConfigError`] if the YAML cannot be parsed or validated.
pub fn load_config_from_string(yaml: &str) -> Result<Config, ConfigError> {
    let interpolated = interpolate_env_vars(yaml);
    let config: Config = serde_yaml_bw::from_str(&interpolated)?;
    validate_config(&config)?;
    Ok(config)
}

/// Interpolate `${VAR}` and `${VAR:-default}` patterns from the environment.
#[allow(clippy::expect_used)] // Regex is compile-time constant; expect() is safe here
fn interpolate_env_vars(input: &str) -> String {
    use std::sync::OnceLock;

    static ENV_VAR_REGEX: OnceLock<regex::Regex> = OnceLock::new();

    let re = ENV_VAR_REGEX.get_or_init(|| {
        regex::Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)(?::-([^}]*))?\}")
            .expect("env var regex is valid")
    });

    let mut result = input.to_string();
    for cap in re.captures_iter(input) {
        let Some(full_match) = cap.get(0) else {
            continue;
        };
        let Some(var_match) = cap.get(1) else {
            continue;
        };
        let default_value = cap.get(2).map(|m| m.as_str());

        let value = match std::env::var(var_match.as_str()) {
            Ok(v) if !v.is_empty() => v,
            _ => default_value.map_or_else(String::new, str::to_string),
        };

        result = result.replace(full_match.as_str(), &value);
    }

    result
}

/// Validate configuration values.
fn validate_config(config: &Config) -> Result<(), ConfigError> {
    let quantity = config.reconciliation.quantity_band;
    if quantity.warn_at > quantity.fail_at {
        return Err(ConfigError::Validation(
            "reconciliation.quantity_band: warn_at must not exceed fail_at".to_string(),
        ));
    }

    let cash = config.reconciliation.cash_band;
    if cash.warn_at > cash.fail_at {
        return Err(ConfigError::Validation(
            "reconciliation.cash_band: warn_at must not exceed fail_at".to_string(),
        ));
    }

    if quantity.warn_at.is_sign_negative() || cash.warn_at.is_sign_negative() {
        return Err(ConfigError::Validation(
            "reconciliation tolerance thresholds must be non-negative".to_string(),
        ));
    }

    if config.limits.drawdown_ceiling.threshold.is_sign_negative() {
        return Err(ConfigError::Validation(
            "limits.drawdown_ceiling.threshold must be non-negative".to_string(),
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_empty_yaml_yields_defaults() {
        let config = load_config_from_string("{}").unwrap();
        assert!(config.reconciliation.enabled);
        assert!(config.ledger.data_dir.is_none());
        assert_eq!(config.limits.drawdown_ceiling.threshold, dec!(0.20));
    }

    #[test]
    fn test_full_yaml_round_trip() {
        let yaml = r#"
limits:
  drawdown_ceiling:
    threshold: "0.15"
    severity: hard
  gross_exposure_ceiling:
    threshold: "250000"
    severity: hard
  position_ceiling:
    threshold: "5000"
    severity: soft
  margin_floor:
    threshold: "1000"
    severity: hard
reconciliation:
  interval_secs: 60
  quantity_band:
    warn_at: "0.01"
    fail_at: "0.5"
  cash_band:
    warn_at: "5"
    fail_at: "500"
  on_fail_divergence: trip_kill_switch
ledger:
  data_dir: /tmp/risk-core
observability:
  log_level: debug
"#;
        let config = load_config_from_string(yaml).unwrap();
        assert_eq!(config.limits.drawdown_ceiling.threshold, dec!(0.15));
        assert_eq!(config.reconciliation.interval_secs, 60);
        assert_eq!(
            config.reconciliation.fail_policy(),
            FailDivergencePolicy::TripKillSwitch
        );
        assert_eq!(
            config.ledger.audit_path(),
            Some(std::path::PathBuf::from("/tmp/risk-core/audit.log"))
        );
        assert_eq!(config.observability.log_level, "debug");
    }

    #[test]
    fn test_inverted_band_rejected() {
        let yaml = r#"
reconciliation:
  quantity_band:
    warn_at: "2.0"
    fail_at: "1.0"
"#;
        let err = load_config_from_string(yaml).unwrap_err();
        assert!(matches!(err, ConfigError::Validation(_)));
    }

    #[test]
    fn test_env_var_interpolation() {
        // PATH is always present and non-empty in the test environment.
        let expected = std::env::var("PATH").unwrap();
        let interpolated = interpolate_env_vars("path: ${PATH}");
        assert_eq!(interpolated, format!("path: {expected}"));
    }

    #[test]
    fn test_env_var_default_value() {
        let yaml = "observability:\n  log_level: ${RISK_CORE_UNSET_VAR:-warn}\n";
        let config = load_config_from_string(yaml).unwrap();
        assert_eq!(config.observability.log_level, "warn");
    }
}
