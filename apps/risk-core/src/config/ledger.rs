//! Audit ledger persistence configuration.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Where the audit log lives.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LedgerConfig {
    /// Directory for the audit log file. `None` keeps the log in memory
    /// (tests and backtests only; live sessions should always persist).
    #[serde(default)]
    pub data_dir: Option<PathBuf>,
}

impl LedgerConfig {
    /// Full path of the audit log file, when persistence is configured.
    #[must_use]
    pub fn audit_path(&self) -> Option<PathBuf> {
        self.data_dir.as_ref().map(|dir| dir.join("audit.log"))
    }
}
