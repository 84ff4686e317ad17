//! Risk Core Binary
//!
//! Session bootstrap and audit verifier: loads configuration, replays the
//! audit log, recovers the kill switch state, and reports the derived
//! position/cash aggregates. Embedders wire the orchestrator and
//! reconciliation scheduler against their own exchange, metrics, and
//! snapshot adapters; this binary verifies that a session can start from
//! the persisted state.
//!
//! # Usage
//!
//! ```bash
//! cargo run --bin risk-core -- [config.yaml]
//! ```
//!
//! # Environment Variables
//!
//! - `RUST_LOG`: log level override (default from config, `info`)

use std::sync::Arc;

use anyhow::Context;

use risk_core::config::load_config;
use risk_core::ledger::{AuditLog, FileStore, LedgerAggregates};
use risk_core::safety::KillSwitch;
use risk_core::telemetry::init_telemetry;

fn main() -> anyhow::Result<()> {
    let config_path = std::env::args().nth(1);
    let config = load_config(config_path.as_deref()).context("loading configuration")?;

    init_telemetry(&config.observability);

    let audit = match config.ledger.audit_path() {
        Some(path) => {
            tracing::info!(path = %path.display(), "Opening audit log");
            let store = FileStore::open(&path).context("opening audit store")?;
            AuditLog::open(Box::new(store)).context("replaying audit log")?
        }
        None => {
            tracing::warn!("No data_dir configured; audit log is in-memory");
            AuditLog::in_memory()
        }
    };
    let audit = Arc::new(audit);

    let records = audit.read_all().context("reading audit log")?;
    let aggregates = LedgerAggregates::fold(&records);
    let switch = KillSwitch::recover(config.limits, Arc::clone(&audit))
        .context("recovering kill switch state")?;

    tracing::info!(
        records = records.len(),
        watermark = audit.watermark(),
        cash = %aggregates.cash(),
        symbols = aggregates.positions().len(),
        trading_allowed = switch.is_trading_allowed(),
        "Session state verified"
    );
    for (symbol, quantity) in aggregates.positions() {
        tracing::info!(symbol = %symbol, quantity = %quantity, "Recovered position");
    }

    Ok(())
}
