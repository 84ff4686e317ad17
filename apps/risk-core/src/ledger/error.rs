//! Errors from ledger operations.

use thiserror::Error;

/// Errors from audit log and store operations.
///
/// An append failure is account-fatal for the affected pipeline: the
/// orchestrator halts further fill processing until the log is writable
/// again. Silently dropping a fill is never acceptable.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// Underlying I/O failure.
    #[error("ledger io error: {0}")]
    Io(#[from] std::io::Error),

    /// Record (de)serialization failure.
    #[error("ledger encode error: {0}")]
    Encode(#[from] serde_json::Error),

    /// A stored frame failed its checksum.
    #[error("ledger corruption: crc mismatch in stored record")]
    CrcMismatch,

    /// The store file does not start with the expected magic bytes.
    #[error("ledger corruption: invalid store magic")]
    InvalidMagic,

    /// A replayed record's sequence id broke monotonicity.
    #[error("ledger corruption: expected seq {expected}, found {found}")]
    OutOfOrder {
        /// Sequence id the replay expected next.
        expected: u64,
        /// Sequence id actually found.
        found: u64,
    },
}
