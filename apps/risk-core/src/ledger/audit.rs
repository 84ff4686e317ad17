//! The append-only audit log.

use std::sync::Mutex;

use tracing::{debug, error};

use super::entry::{LedgerEntry, LedgerRecord};
use super::error::LedgerError;
use super::store::{AuditStore, MemoryStore};

struct Inner {
    store: Box<dyn AuditStore>,
    next_seq: u64,
}

/// Append-only sink for ledger entries.
///
/// Owns the monotonic sequence counter: entries are handed in without ids and
/// come back as [`LedgerRecord`]s with ids assigned in append order. One
/// mutex guards both counter and store so concurrent appends can never
/// produce gaps or duplicate ids.
pub struct AuditLog {
    inner: Mutex<Inner>,
}

impl AuditLog {
    /// Open an audit log over the given store, resuming the sequence counter
    /// from the last stored record.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read or its records break
    /// sequence monotonicity.
    pub fn open(store: Box<dyn AuditStore>) -> Result<Self, LedgerError> {
        let records = store.read_all()?;
        let mut expected = 1_u64;
        for record in &records {
            if record.seq != expected {
                return Err(LedgerError::OutOfOrder {
                    expected,
                    found: record.seq,
                });
            }
            expected += 1;
        }

        debug!(records = records.len(), "Audit log opened");

        Ok(Self {
            inner: Mutex::new(Inner {
                store,
                next_seq: expected,
            }),
        })
    }

    /// Open an audit log backed by a fresh in-memory store.
    #[must_use]
    pub fn in_memory() -> Self {
        Self {
            inner: Mutex::new(Inner {
                store: Box::new(MemoryStore::new()),
                next_seq: 1,
            }),
        }
    }

    /// Append a single entry, returning the stored record.
    ///
    /// # Errors
    ///
    /// Returns an error if the store append fails. The sequence counter is
    /// not advanced on failure.
    pub fn append(&self, entry: LedgerEntry) -> Result<LedgerRecord, LedgerError> {
        let mut inner = self.lock();
        let record = LedgerRecord {
            seq: inner.next_seq,
            entry,
        };
        if let Err(e) = inner.store.append(&record) {
            error!(seq = record.seq, error = %e, "Audit log append failed");
            return Err(e);
        }
        inner.next_seq += 1;
        Ok(record)
    }

    /// Append a batch of entries under one lock acquisition, in order.
    ///
    /// Entries before a failing append are durable; the failure index is
    /// visible from the returned records' length versus the input's.
    ///
    /// # Errors
    ///
    /// Returns the first store error encountered.
    pub fn append_all(&self, entries: Vec<LedgerEntry>) -> Result<Vec<LedgerRecord>, LedgerError> {
        let mut inner = self.lock();
        let mut out = Vec::with_capacity(entries.len());
        for entry in entries {
            let record = LedgerRecord {
                seq: inner.next_seq,
                entry,
            };
            if let Err(e) = inner.store.append(&record) {
                error!(seq = record.seq, error = %e, "Audit log append failed");
                return Err(e);
            }
            inner.next_seq += 1;
            out.push(record);
        }
        Ok(out)
    }

    /// Read every record in append order.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    pub fn read_all(&self) -> Result<Vec<LedgerRecord>, LedgerError> {
        self.lock().store.read_all()
    }

    /// Read records with `seq` in `(after, upto]`, in append order.
    ///
    /// This is the watermark read used by reconciliation: records appended
    /// concurrently with the read (seq > `upto`) are excluded so the fold
    /// never sees a torn batch.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    pub fn read_range(&self, after: u64, upto: u64) -> Result<Vec<LedgerRecord>, LedgerError> {
        Ok(self
            .read_all()?
            .into_iter()
            .filter(|r| r.seq > after && r.seq <= upto)
            .collect())
    }

    /// Sequence id of the last appended record (0 when empty).
    #[must_use]
    pub fn watermark(&self) -> u64 {
        self.lock().next_seq - 1
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        // A poisoned audit lock means a writer panicked mid-append; the
        // counter and store are still consistent because the counter only
        // advances after a successful append.
        match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl std::fmt::Debug for AuditLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuditLog")
            .field("watermark", &self.watermark())
            .finish()
    }
}
