//! Audit store backends.
//!
//! The [`AuditStore`] trait is the durability seam of the audit log. The
//! in-memory store backs tests and backtests; the file store is an
//! append-only, CRC-checked record stream for crash recovery. Mid-stream
//! corruption is surfaced as an error, never skipped; a torn final frame
//! from a crash mid-append is discarded, since the record it would have
//! held was never acknowledged.

use std::fs::{File, OpenOptions};
use std::io::{BufReader, Read, Write};
use std::path::{Path, PathBuf};

use crc32fast::Hasher;
use tracing::warn;

use super::entry::LedgerRecord;
use super::error::LedgerError;

/// Magic bytes at the head of an audit store file.
const STORE_MAGIC: &[u8] = b"AUDITv1\0";

/// Append-only storage backend for ledger records.
///
/// Implementations must persist records in append order and return them in
/// that same order from `read_all`. Records are never rewritten.
pub trait AuditStore: Send {
    /// Append one record.
    fn append(&mut self, record: &LedgerRecord) -> Result<(), LedgerError>;

    /// Read every stored record in append order.
    fn read_all(&self) -> Result<Vec<LedgerRecord>, LedgerError>;
}

/// Volatile in-memory store for tests and backtests.
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: Vec<LedgerRecord>,
}

impl MemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl AuditStore for MemoryStore {
    fn append(&mut self, record: &LedgerRecord) -> Result<(), LedgerError> {
        self.records.push(record.clone());
        Ok(())
    }

    fn read_all(&self) -> Result<Vec<LedgerRecord>, LedgerError> {
        Ok(self.records.clone())
    }
}

/// Durable append-only file store.
///
/// Each record is framed as `len(u32 LE) | json payload | crc32(u32 LE)`;
/// the file opens with [`STORE_MAGIC`]. Appends are synced to disk before
/// returning so a crash never loses an acknowledged record.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    file: File,
}

impl FileStore {
    /// Open (or create) the store file at `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened or the magic header
    /// cannot be written.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, LedgerError> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let exists = path.exists() && std::fs::metadata(&path)?.len() > 0;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .read(true)
            .open(&path)?;

        if exists {
            Self::truncate_torn_tail(&path, &file)?;
        } else {
            file.write_all(STORE_MAGIC)?;
            file.sync_data()?;
        }

        Ok(Self { path, file })
    }

    /// Drop an incomplete final frame left by a crash mid-append.
    ///
    /// Scans whole frames from the head and truncates the file to the last
    /// frame boundary, so the next append starts cleanly. Payload integrity
    /// is not checked here; `read_all` still verifies every CRC.
    fn truncate_torn_tail(path: &Path, file: &File) -> Result<(), LedgerError> {
        let file_len = file.metadata()?.len();
        let mut reader = BufReader::new(File::open(path)?);

        let mut magic = vec![0_u8; STORE_MAGIC.len()];
        if reader.read_exact(&mut magic).is_err() || magic != STORE_MAGIC {
            // A bad header is not repairable; read_all reports it.
            return Ok(());
        }

        let mut valid_len = STORE_MAGIC.len() as u64;
        loop {
            let mut len_buf = [0_u8; 4];
            match reader.read_exact(&mut len_buf) {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => break,
                Err(e) => return Err(LedgerError::Io(e)),
            }
            let len = u64::from(u32::from_le_bytes(len_buf));
            #[allow(clippy::cast_possible_truncation)]
            let mut body = vec![0_u8; len as usize + 4];
            match reader.read_exact(&mut body) {
                Ok(()) => valid_len += 4 + len + 4,
                Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => break,
                Err(e) => return Err(LedgerError::Io(e)),
            }
        }

        if valid_len < file_len {
            warn!(
                discarded_bytes = file_len - valid_len,
                "Discarding torn frame at audit store tail"
            );
            file.set_len(valid_len)?;
            file.sync_data()?;
        }
        Ok(())
    }

    /// Path of the underlying store file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl AuditStore for FileStore {
    fn append(&mut self, record: &LedgerRecord) -> Result<(), LedgerError> {
        let payload = serde_json::to_vec(record)?;
        let mut hasher = Hasher::new();
        hasher.update(&payload);
        let crc = hasher.finalize();

        let mut frame = Vec::with_capacity(8 + payload.len());
        frame.extend_from_slice(&(payload.len() as u32).to_le_bytes());
        frame.extend_from_slice(&payload);
        frame.extend_from_slice(&crc.to_le_bytes());

        self.file.write_all(&frame)?;
        self.file.sync_data()?;
        Ok(())
    }

    fn read_all(&self) -> Result<Vec<LedgerRecord>, LedgerError> {
        let mut reader = BufReader::new(File::open(&self.path)?);

        let mut magic = vec![0_u8; STORE_MAGIC.len()];
        reader.read_exact(&mut magic)?;
        if magic != STORE_MAGIC {
            return Err(LedgerError::InvalidMagic);
        }

        let mut out = Vec::new();
        loop {
            let mut len_buf = [0_u8; 4];
            match reader.read_exact(&mut len_buf) {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => break,
                Err(e) => return Err(LedgerError::Io(e)),
            }
            let len = u32::from_le_bytes(len_buf) as usize;
            let mut payload = vec![0_u8; len];
            let mut crc_buf = [0_u8; 4];
            // EOF inside a frame is a torn tail: the append was never
            // acknowledged, so the records before it are still complete.
            match reader
                .read_exact(&mut payload)
                .and_then(|()| reader.read_exact(&mut crc_buf))
            {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                    warn!("Ignoring torn frame at audit store tail");
                    break;
                }
                Err(e) => return Err(LedgerError::Io(e)),
            }
            let expected_crc = u32::from_le_bytes(crc_buf);

            let mut hasher = Hasher::new();
            hasher.update(&payload);
            if hasher.finalize() != expected_crc {
                return Err(LedgerError::CrcMismatch);
            }

            let record: LedgerRecord = serde_json::from_slice(&payload)?;
            out.push(record);
        }

        Ok(out)
    }
}
