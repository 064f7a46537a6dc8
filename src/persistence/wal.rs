//! Durable mutation log
//!
//! Append-only sequence of committed [`MutationRecord`]s. Each record is one
//! frame:
//!
//! ```text
//! u64 sequence | u32 payload length | u32 checksum | payload (JSON)
//! ```
//!
//! All integers are little endian; the checksum is the first four bytes of the
//! SHA-256 of the payload. Sequences start at 1 and increase by one.

use super::record::MutationRecord;
use sha2::{Digest, Sha256};
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};

const HEADER_LEN: usize = 16;

/// WAL errors
#[derive(Error, Debug)]
pub enum WalError {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Record encoding or decoding error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Short frame or checksum mismatch
    #[error("WAL corruption detected at offset {offset} (sequence {sequence})")]
    Corruption { sequence: u64, offset: u64 },

    /// Frame sequence does not follow the previous one
    #[error("WAL sequence out of order at offset {offset}: expected {expected}, found {found}")]
    OutOfOrder { expected: u64, found: u64, offset: u64 },
}

pub type WalResult<T> = Result<T, WalError>;

enum Backing {
    File { path: PathBuf, file: File, len: u64 },
    Memory,
}

/// Write-Ahead Log manager
///
/// Keeps every record it holds decoded in memory; the file is read once, on
/// open, and only appended to afterwards.
pub struct Wal {
    backing: Backing,
    /// Records in log order; the record at index `i` has sequence `i + 1`
    records: Vec<MutationRecord>,
    /// Sync mode (fsync after every batch)
    sync_mode: bool,
}

impl Wal {
    /// Open (or create) a log file, validating and decoding every frame in it
    pub fn open(path: impl AsRef<Path>) -> WalResult<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir)?;
        }

        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(&path)?;
        let bytes = std::fs::read(&path)?;
        let records = decode_frames(&bytes)?
            .into_iter()
            .map(serde_json::from_slice::<MutationRecord>)
            .collect::<Result<Vec<_>, _>>()?;

        info!("Opened WAL at {:?}, sequence: {}", path, records.len());

        Ok(Self {
            backing: Backing::File {
                path,
                file,
                len: bytes.len() as u64,
            },
            records,
            sync_mode: false,
        })
    }

    /// A log held only in memory
    pub fn in_memory() -> Self {
        Self {
            backing: Backing::Memory,
            records: Vec::new(),
            sync_mode: false,
        }
    }

    /// Set sync mode
    pub fn set_sync_mode(&mut self, sync: bool) {
        self.sync_mode = sync;
        debug!("WAL sync mode: {}", sync);
    }

    /// Sequence of the last record in the log
    pub fn sequence(&self) -> u64 {
        self.records.len() as u64
    }

    /// Backing file, if any
    pub fn path(&self) -> Option<&Path> {
        match &self.backing {
            Backing::File { path, .. } => Some(path),
            Backing::Memory => None,
        }
    }

    /// Append a batch of records as one write.
    ///
    /// Either every record lands or the log is left at its previous length.
    /// Returns the sequence of the last record written.
    pub fn append_batch(&mut self, records: &[MutationRecord]) -> WalResult<u64> {
        let first = self.sequence();
        if records.is_empty() {
            return Ok(first);
        }

        if let Backing::File { path, file, len } = &mut self.backing {
            let mut buf = Vec::new();
            for (i, record) in records.iter().enumerate() {
                let payload = serde_json::to_vec(record)?;
                encode_frame(&mut buf, first + i as u64 + 1, &payload);
            }
            if let Err(e) = write_batch(file, &buf, self.sync_mode) {
                warn!("WAL append failed at {:?}, truncating back to {} bytes", path, len);
                if let Err(te) = truncate(path, *len) {
                    warn!("WAL truncate failed: {}", te);
                }
                return Err(e.into());
            }
            *len += buf.len() as u64;
        }

        self.records.extend_from_slice(records);
        let sequence = self.sequence();
        debug!(
            "Appended {} WAL records, sequence {} -> {}",
            records.len(),
            first,
            sequence
        );
        Ok(sequence)
    }

    /// Force flush the WAL
    pub fn flush(&mut self) -> WalResult<()> {
        if let Backing::File { file, .. } = &mut self.backing {
            file.flush()?;
            file.sync_data()?;
        }
        Ok(())
    }

    /// Replay every record in log order.
    ///
    /// The callback receives the record's sequence and the record; its first
    /// error stops the replay. Returns the last sequence replayed.
    pub fn replay<F, E>(&self, mut callback: F) -> Result<u64, E>
    where
        F: FnMut(u64, &MutationRecord) -> Result<(), E>,
    {
        let mut last = 0;
        for (i, record) in self.records.iter().enumerate() {
            last = i as u64 + 1;
            callback(last, record)?;
        }
        info!("Replayed WAL entries, last sequence: {}", last);
        Ok(last)
    }

    /// Every record, in log order
    pub fn records(&self) -> &[MutationRecord] {
        &self.records
    }
}

fn write_batch(file: &mut File, buf: &[u8], sync: bool) -> io::Result<()> {
    file.write_all(buf)?;
    file.flush()?;
    if sync {
        file.sync_data()?;
    }
    Ok(())
}

fn truncate(path: &Path, len: u64) -> io::Result<()> {
    OpenOptions::new().write(true).open(path)?.set_len(len)
}

fn checksum(payload: &[u8]) -> u32 {
    let digest = Sha256::digest(payload);
    u32::from_le_bytes([digest[0], digest[1], digest[2], digest[3]])
}

fn encode_frame(buf: &mut Vec<u8>, sequence: u64, payload: &[u8]) {
    buf.extend_from_slice(&sequence.to_le_bytes());
    buf.extend_from_slice(&(payload.len() as u32).to_le_bytes());
    buf.extend_from_slice(&checksum(payload).to_le_bytes());
    buf.extend_from_slice(payload);
}

/// Validate every frame and return the payloads in log order
fn decode_frames(bytes: &[u8]) -> WalResult<Vec<&[u8]>> {
    let mut frames = Vec::new();
    let mut offset = 0usize;
    let mut expected = 1u64;

    while offset < bytes.len() {
        let corrupt = || {
            warn!("WAL corruption detected at offset {}", offset);
            WalError::Corruption {
                sequence: expected,
                offset: offset as u64,
            }
        };

        let header = bytes.get(offset..offset + HEADER_LEN).ok_or_else(corrupt)?;
        let mut word = [0u8; 8];
        word.copy_from_slice(&header[0..8]);
        let sequence = u64::from_le_bytes(word);
        let mut half = [0u8; 4];
        half.copy_from_slice(&header[8..12]);
        let len = u32::from_le_bytes(half) as usize;
        half.copy_from_slice(&header[12..16]);
        let sum = u32::from_le_bytes(half);

        let start = offset + HEADER_LEN;
        let payload = bytes.get(start..start + len).ok_or_else(corrupt)?;
        if checksum(payload) != sum {
            return Err(corrupt());
        }
        if sequence != expected {
            return Err(WalError::OutOfOrder {
                expected,
                found: sequence,
                offset: offset as u64,
            });
        }

        frames.push(payload);
        offset = start + len;
        expected += 1;
    }

    Ok(frames)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ops::Mutation;
    use crate::persistence::Claims;
    use tempfile::TempDir;

    fn record(id: &str) -> MutationRecord {
        MutationRecord::new(Claims::user("u1", "admin"), Mutation::remove_node(id))
    }

    #[test]
    fn test_wal_creation() {
        let temp_dir = TempDir::new().unwrap();
        let wal = Wal::open(temp_dir.path().join("graph.log")).unwrap();
        assert_eq!(wal.sequence(), 0);
        assert!(wal.records().is_empty());
    }

    #[test]
    fn test_wal_append_batch() {
        let temp_dir = TempDir::new().unwrap();
        let mut wal = Wal::open(temp_dir.path().join("graph.log")).unwrap();

        assert_eq!(wal.append_batch(&[record("a"), record("b")]).unwrap(), 2);
        assert_eq!(wal.append_batch(&[record("c")]).unwrap(), 3);
        assert_eq!(wal.append_batch(&[]).unwrap(), 3);
        wal.flush().unwrap();
    }

    #[test]
    fn test_wal_replay_after_reopen() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("nested").join("graph.log");
        let written: Vec<_> = (1..=5).map(|i| record(&format!("n{}", i))).collect();
        {
            let mut wal = Wal::open(&path).unwrap();
            wal.set_sync_mode(true);
            wal.append_batch(&written[..2]).unwrap();
            wal.append_batch(&written[2..]).unwrap();
        }

        let wal = Wal::open(&path).unwrap();
        assert_eq!(wal.sequence(), 5);
        // Decoded on open; replay does not go back to disk
        std::fs::remove_file(&path).unwrap();

        let mut seqs = Vec::new();
        let mut replayed = Vec::new();
        let last = wal
            .replay(|seq, rec| {
                seqs.push(seq);
                replayed.push(rec.clone());
                Ok::<_, WalError>(())
            })
            .unwrap();
        assert_eq!(last, 5);
        assert_eq!(seqs, vec![1, 2, 3, 4, 5]);
        assert_eq!(replayed, written);
    }

    #[test]
    fn test_failed_append_truncates_back() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("graph.log");
        let mut wal = Wal::open(&path).unwrap();
        wal.append_batch(&[record("a")]).unwrap();
        let committed = std::fs::metadata(&path).unwrap().len();

        // Bytes of a torn write, then a handle that cannot write at all
        let mut torn = OpenOptions::new().append(true).open(&path).unwrap();
        torn.write_all(&[0xde, 0xad, 0xbe, 0xef]).unwrap();
        drop(torn);
        if let Backing::File { file, .. } = &mut wal.backing {
            *file = File::open(&path).unwrap();
        }

        assert!(matches!(wal.append_batch(&[record("b")]), Err(WalError::Io(_))));
        assert_eq!(wal.sequence(), 1);
        assert_eq!(wal.records().len(), 1);
        assert_eq!(std::fs::metadata(&path).unwrap().len(), committed);

        let reopened = Wal::open(&path).unwrap();
        assert_eq!(reopened.sequence(), 1);
        assert_eq!(reopened.records()[0].mutation, Mutation::remove_node("a"));
    }

    #[test]
    fn test_in_memory_wal() {
        let mut wal = Wal::in_memory();
        assert!(wal.path().is_none());
        let rec = record("a");
        wal.append_batch(std::slice::from_ref(&rec)).unwrap();
        assert_eq!(wal.sequence(), 1);
        assert_eq!(wal.records(), &[rec][..]);
    }

    #[test]
    fn test_checksum_mismatch_is_corruption() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("graph.log");
        {
            let mut wal = Wal::open(&path).unwrap();
            wal.append_batch(&[record("a"), record("b")]).unwrap();
        }

        let mut bytes = std::fs::read(&path).unwrap();
        let last = bytes.len() - 2;
        bytes[last] ^= 0xff;
        std::fs::write(&path, &bytes).unwrap();

        match Wal::open(&path) {
            Err(WalError::Corruption { sequence, .. }) => assert_eq!(sequence, 2),
            other => panic!("expected corruption, got {:?}", other.map(|w| w.sequence())),
        }
    }

    #[test]
    fn test_truncated_tail_is_corruption() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("graph.log");
        {
            let mut wal = Wal::open(&path).unwrap();
            wal.append_batch(&[record("a"), record("b")]).unwrap();
        }

        let bytes = std::fs::read(&path).unwrap();
        std::fs::write(&path, &bytes[..bytes.len() - 5]).unwrap();

        assert!(matches!(
            Wal::open(&path),
            Err(WalError::Corruption { sequence: 2, .. })
        ));
    }

    #[test]
    fn test_out_of_order_sequence() {
        let mut bytes = Vec::new();
        let payload = serde_json::to_vec(&record("a")).unwrap();
        encode_frame(&mut bytes, 1, &payload);
        encode_frame(&mut bytes, 3, &payload);

        assert!(matches!(
            decode_frames(&bytes),
            Err(WalError::OutOfOrder { expected: 2, found: 3, .. })
        ));
    }
}
