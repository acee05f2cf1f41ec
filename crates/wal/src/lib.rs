//! # WAL — Write-Ahead Log
//!
//! Crash-safe durability for the LSM engine. Every mutation (`PUT` or
//! `DELETE`) is appended here **before** the corresponding memtable update;
//! on restart the log is replayed to reconstruct the memtable, so no
//! acknowledged write is lost.
//!
//! ## Binary Record Format
//!
//! ```text
//! [magic: u32 BE = 0x57414C31][crc32: u32 BE][op: u8]
//! [key_len: u32 BE][val_len: u32 BE][key][value]
//! ```
//!
//! The magic ("WAL1") frames every record so replay can recognize where a
//! torn tail begins. The CRC32 covers `(op, key_len, val_len, key, value)`
//! with the lengths in their big-endian wire form.
//!
//! ## Rotation
//!
//! There is exactly one active file, `wal.log`. [`Wal::rotate`] fsyncs and
//! closes it, atomically renames it to `wal-<millis>.log`, fsyncs the
//! directory so the rename itself is durable, and opens a fresh empty active
//! file. The engine rotates at memtable flush; the archive a flush produces
//! is obsolete as soon as that flush has published its table.
//!
//! ## Example
//!
//! ```rust,no_run
//! use wal::{Wal, WalRecord};
//!
//! let mut w = Wal::open("data".as_ref()).unwrap();
//! w.append(&WalRecord::Put { key: b"hello".to_vec(), value: b"world".to_vec() }).unwrap();
//! w.replay(|rec| println!("{:?}", rec)).unwrap();
//! ```

use byteorder::{BigEndian, ByteOrder};
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufReader, Read, Write};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;
use tracing::debug;

/// Frame marker in front of every record ("WAL1").
pub const WAL_MAGIC: u32 = 0x5741_4C31;

/// File name of the active log inside the data directory.
pub const ACTIVE_FILE: &str = "wal.log";

/// Fixed frame header: magic(4) + crc(4) + op(1) + key_len(4) + val_len(4).
const FRAME_HEADER_LEN: usize = 4 + 4 + 1 + 4 + 4;

const OP_PUT: u8 = 0;
const OP_DELETE: u8 = 1;

/// Largest key length accepted during replay.
const MAX_KEY_BYTES: usize = 64 * 1024;
/// Largest value length accepted during replay.
const MAX_VALUE_BYTES: usize = 10 * 1024 * 1024;

/// A single logged mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WalRecord {
    /// A key-value insertion.
    Put { key: Vec<u8>, value: Vec<u8> },
    /// A key deletion (tombstone).
    Delete { key: Vec<u8> },
}

/// Errors that can occur during WAL operations.
///
/// Torn tails are deliberately absent: replay consumes them and stops
/// cleanly instead of reporting them.
#[derive(Debug, Error)]
pub enum WalError {
    /// An underlying I/O error.
    #[error("io error: {0}")]
    Io(#[from] io::Error),
}

/// The write-ahead log: one active append-only file plus rotation.
///
/// The writer is single-cursor; the engine wraps the whole `Wal` in a mutex
/// to serialize appends. Replay opens its own read handle and never touches
/// the write cursor.
pub struct Wal {
    dir: PathBuf,
    path: PathBuf,
    file: File,
    /// When true, every append is followed by fsync. Rotation always fsyncs.
    sync_every_append: bool,
    /// Reusable scratch buffer to avoid allocation on every append.
    buf: Vec<u8>,
}

impl Wal {
    /// Opens (or creates) the active log `dir/wal.log` in append mode.
    pub fn open(dir: &Path) -> Result<Self, WalError> {
        Self::open_with_sync(dir, false)
    }

    /// Like [`Wal::open`], with per-append fsync enabled when
    /// `sync_every_append` is true. Rotation always fsyncs regardless.
    pub fn open_with_sync(dir: &Path, sync_every_append: bool) -> Result<Self, WalError> {
        let path = dir.join(ACTIVE_FILE);
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        Ok(Self {
            dir: dir.to_path_buf(),
            path,
            file,
            sync_every_append,
            buf: Vec::with_capacity(256),
        })
    }

    /// Serializes `record` and appends it to the active file in a single
    /// `write_all` call.
    pub fn append(&mut self, record: &WalRecord) -> Result<(), WalError> {
        let (op, key, value): (u8, &[u8], &[u8]) = match record {
            WalRecord::Put { key, value } => (OP_PUT, key, value),
            WalRecord::Delete { key } => (OP_DELETE, key, &[]),
        };

        let klen = key.len() as u32;
        let vlen = value.len() as u32;
        let crc = frame_crc(op, klen, vlen, key, value);

        self.buf.clear();
        let mut header = [0u8; FRAME_HEADER_LEN];
        BigEndian::write_u32(&mut header[0..4], WAL_MAGIC);
        BigEndian::write_u32(&mut header[4..8], crc);
        header[8] = op;
        BigEndian::write_u32(&mut header[9..13], klen);
        BigEndian::write_u32(&mut header[13..17], vlen);
        self.buf.extend_from_slice(&header);
        self.buf.extend_from_slice(key);
        self.buf.extend_from_slice(value);

        self.file.write_all(&self.buf)?;
        if self.sync_every_append {
            self.file.sync_all()?;
        }
        Ok(())
    }

    /// Replays every intact record in the active file, calling `apply` for
    /// each one in append order.
    ///
    /// Replay is framed by the magic number. Any frame with a wrong magic, a
    /// short read, an implausible length, or a CRC mismatch is treated as the
    /// torn tail: replay stops cleanly and returns `Ok(())` with everything
    /// before the tear delivered. Only genuine I/O errors propagate.
    pub fn replay<F>(&self, mut apply: F) -> Result<(), WalError>
    where
        F: FnMut(WalRecord),
    {
        let file = match File::open(&self.path) {
            Ok(f) => f,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(WalError::Io(e)),
        };
        let mut reader = BufReader::new(file);
        let mut header = [0u8; FRAME_HEADER_LEN];
        let mut replayed = 0usize;

        loop {
            if !read_exact_or_eof(&mut reader, &mut header)? {
                break;
            }
            if BigEndian::read_u32(&header[0..4]) != WAL_MAGIC {
                break; // lost framing, torn tail
            }
            let stored_crc = BigEndian::read_u32(&header[4..8]);
            let op = header[8];
            let klen = BigEndian::read_u32(&header[9..13]) as usize;
            let vlen = BigEndian::read_u32(&header[13..17]) as usize;
            if op > OP_DELETE || klen == 0 || klen > MAX_KEY_BYTES || vlen > MAX_VALUE_BYTES {
                break;
            }

            let mut key = vec![0u8; klen];
            if !read_exact_or_eof(&mut reader, &mut key)? {
                break;
            }
            let mut value = vec![0u8; vlen];
            if !read_exact_or_eof(&mut reader, &mut value)? {
                break;
            }

            if frame_crc(op, klen as u32, vlen as u32, &key, &value) != stored_crc {
                break;
            }

            replayed += 1;
            apply(match op {
                OP_PUT => WalRecord::Put { key, value },
                _ => WalRecord::Delete { key },
            });
        }

        debug!("replayed {} WAL records from {}", replayed, self.path.display());
        Ok(())
    }

    /// Rotates the active file: fsync, atomic rename to `wal-<millis>.log`,
    /// directory fsync, then a fresh empty active file.
    ///
    /// Returns the path of the archived file so the caller can reclaim it
    /// once whatever obsoleted it (a memtable flush) is durable.
    pub fn rotate(&mut self) -> Result<PathBuf, WalError> {
        self.file.sync_all()?;

        let mut stamp = unix_millis();
        let mut archived = self.dir.join(format!("wal-{}.log", stamp));
        while archived.exists() {
            stamp += 1;
            archived = self.dir.join(format!("wal-{}.log", stamp));
        }
        fs::rename(&self.path, &archived)?;
        fsync_dir(&self.dir)?;

        self.file = OpenOptions::new().create(true).append(true).open(&self.path)?;
        debug!("rotated WAL to {}", archived.display());
        Ok(archived)
    }

    /// Forces all appended data to stable storage.
    pub fn sync(&mut self) -> Result<(), WalError> {
        self.file.sync_all()?;
        Ok(())
    }

    /// Path of the active log file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn frame_crc(op: u8, klen: u32, vlen: u32, key: &[u8], value: &[u8]) -> u32 {
    let mut hasher = crc32fast::Hasher::new();
    hasher.update(&[op]);
    hasher.update(&klen.to_be_bytes());
    hasher.update(&vlen.to_be_bytes());
    hasher.update(key);
    hasher.update(value);
    hasher.finalize()
}

fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Fsyncs a directory so a rename inside it is durable.
fn fsync_dir(dir: &Path) -> io::Result<()> {
    File::open(dir)?.sync_all()
}

fn read_exact_or_eof<R: Read>(reader: &mut R, buf: &mut [u8]) -> io::Result<bool> {
    match reader.read_exact(buf) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => Ok(false),
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests;
