//! # LSM - Log-Structured Merge Engine
//!
//! Ties the [`wal`], [`memtable`], and [`sstable`] crates into a complete
//! LSM-tree key-value store.
//!
//! ## Architecture
//!
//! ```text
//! Client
//!   |
//!   v
//! ┌───────────────────────────────────────────────┐
//! │                   ENGINE                      │
//! │                                               │
//! │ write.rs → WAL append → memtable insert       │
//! │              |                                │
//! │              |  (memtable over threshold?)    │
//! │              v            yes                 │
//! │           flush() → new sorted table,         │
//! │                     WAL rotation,             │
//! │                     manifest at the head      │
//! │                                               │
//! │ read.rs → memtable → tables newest-first      │
//! │            (first match wins)                 │
//! │                                               │
//! │ compaction.rs → merge oldest N tables         │
//! └───────────────────────────────────────────────┘
//! ```
//!
//! ## Module Responsibilities
//!
//! | Module         | Purpose                                              |
//! |----------------|------------------------------------------------------|
//! | `lib.rs`       | `Engine` struct, config, open/close, orphan sweep    |
//! | [`manifest`]   | ordered list of live tables, atomic persistence      |
//! | `write`        | `put()`, `delete()`, `batch_put()`, flush            |
//! | `read`         | `read()`, `read_range()` (k-way merged)              |
//! | `compaction`   | size-tiered merge of the oldest tables               |
//!
//! ## Crash Safety
//!
//! Every write hits the WAL before the memtable. A flush writes the table
//! (atomic temp + rename + dir fsync), rotates the WAL, then persists the
//! manifest the same atomic way; the archived WAL is deleted only after the
//! manifest is durable. A crash anywhere in between leaves either a WAL to
//! replay or an orphan table that the startup sweep removes, never a lost
//! acknowledged write.

mod compaction;
mod manifest;
mod read;
mod write;

use anyhow::Result;
use manifest::Manifest;
use memtable::Memtable;
use parking_lot::{Mutex, RwLock};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, info, warn};
use wal::Wal;

/// Maximum allowed key size in bytes (64 KiB).
pub const MAX_KEY_SIZE: usize = 64 * 1024;
/// Maximum allowed value size in bytes (10 MiB).
pub const MAX_VALUE_SIZE: usize = 10 * 1024 * 1024;

/// Number of oldest tables a single compaction merges.
pub const COMPACTION_PICK_COUNT: usize = 3;

/// Engine configuration with the documented defaults.
#[derive(Debug, Clone)]
pub struct Config {
    /// Directory holding the WAL, tables, and manifest; created if absent.
    pub data_dir: PathBuf,
    /// Memtable footprint that triggers a flush. Default 16 MiB.
    pub memtable_byte_limit: usize,
    /// One sparse-index entry per this many data entries. Default 64.
    pub sparse_index_stride: usize,
    /// Fsync the WAL on every append (durability over throughput).
    /// Rotation always fsyncs. Default off.
    pub wal_sync_every_append: bool,
}

impl Config {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            memtable_byte_limit: 16 * 1024 * 1024,
            sparse_index_stride: sstable::DEFAULT_INDEX_EVERY,
            wal_sync_every_append: false,
        }
    }
}

/// The LSM engine.
pub struct Engine {
    config: Config,
    /// Appends are serialized through this mutex; replay opens its own
    /// handle.
    wal: Mutex<Wal>,
    mem: Memtable,
    manifest: RwLock<Manifest>,
    /// Mutating ops take this shared; flush and compaction take it
    /// exclusively so a WAL append can never slip between a memtable
    /// snapshot and the WAL rotation that would archive it unseen.
    gate: RwLock<()>,
    closed: AtomicBool,
}

impl Engine {
    /// Opens the engine: loads (or bootstraps) the manifest, sweeps orphan
    /// tables, and replays the WAL into a fresh memtable.
    pub fn open(config: Config) -> Result<Self> {
        std::fs::create_dir_all(&config.data_dir)?;

        let manifest = Manifest::load_or_create(&config.data_dir)?;
        sweep_orphans(&config.data_dir, &manifest);

        let wal = Wal::open_with_sync(&config.data_dir, config.wal_sync_every_append)?;
        let mem = Memtable::new();
        wal.replay(|record| match record {
            wal::WalRecord::Put { key, value } => mem.put(key, value),
            wal::WalRecord::Delete { key } => mem.delete(key),
        })?;

        info!(
            "lsm opened at {} ({} tables, {} memtable entries replayed)",
            config.data_dir.display(),
            manifest.table_count(),
            mem.len()
        );

        Ok(Self {
            config,
            wal: Mutex::new(wal),
            mem,
            manifest: RwLock::new(manifest),
            gate: RwLock::new(()),
            closed: AtomicBool::new(false),
        })
    }

    /// Flushes a non-empty memtable, syncs the WAL, and marks the engine
    /// closed. Idempotent; later operations fail.
    pub fn close(&self) -> Result<()> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        {
            let _gate = self.gate.write();
            self.flush_locked()?;
        }
        let _ = self.wal.lock().sync();
        debug!("lsm at {} closed", self.config.data_dir.display());
        Ok(())
    }

    /// Number of entries (tombstones included) currently in the memtable.
    pub fn memtable_len(&self) -> usize {
        self.mem.len()
    }

    /// Number of live tables in the manifest.
    pub fn table_count(&self) -> usize {
        self.manifest.read().table_count()
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub(crate) fn ensure_open(&self) -> Result<()> {
        anyhow::ensure!(!self.closed.load(Ordering::SeqCst), "engine is closed");
        Ok(())
    }
}

/// Deletes `*.sst` files not listed in the manifest. Such orphans exist only
/// when a crash hit between a table write and the manifest update; the WAL
/// still holds their data, so removal is safe.
fn sweep_orphans(dir: &std::path::Path, manifest: &Manifest) {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return;
    };
    for entry in entries.flatten() {
        let path = entry.path();
        let is_table = path.extension().map(|e| e == "sst").unwrap_or(false);
        if is_table && !manifest.contains(&path) {
            warn!("removing orphan table {}", path.display());
            let _ = std::fs::remove_file(&path);
        }
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("data_dir", &self.config.data_dir)
            .field("memtable_byte_limit", &self.config.memtable_byte_limit)
            .field("sparse_index_stride", &self.config.sparse_index_stride)
            .field("memtable_entries", &self.mem.len())
            .field("memtable_bytes", &self.mem.approx_bytes())
            .field("tables", &self.manifest.read().table_count())
            .field("closed", &self.closed.load(Ordering::SeqCst))
            .finish()
    }
}

/// Best-effort close on drop: flushes whatever is still in the memtable.
/// Errors are ignored because Drop cannot propagate them; the data is still
/// safe in the WAL and will be replayed on the next startup.
impl Drop for Engine {
    fn drop(&mut self) {
        let _ = self.close();
    }
}

impl kv::KeyValueStore for Engine {
    fn put(&self, key: Vec<u8>, value: Vec<u8>) -> Result<()> {
        Engine::put(self, key, value)
    }

    fn batch_put(&self, items: Vec<(Vec<u8>, Vec<u8>)>) -> Result<usize> {
        Engine::batch_put(self, items)
    }

    fn read(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        Engine::read(self, key)
    }

    fn read_range(
        &self,
        start: &[u8],
        end: &[u8],
        limit: usize,
    ) -> Result<Vec<(Vec<u8>, Vec<u8>)>> {
        Engine::read_range(self, start, end, limit)
    }

    fn delete(&self, key: &[u8]) -> Result<()> {
        Engine::delete(self, key)
    }

    fn compact(&self) -> Result<u64> {
        Engine::compact(self)
    }

    fn close(&self) -> Result<()> {
        Engine::close(self)
    }
}

#[cfg(test)]
mod tests;
