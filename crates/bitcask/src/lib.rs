//! # Bitcask - Append-Only Log Engine
//!
//! A Bitcask-style key-value engine: an in-memory key→position index over
//! CRC-framed log segments, rebuilt by scanning the segments on startup.
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
//! │ write.rs → append record to active segment    │
//! │              |                                │
//! │              v                                │
//! │          index: key → (segment, offset)       │
//! │              |   (size >= limit?)             │
//! │              v          yes                   │
//! │          rotate() → new numbered segment      │
//! │                                               │
//! │ read.rs → index lookup → positional read      │
//! │ compaction.rs → rewrite live set, drop rest   │
//! └───────────────────────────────────────────────┘
//! ```
//!
//! ## Module Responsibilities
//!
//! | Module         | Purpose                                            |
//! |----------------|----------------------------------------------------|
//! | `lib.rs`       | `Engine` struct, config, open/close, rotation lock |
//! | [`recovery`]   | segment discovery and CRC-guarded index rebuild    |
//! | `write`        | `put()`, `batch_put()`, `delete()`, rotation       |
//! | `read`         | `read()`, `read_range()`                           |
//! | `compaction`   | live-set rewrite into a fresh segment              |
//!
//! ## Concurrency
//!
//! The index is a lock-free ordered map; appends serialize inside the
//! segment writer. Rotation and the compaction publish step run under a
//! dedicated lock. Mutating operations hold a shared write gate that
//! compaction takes exclusively; a write racing the compaction snapshot
//! would otherwise be silently lost when the index is swapped.
//!
//! ## Durability
//!
//! A single background task fsyncs the active segment on a configurable
//! period (group commit). Fsync failures are swallowed and retried next
//! tick. Recovery tolerates a torn tail: scanning a segment stops cleanly at
//! the first incomplete or CRC-invalid record.

mod compaction;
mod read;
mod recovery;
mod write;

use anyhow::Result;
use crossbeam_channel::{bounded, select, tick, Sender};
use crossbeam_skiplist::SkipMap;
use parking_lot::{Mutex, RwLock};
use segment::{Position, SegmentWriter};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;
use tracing::{debug, info};

/// Maximum allowed key size in bytes (64 KiB).
pub const MAX_KEY_SIZE: usize = 64 * 1024;
/// Maximum allowed value size in bytes (10 MiB).
pub const MAX_VALUE_SIZE: usize = 10 * 1024 * 1024;

/// Engine configuration with the documented defaults.
#[derive(Debug, Clone)]
pub struct Config {
    /// Directory holding all segment files; created if absent.
    pub data_dir: PathBuf,
    /// Rotation threshold per segment (soft limit). Default 128 MiB.
    pub segment_byte_limit: u64,
    /// Group-commit fsync period in milliseconds; 0 disables the task.
    /// Default 20.
    pub fsync_interval_ms: u64,
}

impl Config {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            segment_byte_limit: 128 * 1024 * 1024,
            fsync_interval_ms: 20,
        }
    }
}

/// The Bitcask engine.
///
/// Invariant: every key present in the index points at a non-tombstone
/// record carrying exactly that key; deletions remove the key from the index
/// entirely. Stale positions stay readable on disk until compaction.
pub struct Engine {
    config: Config,
    /// key → latest position, ordered bytewise for range scans.
    index: SkipMap<Vec<u8>, Position>,
    /// The writer new appends go to. Swapped by rotation and compaction;
    /// readers of the old `Arc` finish against the old segment.
    active: Arc<RwLock<Arc<SegmentWriter>>>,
    next_segment_id: AtomicU64,
    /// Serializes rotation and the compaction publish step.
    rotate_lock: Mutex<()>,
    /// Shared by mutating ops, exclusive for compaction (see module docs).
    write_gate: RwLock<()>,
    fsync_stop: Mutex<Option<Sender<()>>>,
    fsync_task: Mutex<Option<JoinHandle<()>>>,
    closed: AtomicBool,
}

impl Engine {
    /// Opens the engine: discovers segments, rebuilds the index with a
    /// CRC-guarded scan, opens a fresh active segment, and starts the
    /// periodic fsync task.
    pub fn open(config: Config) -> Result<Self> {
        std::fs::create_dir_all(&config.data_dir)?;

        let index = SkipMap::new();
        let max_id = recovery::rebuild_index(&config.data_dir, &index)?;
        let first_active = max_id.map_or(0, |id| id + 1);

        let writer = Arc::new(SegmentWriter::open(&config.data_dir, first_active)?);
        let active = Arc::new(RwLock::new(writer));

        info!(
            "bitcask opened at {} ({} live keys, active segment {})",
            config.data_dir.display(),
            index.len(),
            first_active
        );

        let engine = Self {
            next_segment_id: AtomicU64::new(first_active + 1),
            index,
            active,
            rotate_lock: Mutex::new(()),
            write_gate: RwLock::new(()),
            fsync_stop: Mutex::new(None),
            fsync_task: Mutex::new(None),
            closed: AtomicBool::new(false),
            config,
        };
        engine.start_fsync_task()?;
        Ok(engine)
    }

    /// Spawns the group-commit fsync thread when the interval is positive.
    ///
    /// The task grabs whatever writer is active at each tick; if a rotation
    /// slipped in between, fsyncing the new segment is fine.
    fn start_fsync_task(&self) -> Result<()> {
        if self.config.fsync_interval_ms == 0 {
            return Ok(());
        }
        let (stop_tx, stop_rx) = bounded::<()>(0);
        let ticker = tick(Duration::from_millis(self.config.fsync_interval_ms));
        let active = Arc::clone(&self.active);

        let handle = std::thread::Builder::new()
            .name("bitcask-fsync".to_string())
            .spawn(move || loop {
                select! {
                    recv(stop_rx) -> _ => break,
                    recv(ticker) -> _ => {
                        let writer = active.read().clone();
                        if let Err(e) = writer.sync() {
                            debug!("periodic fsync failed (will retry): {}", e);
                        }
                    }
                }
            })?;

        *self.fsync_stop.lock() = Some(stop_tx);
        *self.fsync_task.lock() = Some(handle);
        Ok(())
    }

    /// Stops the fsync task, syncs the active segment, and marks the engine
    /// closed. Idempotent; later operations fail.
    pub fn close(&self) -> Result<()> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        // Dropping the sender disconnects the channel and wakes the task.
        self.fsync_stop.lock().take();
        if let Some(handle) = self.fsync_task.lock().take() {
            let _ = handle.join();
        }
        let writer = self.active.read().clone();
        let _ = writer.sync();
        debug!("bitcask at {} closed", self.config.data_dir.display());
        Ok(())
    }

    /// Number of live keys in the index.
    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Id of the segment currently receiving appends.
    pub fn active_segment_id(&self) -> u64 {
        self.active.read().id()
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub(crate) fn ensure_open(&self) -> Result<()> {
        anyhow::ensure!(!self.closed.load(Ordering::SeqCst), "engine is closed");
        Ok(())
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("data_dir", &self.config.data_dir)
            .field("segment_byte_limit", &self.config.segment_byte_limit)
            .field("fsync_interval_ms", &self.config.fsync_interval_ms)
            .field("live_keys", &self.index.len())
            .field("active_segment", &self.active.read().id())
            .field("closed", &self.closed.load(Ordering::SeqCst))
            .finish()
    }
}

/// Best-effort close on drop: stops the fsync thread and syncs the active
/// segment. Errors are ignored because Drop cannot propagate them; the data
/// is recoverable from the segments regardless.
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
