//! Write path: `put()`, `delete()`, `batch_put()`, and the memtable flush.
//!
//! Every mutation is appended to the WAL first, then applied to the
//! memtable. When the memtable's approximate footprint crosses the
//! configured threshold, it is flushed: snapshot, clear, write a sorted
//! table, rotate the WAL, publish the table at the manifest head.

use anyhow::Result;
use memtable::Value;
use sstable::TableWriter;
use tracing::{debug, warn};
use wal::WalRecord;

use crate::{Engine, MAX_KEY_SIZE, MAX_VALUE_SIZE};

impl Engine {
    /// Inserts or overwrites a key.
    pub fn put(&self, key: Vec<u8>, value: Vec<u8>) -> Result<()> {
        self.ensure_open()?;
        validate(&key, Some(&value))?;

        {
            let _gate = self.gate.read();
            self.wal.lock().append(&WalRecord::Put {
                key: key.clone(),
                value: value.clone(),
            })?;
            self.mem.put(key, value);
        }
        self.maybe_flush()
    }

    /// Deletes a key by logging and installing a tombstone. Deleting an
    /// absent key is not an error.
    pub fn delete(&self, key: &[u8]) -> Result<()> {
        self.ensure_open()?;
        validate(key, None)?;

        {
            let _gate = self.gate.read();
            self.wal.lock().append(&WalRecord::Delete { key: key.to_vec() })?;
            self.mem.delete(key.to_vec());
        }
        self.maybe_flush()
    }

    /// Writes a batch: all records go to the WAL, then all memtable updates
    /// apply in batch order, so a duplicated key ends up with its last
    /// occurrence. Returns the number of items written; an empty batch
    /// returns zero.
    pub fn batch_put(&self, items: Vec<(Vec<u8>, Vec<u8>)>) -> Result<usize> {
        self.ensure_open()?;
        if items.is_empty() {
            return Ok(0);
        }
        for (key, value) in &items {
            validate(key, Some(value))?;
        }

        let count = items.len();
        {
            let _gate = self.gate.read();
            let mut wal = self.wal.lock();
            for (key, value) in &items {
                wal.append(&WalRecord::Put {
                    key: key.clone(),
                    value: value.clone(),
                })?;
            }
            drop(wal);
            for (key, value) in items {
                self.mem.put(key, value);
            }
        }
        self.maybe_flush()?;
        Ok(count)
    }

    /// Forces a flush of the current memtable. A no-op when it is empty.
    pub fn flush(&self) -> Result<()> {
        self.ensure_open()?;
        let _gate = self.gate.write();
        self.flush_locked()
    }

    fn maybe_flush(&self) -> Result<()> {
        if self.mem.approx_bytes() < self.config.memtable_byte_limit {
            return Ok(());
        }
        let _gate = self.gate.write();
        // Someone else may have flushed while we waited for the gate.
        if self.mem.approx_bytes() >= self.config.memtable_byte_limit {
            self.flush_locked()?;
        }
        Ok(())
    }

    /// The flush itself. Caller holds the write gate exclusively.
    ///
    /// Order matters: the table write is durable (temp + rename + dir fsync)
    /// before the WAL rotates, and the manifest persists before the archived
    /// WAL is reclaimed. Tombstones are written as zero-length values so the
    /// deletion stays visible across older tables.
    pub(crate) fn flush_locked(&self) -> Result<()> {
        if self.mem.is_empty() {
            return Ok(());
        }

        let snapshot = self.mem.snapshot();
        self.mem.clear();
        let count = snapshot.len();
        let entries: Vec<(Vec<u8>, Vec<u8>)> = snapshot
            .into_iter()
            .map(|(key, value)| {
                let bytes = match value {
                    Value::Put(bytes) => bytes,
                    Value::Tombstone => Vec::new(),
                };
                (key, bytes)
            })
            .collect();

        let table = TableWriter::write(
            &self.config.data_dir,
            entries,
            self.config.sparse_index_stride,
        )?;

        let archived = self.wal.lock().rotate()?;

        {
            let mut manifest = self.manifest.write();
            manifest.add_head(table.clone())?;
            manifest.store_atomic()?;
        }

        // The flush that rotated this WAL has published its table; the
        // archive is obsolete.
        if let Err(e) = std::fs::remove_file(&archived) {
            warn!("could not remove archived WAL {}: {}", archived.display(), e);
        }

        debug!("flushed {} entries into {}", count, table.display());
        Ok(())
    }
}

fn validate(key: &[u8], value: Option<&[u8]>) -> Result<()> {
    anyhow::ensure!(!key.is_empty(), "key must not be empty");
    anyhow::ensure!(
        key.len() <= MAX_KEY_SIZE,
        "key too large: {} bytes (max {})",
        key.len(),
        MAX_KEY_SIZE
    );
    if let Some(value) = value {
        anyhow::ensure!(
            value.len() <= MAX_VALUE_SIZE,
            "value too large: {} bytes (max {})",
            value.len(),
            MAX_VALUE_SIZE
        );
    }
    Ok(())
}
