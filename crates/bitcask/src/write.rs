//! Write path: `put()`, `batch_put()`, `delete()`, and size-based rotation.
//!
//! Every mutation appends a record to the active segment, then updates the
//! in-memory index with the returned position. A write-side I/O failure does
//! not roll the index back: a partially present record is rejected by the
//! CRC scan on recovery.

use anyhow::Result;
use segment::{Record, SegmentWriter};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::debug;

use crate::{Engine, MAX_KEY_SIZE, MAX_VALUE_SIZE};

impl Engine {
    /// Inserts or overwrites a key.
    pub fn put(&self, key: Vec<u8>, value: Vec<u8>) -> Result<()> {
        self.ensure_open()?;
        validate(&key, Some(&value))?;

        {
            let _gate = self.write_gate.read();
            let record = Record::put(key, value);
            let writer = self.active.read().clone();
            let position = writer.append(&record)?;
            self.index.insert(record.key().to_vec(), position);
        }
        self.maybe_rotate()
    }

    /// Appends the whole batch contiguously and installs each record's own
    /// position (not the batch start) under its key. Later occurrences of
    /// a duplicated key overwrite earlier ones. Returns the number of items
    /// written; an empty batch writes nothing and returns zero.
    pub fn batch_put(&self, items: Vec<(Vec<u8>, Vec<u8>)>) -> Result<usize> {
        self.ensure_open()?;
        if items.is_empty() {
            return Ok(0);
        }
        for (key, value) in &items {
            validate(key, Some(value))?;
        }
        let records: Vec<Record> = items
            .into_iter()
            .map(|(key, value)| Record::put(key, value))
            .collect();

        {
            let _gate = self.write_gate.read();
            let writer = self.active.read().clone();
            let positions = writer.append_many(&records)?;
            for (record, position) in records.iter().zip(&positions) {
                self.index.insert(record.key().to_vec(), *position);
            }
        }
        self.maybe_rotate()?;
        Ok(records.len())
    }

    /// Deletes a key by appending a tombstone and evicting the key from the
    /// index. Deleting an absent key still logs the tombstone and succeeds.
    pub fn delete(&self, key: &[u8]) -> Result<()> {
        self.ensure_open()?;
        validate(key, None)?;

        {
            let _gate = self.write_gate.read();
            let record = Record::tombstone(key.to_vec());
            let writer = self.active.read().clone();
            writer.append(&record)?;
            self.index.remove(key);
        }
        self.maybe_rotate()
    }

    fn maybe_rotate(&self) -> Result<()> {
        if self.active.read().size() >= self.config.segment_byte_limit {
            self.rotate()?;
        }
        Ok(())
    }

    /// Opens a new segment at the next id and swaps it in under the rotation
    /// lock. The previous writer closes once the last in-flight append
    /// through its `Arc` finishes.
    fn rotate(&self) -> Result<()> {
        let _lock = self.rotate_lock.lock();
        if self.active.read().size() < self.config.segment_byte_limit {
            return Ok(()); // someone else rotated while we waited
        }
        let id = self.next_segment_id.fetch_add(1, Ordering::SeqCst);
        let next = Arc::new(SegmentWriter::open(&self.config.data_dir, id)?);
        *self.active.write() = next;
        debug!("rotated to segment {}", id);
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
