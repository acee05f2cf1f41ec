//! Compaction: rewrite the live set into a fresh segment, retire the rest.
//!
//! The rewrite happens outside any lock; only the publish (swapping the
//! active writer and the index contents) runs under the rotation lock.
//! Writers are frozen for the whole operation via the write gate: the
//! algorithm snapshots the index once, so a write landing after the snapshot
//! would be lost when the index is swapped. Readers keep running throughout
//! and at worst see a transient miss during the swap.
//!
//! Publish-then-delete is the only safe order: a crash after the new segment
//! is written but before the old ones are deleted just leaves extra
//! segments, and the next startup scan reconstructs the same state from
//! them.

use anyhow::Result;
use segment::{segment_file_name, segment_path, Record, SegmentWriter};
use std::fs;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::Engine;

impl Engine {
    /// Rewrites every live entry into a new segment, swaps it in as the
    /// active segment, and deletes all older segment files best-effort.
    ///
    /// Returns the number of bytes reclaimed (the summed sizes of the
    /// deleted files).
    pub fn compact(&self) -> Result<u64> {
        self.ensure_open()?;
        let _freeze = self.write_gate.write();

        let snapshot: Vec<(Vec<u8>, segment::Position)> = self
            .index
            .iter()
            .map(|entry| (entry.key().clone(), *entry.value()))
            .collect();

        // Rewrite the live set into a fresh segment.
        let new_id = self.next_segment_id.fetch_add(1, Ordering::SeqCst);
        let new_writer = Arc::new(SegmentWriter::open(&self.config.data_dir, new_id)?);
        let mut new_positions = Vec::with_capacity(snapshot.len());
        for (key, position) in snapshot {
            let path = segment_path(&self.config.data_dir, position.segment_id);
            let Some(value) = segment::read_value_at(&path, position.offset)? else {
                continue; // tombstoned or unreadable, not live
            };
            let record = Record::put(key, value);
            let new_position = new_writer.append(&record)?;
            new_positions.push((record.key().to_vec(), new_position));
        }
        new_writer.sync()?;

        // Publish: swap the active writer, rebuild the index, and mark every
        // other segment obsolete, all under the rotation lock.
        let keep = segment_file_name(new_id);
        let mut obsolete = Vec::new();
        {
            let _lock = self.rotate_lock.lock();
            *self.active.write() = new_writer;

            for entry in fs::read_dir(&self.config.data_dir)? {
                let path = entry?.path();
                let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                    continue;
                };
                if name.ends_with(".seg") && name != keep {
                    obsolete.push(path);
                }
            }

            for entry in self.index.iter() {
                entry.remove();
            }
            for (key, position) in new_positions {
                self.index.insert(key, position);
            }
        }

        // Delete retired segments best-effort, summing what was freed.
        let mut reclaimed = 0u64;
        for path in &obsolete {
            let size = fs::metadata(path).map(|m| m.len()).unwrap_or(0);
            match fs::remove_file(path) {
                Ok(()) => reclaimed += size,
                Err(e) => warn!("could not delete {}: {}", path.display(), e),
            }
        }

        debug!(
            "compacted into segment {} ({} obsolete files, {} bytes reclaimed)",
            new_id,
            obsolete.len(),
            reclaimed
        );
        Ok(reclaimed)
    }
}
