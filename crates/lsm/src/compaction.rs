//! Size-tiered, manually triggered compaction.
//!
//! Picks the oldest tables, merges them newest-wins into one replacement,
//! publishes the swap through the manifest, then deletes the inputs.
//! Publish-then-delete is the only safe order: a crash after the manifest
//! persists but before the deletes just leaves garbage for the next
//! compaction (or the startup sweep) to reclaim.
//!
//! The replacement takes the inputs' place at the old end of the manifest,
//! so the merge never changes which value a read observes. Tombstones are
//! **preserved** in the output: within the merged set a newer tombstone must
//! keep shadowing the older values it erased.

use anyhow::Result;
use sstable::{TableReader, TableWriter};
use std::collections::BTreeMap;
use std::fs;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::{Engine, COMPACTION_PICK_COUNT};

impl Engine {
    /// Merges the oldest [`COMPACTION_PICK_COUNT`] tables into one. With
    /// fewer than two candidates there is nothing to merge and zero is
    /// returned. Returns the summed sizes of the deleted input files.
    pub fn compact(&self) -> Result<u64> {
        self.ensure_open()?;
        let _freeze = self.gate.write();

        let olds = self.manifest.read().oldest_n(COMPACTION_PICK_COUNT);
        if olds.len() < 2 {
            return Ok(0);
        }

        // Apply oldest first so each newer table overwrites what it shadows.
        let mut merged: BTreeMap<Vec<u8>, Vec<u8>> = BTreeMap::new();
        for path in &olds {
            let reader = Arc::new(TableReader::open(path)?);
            for (key, value) in reader.iter() {
                merged.insert(key, value);
            }
        }

        let entries: Vec<(Vec<u8>, Vec<u8>)> = merged.into_iter().collect();
        let out_count = entries.len();
        let new_table = TableWriter::write(
            &self.config.data_dir,
            entries,
            self.config.sparse_index_stride,
        )?;

        {
            let mut manifest = self.manifest.write();
            manifest.replace(&olds, new_table.clone())?;
            manifest.store_atomic()?;
        }

        let mut reclaimed = 0u64;
        for path in &olds {
            let size = fs::metadata(path).map(|m| m.len()).unwrap_or(0);
            match fs::remove_file(path) {
                Ok(()) => reclaimed += size,
                Err(e) => warn!("could not delete {}: {}", path.display(), e),
            }
        }

        debug!(
            "compacted {} tables into {} ({} entries, {} bytes reclaimed)",
            olds.len(),
            new_table.display(),
            out_count,
            reclaimed
        );
        Ok(reclaimed)
    }
}
