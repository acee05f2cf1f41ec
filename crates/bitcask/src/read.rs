//! Read path: `read()` and `read_range()`.
//!
//! Point lookups resolve through the index to a position and read the value
//! with a fresh read-only handle; readers never share a handle with the
//! writer. The stored CRC is not re-verified on this hot path; recovery is
//! the verification boundary.

use anyhow::Result;
use segment::segment_path;
use std::ops::Bound;

use crate::Engine;

impl Engine {
    /// Looks up the latest live value for a key.
    ///
    /// Returns `None` for absent keys and for positions that turn out to be
    /// tombstoned or unreadable (the latter should not happen for indexed
    /// keys, but is defended).
    pub fn read(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        self.ensure_open()?;
        let position = match self.index.get(key) {
            Some(entry) => *entry.value(),
            None => return Ok(None),
        };
        let path = segment_path(&self.config.data_dir, position.segment_id);
        Ok(segment::read_value_at(&path, position.offset)?)
    }

    /// Lexicographic range scan over `[start, end]`, both bounds inclusive,
    /// in ascending key order, up to `limit` entries.
    ///
    /// Keys whose value cannot be materialized (e.g. their segment was
    /// concurrently compacted away) are skipped rather than reported.
    pub fn read_range(
        &self,
        start: &[u8],
        end: &[u8],
        limit: usize,
    ) -> Result<Vec<(Vec<u8>, Vec<u8>)>> {
        self.ensure_open()?;
        if limit == 0 || start > end {
            return Ok(Vec::new());
        }

        let mut out = Vec::new();
        for entry in self
            .index
            .range::<[u8], _>((Bound::Included(start), Bound::Included(end)))
        {
            if out.len() >= limit {
                break;
            }
            let position = *entry.value();
            let path = segment_path(&self.config.data_dir, position.segment_id);
            if let Some(value) = segment::read_value_at(&path, position.offset)? {
                out.push((entry.key().clone(), value));
            }
        }
        Ok(out)
    }
}
