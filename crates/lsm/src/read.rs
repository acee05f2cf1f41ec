//! Read path: `read()` and `read_range()`.
//!
//! Point lookups check the memtable first (its tombstone sentinel is a
//! definitive miss), then the manifest's readers newest-first; the first hit
//! wins. Inside tables a zero-length value is a tombstone; that
//! interpretation is applied uniformly here, which is why real empty values
//! are unrepresentable once flushed.
//!
//! Range scans k-way merge the memtable sub-range with every table's range
//! iterator, listed freshest-first so ties resolve to the newest entry, then
//! filter tombstones.

use anyhow::Result;
use memtable::Value;
use sstable::MergeIter;

use crate::Engine;

impl Engine {
    /// Looks up the latest live value for a key.
    pub fn read(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        self.ensure_open()?;

        // 1. Memtable: both hits and tombstones are definitive.
        if let Some(entry) = self.mem.get(key) {
            return Ok(match entry {
                Value::Put(bytes) => Some(bytes),
                Value::Tombstone => None,
            });
        }

        // 2. Tables, newest first; first hit wins. Clone the reader handles
        // out so the manifest lock is not held across file I/O.
        let readers = self.manifest.read().readers_newest_first();
        for reader in readers {
            if let Some(value) = reader.get(key)? {
                return Ok(if value.is_empty() { None } else { Some(value) });
            }
        }

        Ok(None)
    }

    /// Lexicographic range scan over `[start, end]`, both bounds inclusive,
    /// up to `limit` live entries in strictly ascending key order.
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

        // Sources ordered freshest-first: the merge resolves equal keys in
        // favor of the earliest source.
        let mut sources: Vec<Box<dyn Iterator<Item = (Vec<u8>, Vec<u8>)>>> = Vec::new();
        sources.push(Box::new(self.mem.range(start, end).into_iter().map(
            |(key, value)| {
                let bytes = match value {
                    Value::Put(bytes) => bytes,
                    Value::Tombstone => Vec::new(),
                };
                (key, bytes)
            },
        )));
        let readers = self.manifest.read().readers_newest_first();
        for reader in readers {
            sources.push(Box::new(reader.range_iter(start, end)));
        }

        let mut out = Vec::new();
        for (key, value) in MergeIter::new(sources) {
            if out.len() >= limit {
                break;
            }
            if value.is_empty() {
                continue; // tombstone
            }
            out.push((key, value));
        }
        Ok(out)
    }
}
