//! In-memory ordered table absorbing recent LSM writes before flush.
//!
//! Built on a lock-free skip list so point lookups never block writers and a
//! single key lookup always observes a consistent entry. Deletions install
//! [`Value::Tombstone`], a sentinel distinct from every real value: a
//! zero-length put stays distinguishable from a delete while the entry
//! lives here.

use crossbeam_skiplist::SkipMap;
use std::ops::Bound;
use std::sync::atomic::{AtomicUsize, Ordering};

/// A memtable entry: either live bytes or a deletion marker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    Put(Vec<u8>),
    Tombstone,
}

impl Value {
    pub fn is_tombstone(&self) -> bool {
        matches!(self, Value::Tombstone)
    }

    /// The live bytes, or `None` for a tombstone.
    pub fn as_put(&self) -> Option<&[u8]> {
        match self {
            Value::Put(v) => Some(v),
            Value::Tombstone => None,
        }
    }

    fn byte_len(&self) -> usize {
        match self {
            Value::Put(v) => v.len(),
            Value::Tombstone => 0,
        }
    }
}

/// Concurrent ordered map from key bytes to [`Value`].
///
/// The approximate footprint is the running sum of key and value byte
/// lengths of every insert since the last [`clear`](Memtable::clear);
/// overwrites are counted again rather than reconciled, which over-estimates
/// but can only make a flush happen sooner.
pub struct Memtable {
    map: SkipMap<Vec<u8>, Value>,
    approx_bytes: AtomicUsize,
}

impl Memtable {
    pub fn new() -> Self {
        Self {
            map: SkipMap::new(),
            approx_bytes: AtomicUsize::new(0),
        }
    }

    /// Installs (or overwrites) the value for a key.
    pub fn put(&self, key: Vec<u8>, value: Vec<u8>) {
        self.approx_bytes
            .fetch_add(key.len() + value.len(), Ordering::Relaxed);
        self.map.insert(key, Value::Put(value));
    }

    /// Installs a tombstone for a key.
    pub fn delete(&self, key: Vec<u8>) {
        self.approx_bytes.fetch_add(key.len(), Ordering::Relaxed);
        self.map.insert(key, Value::Tombstone);
    }

    /// Looks up the entry for a key. A tombstone is returned as such;
    /// interpreting it as a miss is the engine's business.
    pub fn get(&self, key: &[u8]) -> Option<Value> {
        self.map.get(key).map(|entry| entry.value().clone())
    }

    /// Snapshots the sub-range `[start, end]` (both inclusive) in ascending
    /// key order, tombstones included.
    pub fn range(&self, start: &[u8], end: &[u8]) -> Vec<(Vec<u8>, Value)> {
        self.map
            .range::<[u8], _>((Bound::Included(start), Bound::Included(end)))
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect()
    }

    /// Snapshots all entries in ascending key order, tombstones included.
    pub fn snapshot(&self) -> Vec<(Vec<u8>, Value)> {
        self.map
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect()
    }

    /// Removes every entry and resets the footprint counter.
    pub fn clear(&self) {
        for entry in self.map.iter() {
            entry.remove();
        }
        self.approx_bytes.store(0, Ordering::Relaxed);
    }

    /// Approximate footprint in bytes (see the type-level docs).
    pub fn approx_bytes(&self) -> usize {
        self.approx_bytes.load(Ordering::Relaxed)
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

impl Default for Memtable {
    fn default() -> Self {
        Self::new()
    }
}
