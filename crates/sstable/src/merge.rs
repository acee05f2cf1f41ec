//! K-way merge over sorted key/value streams.
//!
//! Produces entries in ascending key order. When the same key appears in
//! multiple sources, the source listed **earliest wins** and every other
//! source's entry for that key is consumed and discarded. The engine lists
//! its sources freshest-first (memtable, then tables newest to oldest), so
//! "earliest wins" is exactly newest-wins.
//!
//! Tombstones (zero-length values) flow through unfiltered: a newer
//! tombstone must be able to shadow an older live value, so filtering can
//! only happen after duplicate resolution, in the caller.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

type Source = Box<dyn Iterator<Item = (Vec<u8>, Vec<u8>)>>;

/// A pending entry from one source, ordered for the merge heap.
struct HeapEntry {
    key: Vec<u8>,
    value: Vec<u8>,
    source: usize,
}

impl PartialEq for HeapEntry {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key && self.source == other.source
    }
}

impl Eq for HeapEntry {}

impl PartialOrd for HeapEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for HeapEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        // BinaryHeap is a max-heap; reverse both comparisons so the smallest
        // key pops first and, on equal keys, the earliest-listed source.
        other
            .key
            .cmp(&self.key)
            .then_with(|| other.source.cmp(&self.source))
    }
}

/// Merges N sorted `(key, value)` streams into one deduplicated stream.
pub struct MergeIter {
    sources: Vec<Source>,
    heap: BinaryHeap<HeapEntry>,
}

impl MergeIter {
    /// Creates a merge over `sources`, each of which must yield entries in
    /// strictly ascending key order. Earlier sources shadow later ones.
    pub fn new(mut sources: Vec<Source>) -> Self {
        let mut heap = BinaryHeap::new();
        for (i, source) in sources.iter_mut().enumerate() {
            if let Some((key, value)) = source.next() {
                heap.push(HeapEntry { key, value, source: i });
            }
        }
        Self { sources, heap }
    }

    fn advance(&mut self, source: usize) {
        if let Some((key, value)) = self.sources[source].next() {
            self.heap.push(HeapEntry { key, value, source });
        }
    }
}

impl Iterator for MergeIter {
    type Item = (Vec<u8>, Vec<u8>);

    fn next(&mut self) -> Option<Self::Item> {
        let top = self.heap.pop()?;
        self.advance(top.source);

        // Drain every other source's entry for the same key; the popped
        // entry came from the earliest source and wins.
        while let Some(peek) = self.heap.peek() {
            if peek.key != top.key {
                break;
            }
            let dup = self.heap.pop().expect("peeked entry");
            self.advance(dup.source);
        }

        Some((top.key, top.value))
    }
}
