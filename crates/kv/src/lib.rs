//! # KV - Shared Key-Value Contract
//!
//! The abstract operations both DriftKV storage engines implement. Callers
//! (the cli shell, a network frontend) program against this trait and never
//! against a concrete engine.
//!
//! ## Lifecycle
//!
//! There is no separate `start` operation: constructing an engine via its
//! `open(config)` performs recovery and leaves the engine serving. `close`
//! releases the active writer and background tasks; operations invoked after
//! `close` fail with a lifecycle error. Dropping an engine closes it
//! best-effort.
//!
//! ## Keys and values
//!
//! Keys are non-empty byte sequences ordered bytewise; values are opaque
//! bytes. Callers that need textual keys use UTF-8 by convention; the
//! engines never inspect key contents.

use anyhow::Result;

/// The operations shared by the Bitcask and LSM engines.
///
/// All methods are blocking and may surface an I/O failure. Implementations
/// take `&self` and are internally synchronized, so a single engine value can
/// be shared across threads behind an `Arc`.
pub trait KeyValueStore: Send + Sync {
    /// Inserts or overwrites a key.
    fn put(&self, key: Vec<u8>, value: Vec<u8>) -> Result<()>;

    /// Inserts many pairs in one serialized append; later occurrences of a
    /// duplicated key win. Returns the number of items written. An empty
    /// batch is not an error and returns zero.
    fn batch_put(&self, items: Vec<(Vec<u8>, Vec<u8>)>) -> Result<usize>;

    /// Looks up the latest live value for a key.
    ///
    /// Returns `None` for absent or tombstoned keys.
    fn read(&self, key: &[u8]) -> Result<Option<Vec<u8>>>;

    /// Lexicographic range scan over `[start, end]`, both bounds inclusive.
    ///
    /// Returns up to `limit` live entries in strictly ascending key order,
    /// each carrying its latest value.
    fn read_range(&self, start: &[u8], end: &[u8], limit: usize)
        -> Result<Vec<(Vec<u8>, Vec<u8>)>>;

    /// Deletes a key by writing a tombstone. Deleting an absent key is not
    /// an error.
    fn delete(&self, key: &[u8]) -> Result<()>;

    /// Reclaims space held by stale records. Returns the number of bytes
    /// freed (zero when there was nothing to do).
    fn compact(&self) -> Result<u64>;

    /// Flushes pending state and releases the engine's resources. Idempotent.
    fn close(&self) -> Result<()>;
}
