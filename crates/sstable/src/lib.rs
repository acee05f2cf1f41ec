//! # SSTable - Sorted String Table
//!
//! Immutable, on-disk storage files for the LSM engine. When the in-memory
//! [`memtable`] exceeds its size threshold the engine flushes it to disk as a
//! sorted table. Tables are *write-once, read-many*: once created they are
//! never modified, only replaced during compaction.
//!
//! ## File layout
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────────┐
//! │ DATA SECTION (sorted key/value entries)                        │
//! │                                                               │
//! │ key_len (u32 BE) | val_len (u32 BE) | key | value              │
//! │                                                               │
//! │ ... repeated, ascending by key, duplicates forbidden ...       │
//! ├───────────────────────────────────────────────────────────────┤
//! │ SPARSE INDEX SECTION (every N-th data entry)                   │
//! │                                                               │
//! │ key_len (u32 BE) | key | data_offset (u64 BE)                  │
//! ├───────────────────────────────────────────────────────────────┤
//! │ FOOTER (always last 20 bytes)                                  │
//! │                                                               │
//! │ magic (u32 BE) "SST1" | index_count (u32 BE)                   │
//! │ index_start (u64 BE) | reserved (u32 BE)                       │
//! └───────────────────────────────────────────────────────────────┘
//! ```
//!
//! The sparse index records the first key of every N-th entry (N is the
//! configurable stride, default 64) together with that entry's offset, so a
//! lookup binary-searches the in-memory index and then scans at most one
//! stride of the data section.
//!
//! A **zero-length value denotes a tombstone** carried through flush and
//! compaction; writers propagate them, readers surface them verbatim, and
//! the engine interprets them as misses. Real empty values are therefore
//! unrepresentable inside tables.

mod format;
mod merge;
mod reader;
mod writer;

use std::io;
use thiserror::Error;

pub use format::{Footer, FOOTER_LEN, TABLE_MAGIC};
pub use merge::MergeIter;
pub use reader::{TableRangeIter, TableReader};
pub use writer::{TableWriter, DEFAULT_INDEX_EVERY};

/// Errors surfaced by table operations.
///
/// Truncated data entries are not errors: iteration and lookups treat a
/// short read inside the data section as a clean end of input. A damaged
/// footer, by contrast, makes the whole table unusable and is a hard error
/// at open time.
#[derive(Debug, Error)]
pub enum TableError {
    /// An underlying I/O error.
    #[error("io error: {0}")]
    Io(#[from] io::Error),

    /// The footer magic did not match; the file is not a table (or its tail
    /// was destroyed).
    #[error("bad table footer magic {found:#010x}")]
    CorruptFooter { found: u32 },

    /// The file is too small to even hold a footer.
    #[error("table file too small: {len} bytes")]
    TooSmall { len: u64 },

    /// The footer points outside the file.
    #[error("table index offset {index_start} out of bounds")]
    IndexOutOfBounds { index_start: u64 },

    /// The sparse index block could not be parsed.
    #[error("corrupt table index block")]
    CorruptIndex,

    /// The writer was handed two entries with the same key.
    #[error("duplicate key in table input")]
    DuplicateKey,
}
