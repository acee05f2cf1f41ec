use byteorder::{BigEndian, ByteOrder};
use std::fs::File;
use std::os::unix::fs::FileExt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::format::{read_footer, ENTRY_HEADER_LEN, FOOTER_LEN};
use crate::TableError;

/// Maximum key size we'll allocate during reads. Bounds allocations on
/// corrupt files.
const MAX_KEY_BYTES: usize = 64 * 1024;
/// Maximum value size we'll allocate during reads.
const MAX_VALUE_BYTES: usize = 10 * 1024 * 1024;

/// Reads an immutable sorted table.
///
/// On [`open`](TableReader::open) the footer is validated (a bad magic is a
/// hard error; the table must not be served) and the entire sparse index is
/// loaded into memory; it is small, one entry per stride of data entries.
///
/// The reader holds one read-only file handle and uses **positional reads
/// only**, so a single reader can serve parallel lookups on distinct regions
/// of the file with no shared cursor. The manifest shares readers across
/// concurrent reads via `Arc`.
pub struct TableReader {
    path: PathBuf,
    file: File,
    /// Sparse index: first key of every stride, with that entry's offset.
    index: Vec<(Vec<u8>, u64)>,
    /// Offset where the data section ends (== index start).
    data_end: u64,
}

impl TableReader {
    /// Opens a table read-only, validating the footer and loading the sparse
    /// index.
    pub fn open(path: &Path) -> Result<Self, TableError> {
        let file = File::open(path)?;
        let file_len = file.metadata()?.len();
        let footer = read_footer(&file, file_len)?;

        // The whole index block sits between data_end and the footer; read
        // it in one positional read and parse in memory.
        let index_block_len = (file_len - FOOTER_LEN - footer.index_start) as usize;
        let mut block = vec![0u8; index_block_len];
        file.read_exact_at(&mut block, footer.index_start)?;

        let mut index = Vec::with_capacity(footer.index_count as usize);
        let mut pos = 0usize;
        for _ in 0..footer.index_count {
            if pos + 4 > block.len() {
                return Err(TableError::CorruptIndex);
            }
            let klen = BigEndian::read_u32(&block[pos..pos + 4]) as usize;
            pos += 4;
            if klen > MAX_KEY_BYTES || pos + klen + 8 > block.len() {
                return Err(TableError::CorruptIndex);
            }
            let key = block[pos..pos + klen].to_vec();
            pos += klen;
            let offset = BigEndian::read_u64(&block[pos..pos + 8]);
            pos += 8;
            index.push((key, offset));
        }

        Ok(Self {
            path: path.to_path_buf(),
            file,
            index,
            data_end: footer.index_start,
        })
    }

    /// Path of the underlying `.sst` file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Point lookup.
    ///
    /// Binary-searches the sparse index for the greatest index key `<= key`,
    /// then scans the data section from that offset until the current key
    /// exceeds `key` (miss) or equals it (hit, value returned verbatim; a
    /// zero-length value is a tombstone carried through compaction, and
    /// reading it as a miss is the engine's policy, not ours).
    pub fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, TableError> {
        let mut pos = self.seek_offset(key);
        while let Some((entry_key, value, next)) = self.read_entry_at(pos) {
            if entry_key.as_slice() > key {
                return Ok(None); // sorted, no more matches
            }
            if entry_key.as_slice() == key {
                return Ok(Some(value));
            }
            pos = next;
        }
        Ok(None)
    }

    /// Iterator over entries with keys in `[start, end]`, both inclusive.
    ///
    /// The iterator owns a handle to the reader, so it stays valid while the
    /// manifest swaps readers underneath. Tombstones (zero-length values)
    /// are yielded like any other entry. Truncated or corrupt data
    /// terminates the iterator cleanly.
    pub fn range_iter(self: Arc<Self>, start: &[u8], end: &[u8]) -> TableRangeIter {
        let pos = self.seek_offset(start);
        TableRangeIter {
            reader: self,
            pos,
            start: start.to_vec(),
            end: Some(end.to_vec()),
        }
    }

    /// Iterator over every entry in the table, in key order.
    pub fn iter(self: Arc<Self>) -> TableRangeIter {
        TableRangeIter {
            reader: self,
            pos: 0,
            start: Vec::new(),
            end: None,
        }
    }

    /// Offset of the stride containing the greatest index key `<= key`.
    ///
    /// Falls back to offset 0: the first data entry is always indexed, so the
    /// fallback only happens when `key` sorts before the whole table and the
    /// scan terminates immediately.
    fn seek_offset(&self, key: &[u8]) -> u64 {
        let idx = self
            .index
            .partition_point(|(index_key, _)| index_key.as_slice() <= key);
        if idx == 0 {
            0
        } else {
            self.index[idx - 1].1
        }
    }

    /// Decodes the data entry at `pos`.
    ///
    /// Returns `(key, value, next_pos)`, or `None` at the data section end or
    /// on any short read or implausible length: a torn or corrupt entry
    /// terminates scans cleanly rather than raising.
    fn read_entry_at(&self, pos: u64) -> Option<(Vec<u8>, Vec<u8>, u64)> {
        if pos + ENTRY_HEADER_LEN as u64 > self.data_end {
            return None;
        }
        let mut header = [0u8; ENTRY_HEADER_LEN];
        self.file.read_exact_at(&mut header, pos).ok()?;
        let klen = BigEndian::read_u32(&header[0..4]) as usize;
        let vlen = BigEndian::read_u32(&header[4..8]) as usize;
        if klen == 0 || klen > MAX_KEY_BYTES || vlen > MAX_VALUE_BYTES {
            return None;
        }

        let next = pos + (ENTRY_HEADER_LEN + klen + vlen) as u64;
        if next > self.data_end {
            return None;
        }

        let mut key = vec![0u8; klen];
        self.file
            .read_exact_at(&mut key, pos + ENTRY_HEADER_LEN as u64)
            .ok()?;
        let mut value = vec![0u8; vlen];
        self.file
            .read_exact_at(&mut value, pos + (ENTRY_HEADER_LEN + klen) as u64)
            .ok()?;
        Some((key, value, next))
    }
}

/// Forward iterator over a table's data section, bounds inclusive.
pub struct TableRangeIter {
    reader: Arc<TableReader>,
    pos: u64,
    start: Vec<u8>,
    /// `None` means unbounded (full-table scan).
    end: Option<Vec<u8>>,
}

impl Iterator for TableRangeIter {
    type Item = (Vec<u8>, Vec<u8>);

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let (key, value, next) = self.reader.read_entry_at(self.pos)?;
            self.pos = next;
            // The seek lands on the stride's first key, which may precede
            // `start`; skip up to the requested bound.
            if key < self.start {
                continue;
            }
            if let Some(end) = &self.end {
                if key.as_slice() > end.as_slice() {
                    return None;
                }
            }
            return Some((key, value));
        }
    }
}
