//! # Segment - Append-Only Log Segments
//!
//! The on-disk layer of the Bitcask engine: a binary record codec, positions
//! into numbered segment files, a write-serializing appender, and a
//! CRC-guarded sequential scan used to rebuild the in-memory index on
//! startup.
//!
//! ## Binary Record Format
//!
//! ```text
//! [crc32: u32 BE][flag: u8][key_len: u32 BE][val_len: u32 BE][key][value]
//! ```
//!
//! `flag` is `0` for a put and `1` for a tombstone (`val_len` is then zero).
//! The CRC32 (IEEE/zlib polynomial) covers `(flag, key, value)` in that
//! order. Putting the CRC first lets recovery detect a torn tail before
//! trusting any length field.
//!
//! Segment files are named `%020d.seg` after their id; ids grow
//! monotonically and files are never renumbered or rewritten in place.
//!
//! ## Reader policy
//!
//! Readers never share a file handle with the writer: every read opens its
//! own read-only handle and uses positional reads, so there is no cursor to
//! race on.

use byteorder::{BigEndian, ByteOrder};
use parking_lot::Mutex;
use std::fs::{File, OpenOptions};
use std::io::{self, BufReader, Read, Write};
use std::os::unix::fs::FileExt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

/// Fixed record header: crc(4) + flag(1) + key_len(4) + val_len(4).
pub const HEADER_LEN: usize = 4 + 1 + 4 + 4;

/// Largest key length accepted when decoding (matches the write-side limit).
pub const MAX_KEY_BYTES: usize = 64 * 1024;
/// Largest value length accepted when decoding (matches the write-side limit).
pub const MAX_VALUE_BYTES: usize = 10 * 1024 * 1024;

const FLAG_PUT: u8 = 0;
const FLAG_TOMBSTONE: u8 = 1;

/// Returns the file name of the segment with the given id (`%020d.seg`).
pub fn segment_file_name(id: u64) -> String {
    format!("{:020}.seg", id)
}

/// Returns the path of the segment with the given id inside `dir`.
pub fn segment_path(dir: &Path, id: u64) -> PathBuf {
    dir.join(segment_file_name(id))
}

/// Parses a segment id back out of a file name produced by
/// [`segment_file_name`]. Returns `None` for anything else.
pub fn parse_segment_id(file_name: &str) -> Option<u64> {
    let stem = file_name.strip_suffix(".seg")?;
    if stem.len() != 20 {
        return None;
    }
    stem.parse().ok()
}

/// Immutable logical address of a record inside a segment.
///
/// `offset` points at the first byte of the record header. Positions are
/// created, never mutated; a position goes stale (but stays readable) when a
/// newer record for the same key is appended elsewhere.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Position {
    pub segment_id: u64,
    pub offset: u64,
}

/// A single log record: a put or a tombstone, plus its CRC.
///
/// The CRC is computed at construction; [`Record::compute_crc`] is the single
/// CRC path shared with recovery, which recomputes rather than trusting the
/// stored value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    flag: u8,
    key: Vec<u8>,
    value: Vec<u8>,
    crc: u32,
}

impl Record {
    /// Creates a normal put record.
    pub fn put(key: Vec<u8>, value: Vec<u8>) -> Self {
        let crc = Self::compute_crc(FLAG_PUT, &key, &value);
        Self { flag: FLAG_PUT, key, value, crc }
    }

    /// Creates a tombstone record (value length is zero).
    pub fn tombstone(key: Vec<u8>) -> Self {
        let crc = Self::compute_crc(FLAG_TOMBSTONE, &key, &[]);
        Self { flag: FLAG_TOMBSTONE, key, value: Vec::new(), crc }
    }

    /// CRC32 over `(flag, key, value)`, the only checksum used anywhere in
    /// the segment format.
    pub fn compute_crc(flag: u8, key: &[u8], value: &[u8]) -> u32 {
        let mut hasher = crc32fast::Hasher::new();
        hasher.update(&[flag]);
        hasher.update(key);
        hasher.update(value);
        hasher.finalize()
    }

    /// Total serialized size in bytes (header + payload).
    pub fn encoded_len(&self) -> usize {
        HEADER_LEN + self.key.len() + self.value.len()
    }

    /// Serializes the record into `buf` (appended, not overwritten).
    pub fn encode_into(&self, buf: &mut Vec<u8>) {
        buf.reserve(self.encoded_len());
        let mut header = [0u8; HEADER_LEN];
        BigEndian::write_u32(&mut header[0..4], self.crc);
        header[4] = self.flag;
        BigEndian::write_u32(&mut header[5..9], self.key.len() as u32);
        BigEndian::write_u32(&mut header[9..13], self.value.len() as u32);
        buf.extend_from_slice(&header);
        buf.extend_from_slice(&self.key);
        buf.extend_from_slice(&self.value);
    }

    /// Serializes into a fresh buffer.
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(self.encoded_len());
        self.encode_into(&mut buf);
        buf
    }

    pub fn is_tombstone(&self) -> bool {
        self.flag == FLAG_TOMBSTONE
    }

    pub fn key(&self) -> &[u8] {
        &self.key
    }

    pub fn value(&self) -> &[u8] {
        &self.value
    }

    pub fn crc(&self) -> u32 {
        self.crc
    }
}

/// Append-only writer over one numbered segment file.
///
/// Appends are serialized by an internal mutex; the current file size is
/// tracked locally (seeded from the file's length at open) so each append
/// knows its own start offset without asking the OS. Readers open their own
/// handles; this type is write-only.
pub struct SegmentWriter {
    id: u64,
    path: PathBuf,
    file: Mutex<File>,
    size: AtomicU64,
}

impl SegmentWriter {
    /// Opens (or creates) the segment with the given id for appending.
    pub fn open(dir: &Path, id: u64) -> io::Result<Self> {
        let path = segment_path(dir, id);
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        let size = file.metadata()?.len();
        Ok(Self {
            id,
            path,
            file: Mutex::new(file),
            size: AtomicU64::new(size),
        })
    }

    /// Monotonic id of this segment.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Absolute path of the segment file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current tracked file size in bytes.
    pub fn size(&self) -> u64 {
        self.size.load(Ordering::Acquire)
    }

    /// Appends a single record and returns its position.
    pub fn append(&self, record: &Record) -> io::Result<Position> {
        let mut file = self.file.lock();
        let offset = self.size.load(Ordering::Acquire);
        file.write_all(&record.encode())?;
        self.size
            .store(offset + record.encoded_len() as u64, Ordering::Release);
        Ok(Position { segment_id: self.id, offset })
    }

    /// Appends a batch while holding the write lock for its whole duration,
    /// so no other writer can interleave. The returned positions correspond
    /// one-to-one with the input records, each pointing at that record's own
    /// start offset, not the batch start.
    pub fn append_many(&self, records: &[Record]) -> io::Result<Vec<Position>> {
        let mut file = self.file.lock();
        let mut offset = self.size.load(Ordering::Acquire);
        let mut positions = Vec::with_capacity(records.len());
        let mut buf = Vec::new();
        for record in records {
            positions.push(Position { segment_id: self.id, offset });
            buf.clear();
            record.encode_into(&mut buf);
            file.write_all(&buf)?;
            offset += record.encoded_len() as u64;
        }
        self.size.store(offset, Ordering::Release);
        Ok(positions)
    }

    /// Forces data and metadata to stable storage.
    pub fn sync(&self) -> io::Result<()> {
        self.file.lock().sync_all()
    }
}

/// Sequentially scans a segment, invoking `apply` for every CRC-verified
/// record together with its position.
///
/// Any torn tail (short header, short payload, an implausible length, or a
/// CRC mismatch) ends the scan cleanly: records before the tear are
/// delivered, the rest of the file is ignored, and `Ok(())` is returned.
/// Only genuine I/O errors propagate.
pub fn scan<F>(path: &Path, segment_id: u64, mut apply: F) -> io::Result<()>
where
    F: FnMut(Record, Position),
{
    let file = File::open(path)?;
    let mut reader = BufReader::new(file);
    let mut offset = 0u64;
    let mut header = [0u8; HEADER_LEN];

    loop {
        match read_exact_or_eof(&mut reader, &mut header) {
            Ok(true) => {}
            Ok(false) => return Ok(()), // clean EOF or partial header
            Err(e) => return Err(e),
        }

        let stored_crc = BigEndian::read_u32(&header[0..4]);
        let flag = header[4];
        let klen = BigEndian::read_u32(&header[5..9]) as usize;
        let vlen = BigEndian::read_u32(&header[9..13]) as usize;

        if flag > FLAG_TOMBSTONE || klen == 0 || klen > MAX_KEY_BYTES || vlen > MAX_VALUE_BYTES {
            return Ok(()); // implausible header, corrupt tail
        }

        let mut key = vec![0u8; klen];
        if !read_exact_or_eof(&mut reader, &mut key)? {
            return Ok(());
        }
        let mut value = vec![0u8; vlen];
        if !read_exact_or_eof(&mut reader, &mut value)? {
            return Ok(());
        }

        if Record::compute_crc(flag, &key, &value) != stored_crc {
            return Ok(()); // corruption, stop before this record
        }

        let position = Position { segment_id, offset };
        offset += (HEADER_LEN + klen + vlen) as u64;
        let record = if flag == FLAG_TOMBSTONE {
            Record::tombstone(key)
        } else {
            Record::put(key, value)
        };
        apply(record, position);
    }
}

/// Reads the value of the record at `offset` in the segment file at `path`.
///
/// Opens a fresh read-only handle for the duration of the call. Returns
/// `Ok(None)` for a tombstone or a truncated/unreadable record; the caller
/// treats both as a miss. The stored CRC is not re-verified here; recovery is
/// the verification boundary.
pub fn read_value_at(path: &Path, offset: u64) -> io::Result<Option<Vec<u8>>> {
    let file = match File::open(path) {
        Ok(f) => f,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e),
    };

    let mut header = [0u8; HEADER_LEN];
    if file.read_exact_at(&mut header, offset).is_err() {
        return Ok(None); // truncated
    }
    let flag = header[4];
    let klen = BigEndian::read_u32(&header[5..9]) as u64;
    let vlen = BigEndian::read_u32(&header[9..13]) as usize;
    if flag == FLAG_TOMBSTONE {
        return Ok(None);
    }
    if vlen > MAX_VALUE_BYTES {
        return Ok(None);
    }

    let mut value = vec![0u8; vlen];
    match file.read_exact_at(&mut value, offset + HEADER_LEN as u64 + klen) {
        Ok(()) => Ok(Some(value)),
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => Ok(None),
        Err(e) => Err(e),
    }
}

/// Fills `buf` completely, or reports a clean stop.
///
/// Returns `Ok(true)` when the buffer was filled, `Ok(false)` on EOF before
/// or during the read (a torn tail), and `Err` only for real I/O failures.
fn read_exact_or_eof<R: Read>(reader: &mut R, buf: &mut [u8]) -> io::Result<bool> {
    match reader.read_exact(buf) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => Ok(false),
        Err(e) => Err(e),
    }
}
