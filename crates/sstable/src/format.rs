use byteorder::{BigEndian, ByteOrder};
use std::fs::File;
use std::io::{self, Write};
use std::os::unix::fs::FileExt;

use crate::TableError;

/// Footer magic, "SST1".
pub const TABLE_MAGIC: u32 = 0x5353_5431;

/// Footer size: magic(4) + index_count(4) + index_start(8) + reserved(4).
pub const FOOTER_LEN: u64 = 4 + 4 + 8 + 4;

/// Per-entry data header: key_len(4) + val_len(4).
pub(crate) const ENTRY_HEADER_LEN: usize = 4 + 4;

/// Parsed table footer.
#[derive(Debug, Clone, Copy)]
pub struct Footer {
    pub index_count: u32,
    pub index_start: u64,
}

/// Writes the footer: magic, index count, index start, reserved zero word.
pub(crate) fn write_footer<W: Write>(w: &mut W, footer: &Footer) -> io::Result<()> {
    let mut buf = [0u8; FOOTER_LEN as usize];
    BigEndian::write_u32(&mut buf[0..4], TABLE_MAGIC);
    BigEndian::write_u32(&mut buf[4..8], footer.index_count);
    BigEndian::write_u64(&mut buf[8..16], footer.index_start);
    BigEndian::write_u32(&mut buf[16..20], 0);
    w.write_all(&buf)
}

/// Reads and validates the footer from the last [`FOOTER_LEN`] bytes.
pub(crate) fn read_footer(file: &File, file_len: u64) -> Result<Footer, TableError> {
    if file_len < FOOTER_LEN {
        return Err(TableError::TooSmall { len: file_len });
    }
    let mut buf = [0u8; FOOTER_LEN as usize];
    file.read_exact_at(&mut buf, file_len - FOOTER_LEN)?;

    let magic = BigEndian::read_u32(&buf[0..4]);
    if magic != TABLE_MAGIC {
        return Err(TableError::CorruptFooter { found: magic });
    }
    let index_count = BigEndian::read_u32(&buf[4..8]);
    let index_start = BigEndian::read_u64(&buf[8..16]);
    if index_start > file_len - FOOTER_LEN {
        return Err(TableError::IndexOutOfBounds { index_start });
    }
    Ok(Footer { index_count, index_start })
}
