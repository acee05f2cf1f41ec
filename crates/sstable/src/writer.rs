use byteorder::{BigEndian, ByteOrder};
use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::debug;

use crate::format::{write_footer, Footer};
use crate::TableError;

/// Default sparse-index stride: one index entry per 64 data entries.
pub const DEFAULT_INDEX_EVERY: usize = 64;

pub struct TableWriter {}

impl TableWriter {
    /// Writes a new sorted table into `dir` and returns its final path.
    ///
    /// `entries` may arrive unsorted (the writer sorts them) but duplicate
    /// keys are forbidden. A zero-length value is a tombstone and is written
    /// out like any other entry; dropping it here would resurrect older
    /// versions of the key living in older tables.
    ///
    /// One sparse-index entry is emitted for every `index_every`-th data
    /// entry, starting with entry 0.
    ///
    /// The table is staged in a temporary file, fsynced, atomically renamed
    /// into place, and the directory is fsynced so the rename itself is
    /// durable. The file name is `%020d.sst` where the number is a
    /// millisecond timestamp bumped until unused: a uniqueness token, not an
    /// ordering key (ordering comes from the manifest).
    pub fn write(
        dir: &Path,
        mut entries: Vec<(Vec<u8>, Vec<u8>)>,
        index_every: usize,
    ) -> Result<PathBuf, TableError> {
        let index_every = index_every.max(1);

        entries.sort_unstable_by(|a, b| a.0.cmp(&b.0));
        if entries.windows(2).any(|w| w[0].0 == w[1].0) {
            return Err(TableError::DuplicateKey);
        }

        // Pick an unused timestamp name before creating anything on disk.
        let mut stamp = unix_millis();
        let (final_path, tmp_path) = loop {
            let final_path = dir.join(format!("{:020}.sst", stamp));
            let tmp_path = dir.join(format!("{:020}.sst.tmp", stamp));
            if !final_path.exists() && !tmp_path.exists() {
                break (final_path, tmp_path);
            }
            stamp += 1;
        };

        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&tmp_path)?;
        let mut w = BufWriter::new(file);

        // DATA section, collecting sparse index entries as we go.
        let mut index: Vec<(&[u8], u64)> = Vec::new();
        let mut offset = 0u64;
        let mut header = [0u8; 8];
        for (i, (key, value)) in entries.iter().enumerate() {
            if i % index_every == 0 {
                index.push((key.as_slice(), offset));
            }
            BigEndian::write_u32(&mut header[0..4], key.len() as u32);
            BigEndian::write_u32(&mut header[4..8], value.len() as u32);
            w.write_all(&header)?;
            w.write_all(key)?;
            w.write_all(value)?;
            offset += (header.len() + key.len() + value.len()) as u64;
        }

        // SPARSE INDEX section.
        let index_start = offset;
        for &(key, data_offset) in &index {
            let mut klen = [0u8; 4];
            BigEndian::write_u32(&mut klen, key.len() as u32);
            w.write_all(&klen)?;
            w.write_all(key)?;
            let mut off = [0u8; 8];
            BigEndian::write_u64(&mut off, data_offset);
            w.write_all(&off)?;
        }

        write_footer(
            &mut w,
            &Footer {
                index_count: index.len() as u32,
                index_start,
            },
        )?;

        w.flush()?;
        w.get_ref().sync_all()?;
        drop(w);

        fs::rename(&tmp_path, &final_path)?;
        fsync_dir(dir)?;

        debug!(
            "wrote table {} ({} entries, {} index entries)",
            final_path.display(),
            entries.len(),
            index.len()
        );
        Ok(final_path)
    }
}

fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

fn fsync_dir(dir: &Path) -> std::io::Result<()> {
    File::open(dir)?.sync_all()
}
