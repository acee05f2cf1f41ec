//! The manifest: the authoritative, ordered list of live sorted tables.
//!
//! ## File format
//!
//! `MANIFEST.txt` is UTF-8 text, one table filename per line, **newest
//! first**. A text format keeps it inspectable with any editor; the file is
//! one line per table, so parsing cost is irrelevant.
//!
//! ## Crash safety
//!
//! The file is rewritten atomically: write to `MANIFEST.txt.tmp`, fsync,
//! rename over the manifest, fsync the directory. In the window between
//! writing a merged table and persisting the manifest that references it,
//! both old and new tables exist on disk. That is safe because nothing reads a
//! table the manifest does not list.

use anyhow::{Context, Result};
use sstable::TableReader;
use std::collections::VecDeque;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

/// Name of the manifest file within the data directory.
pub const MANIFEST_FILE: &str = "MANIFEST.txt";

/// In-memory manifest: live table paths plus an open reader per table.
///
/// Every mutation rebuilds the reader list before returning. Readers are
/// shared as `Arc`s, so a reader replaced mid-read closes only when the last
/// in-flight read drops its handle.
pub(crate) struct Manifest {
    dir: PathBuf,
    file: PathBuf,
    newest_first: VecDeque<PathBuf>,
    readers: Vec<Arc<TableReader>>,
}

impl Manifest {
    /// Loads `dir/MANIFEST.txt`, or bootstraps one.
    ///
    /// Bootstrapping adopts any `*.sst` files already present (discovery
    /// order; a pre-manifest directory has no better ordering to offer) and
    /// persists the result immediately.
    pub fn load_or_create(dir: &Path) -> Result<Self> {
        let mut manifest = Self {
            dir: dir.to_path_buf(),
            file: dir.join(MANIFEST_FILE),
            newest_first: VecDeque::new(),
            readers: Vec::new(),
        };

        if manifest.file.exists() {
            let text = fs::read_to_string(&manifest.file)
                .with_context(|| format!("failed to read {}", manifest.file.display()))?;
            for line in text.lines() {
                let name = line.trim();
                if !name.is_empty() {
                    manifest.newest_first.push_back(dir.join(name));
                }
            }
        } else {
            for entry in fs::read_dir(dir)? {
                let path = entry?.path();
                if path.extension().map(|e| e == "sst").unwrap_or(false) {
                    manifest.newest_first.push_back(path);
                }
            }
            manifest.store_atomic()?;
        }

        manifest.reopen_readers()?;
        Ok(manifest)
    }

    /// Installs a freshly flushed table as the newest.
    pub fn add_head(&mut self, table: PathBuf) -> Result<()> {
        self.newest_first.push_front(table);
        self.reopen_readers()
    }

    /// Removes a set of tables and installs their merged replacement at the
    /// tail (compaction merges the oldest tier, so its output must keep the
    /// oldest priority; putting it at the head would let stale values
    /// shadow newer tables that were not part of the merge).
    pub fn replace(&mut self, old: &[PathBuf], merged: PathBuf) -> Result<()> {
        self.newest_first.retain(|p| !old.contains(p));
        self.newest_first.push_back(merged);
        self.reopen_readers()
    }

    /// Current readers in the order point reads must consult them.
    pub fn readers_newest_first(&self) -> Vec<Arc<TableReader>> {
        self.readers.clone()
    }

    /// The `n` oldest table paths, oldest first (compaction input).
    pub fn oldest_n(&self, n: usize) -> Vec<PathBuf> {
        self.newest_first.iter().rev().take(n).cloned().collect()
    }

    /// Whether `path` is a live table.
    pub fn contains(&self, path: &Path) -> bool {
        self.newest_first.iter().any(|p| p == path)
    }

    pub fn table_count(&self) -> usize {
        self.newest_first.len()
    }

    /// Persists the current list: temp file, fsync, atomic rename, directory
    /// fsync. After a successful return, the on-disk list matches memory.
    pub fn store_atomic(&self) -> Result<()> {
        let tmp = self.file.with_extension("txt.tmp");
        {
            let mut f = OpenOptions::new()
                .create(true)
                .write(true)
                .truncate(true)
                .open(&tmp)
                .with_context(|| format!("failed to create {}", tmp.display()))?;
            for path in &self.newest_first {
                let name = path
                    .file_name()
                    .and_then(|n| n.to_str())
                    .context("table path has no file name")?;
                writeln!(f, "{}", name)?;
            }
            f.flush()?;
            f.sync_all()?;
        }
        fs::rename(&tmp, &self.file)?;
        File::open(&self.dir)?.sync_all()?;
        debug!("stored manifest with {} tables", self.newest_first.len());
        Ok(())
    }

    /// Rebuilds the reader list from the current paths, dropping readers for
    /// replaced tables. A corrupt footer surfaces here and refuses the
    /// table.
    fn reopen_readers(&mut self) -> Result<()> {
        let mut readers = Vec::with_capacity(self.newest_first.len());
        for path in &self.newest_first {
            let reader = TableReader::open(path)
                .with_context(|| format!("failed to open table {}", path.display()))?;
            readers.push(Arc::new(reader));
        }
        self.readers = readers;
        Ok(())
    }
}
