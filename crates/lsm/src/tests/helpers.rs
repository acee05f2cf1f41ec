use crate::{Config, Engine};
use std::fs;
use std::path::Path;

/// Opens an engine with a large memtable so nothing flushes by surprise.
pub fn open_engine(dir: &Path) -> anyhow::Result<Engine> {
    Engine::open(Config::new(dir))
}

/// Opens an engine with the given memtable threshold and a tiny index
/// stride, so tests exercise sparse-index seeks with few entries.
pub fn open_small(dir: &Path, memtable_byte_limit: usize) -> anyhow::Result<Engine> {
    let mut config = Config::new(dir);
    config.memtable_byte_limit = memtable_byte_limit;
    config.sparse_index_stride = 4;
    Engine::open(config)
}

pub fn count_sst_files(dir: &Path) -> usize {
    fs::read_dir(dir)
        .unwrap()
        .filter_map(|e| e.ok())
        .filter(|e| {
            e.path()
                .extension()
                .and_then(|s| s.to_str())
                .map(|ext| ext == "sst")
                .unwrap_or(false)
        })
        .count()
}

pub fn count_archived_wals(dir: &Path) -> usize {
    fs::read_dir(dir)
        .unwrap()
        .filter_map(|e| e.ok())
        .filter(|e| {
            e.file_name()
                .to_str()
                .map(|n| n.starts_with("wal-") && n.ends_with(".log"))
                .unwrap_or(false)
        })
        .count()
}
