use crate::{Config, Engine};
use std::fs;
use std::path::Path;

/// Opens an engine with the fsync task disabled (tests that want it pass
/// their own config).
pub fn open_engine(dir: &Path, segment_byte_limit: u64) -> anyhow::Result<Engine> {
    let mut config = Config::new(dir);
    config.segment_byte_limit = segment_byte_limit;
    config.fsync_interval_ms = 0;
    Engine::open(config)
}

pub fn count_seg_files(dir: &Path) -> usize {
    fs::read_dir(dir)
        .unwrap()
        .filter_map(|e| e.ok())
        .filter(|e| {
            e.path()
                .extension()
                .and_then(|s| s.to_str())
                .map(|ext| ext == "seg")
                .unwrap_or(false)
        })
        .count()
}

pub fn total_seg_bytes(dir: &Path) -> u64 {
    fs::read_dir(dir)
        .unwrap()
        .filter_map(|e| e.ok())
        .filter(|e| {
            e.path()
                .extension()
                .and_then(|s| s.to_str())
                .map(|ext| ext == "seg")
                .unwrap_or(false)
        })
        .map(|e| e.metadata().map(|m| m.len()).unwrap_or(0))
        .sum()
}
