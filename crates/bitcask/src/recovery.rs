//! Cold-start recovery: discover segment files and rebuild the in-memory
//! index by scanning them in id order.

use anyhow::Result;
use crossbeam_skiplist::SkipMap;
use segment::{parse_segment_id, Position};
use std::path::Path;
use tracing::{debug, warn};

/// Scans every `*.seg` file in `dir` in ascending id order, installing puts
/// and applying tombstones. Returns the highest segment id seen, or `None`
/// for a fresh directory.
///
/// Each segment's scan halts at the first torn or corrupt record, dropping
/// the remainder of that segment from the recovered view. Lossy, but never
/// poisoned by a bad record.
pub(crate) fn rebuild_index(
    dir: &Path,
    index: &SkipMap<Vec<u8>, Position>,
) -> Result<Option<u64>> {
    let mut segments: Vec<(u64, std::path::PathBuf)> = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        match parse_segment_id(name) {
            Some(id) => segments.push((id, path)),
            None => {
                if name.ends_with(".seg") {
                    warn!("ignoring unparseable segment file name {}", name);
                }
            }
        }
    }
    segments.sort_by_key(|(id, _)| *id);

    let mut max_id = None;
    for (id, path) in &segments {
        segment::scan(path, *id, |record, position| {
            if record.is_tombstone() {
                index.remove(record.key());
            } else {
                index.insert(record.key().to_vec(), position);
            }
        })?;
        max_id = Some(*id);
    }

    debug!(
        "recovered {} segments, {} live keys",
        segments.len(),
        index.len()
    );
    Ok(max_id)
}
