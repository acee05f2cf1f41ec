use super::helpers::{count_sst_files, open_engine};
use anyhow::Result;
use tempfile::tempdir;

#[test]
fn compaction_merges_oldest_tables_newest_wins() -> Result<()> {
    let dir = tempdir()?;
    let engine = open_engine(dir.path())?;

    // Three tables, each rewriting the same key.
    for v in [b"v1".as_ref(), b"v2", b"v3"] {
        engine.put(b"k".to_vec(), v.to_vec())?;
        engine.flush()?;
    }
    assert_eq!(engine.table_count(), 3);

    let reclaimed = engine.compact()?;

    assert_eq!(engine.table_count(), 1);
    assert_eq!(count_sst_files(dir.path()), 1);
    assert!(reclaimed > 0);
    assert_eq!(engine.read(b"k")?.unwrap(), b"v3");
    Ok(())
}

#[test]
fn compaction_with_fewer_than_two_tables_is_a_noop() -> Result<()> {
    let dir = tempdir()?;
    let engine = open_engine(dir.path())?;

    assert_eq!(engine.compact()?, 0);

    engine.put(b"k".to_vec(), b"v".to_vec())?;
    engine.flush()?;
    assert_eq!(engine.compact()?, 0);
    assert_eq!(engine.table_count(), 1);
    Ok(())
}

#[test]
fn compaction_preserves_tombstones() -> Result<()> {
    let dir = tempdir()?;
    let engine = open_engine(dir.path())?;

    engine.put(b"dead".to_vec(), b"v".to_vec())?;
    engine.put(b"live".to_vec(), b"v".to_vec())?;
    engine.flush()?;
    engine.delete(b"dead")?;
    engine.flush()?;

    engine.compact()?;
    assert_eq!(engine.table_count(), 1);

    assert!(engine.read(b"dead")?.is_none());
    assert_eq!(engine.read(b"live")?.unwrap(), b"v");
    Ok(())
}

#[test]
fn compaction_leaves_newer_tables_untouched() -> Result<()> {
    let dir = tempdir()?;
    let engine = open_engine(dir.path())?;

    // Four tables; compaction picks the oldest three and must not let their
    // merged (stale) contents shadow the newest table.
    for v in [b"v1".as_ref(), b"v2", b"v3", b"v4"] {
        engine.put(b"k".to_vec(), v.to_vec())?;
        engine.flush()?;
    }
    assert_eq!(engine.table_count(), 4);

    engine.compact()?;

    assert_eq!(engine.table_count(), 2);
    assert_eq!(engine.read(b"k")?.unwrap(), b"v4");
    Ok(())
}

#[test]
fn read_mapping_is_unchanged_by_compaction() -> Result<()> {
    let dir = tempdir()?;
    let engine = open_engine(dir.path())?;

    for i in 0..30u32 {
        engine.put(format!("k{:02}", i % 10).into_bytes(), format!("v{}", i).into_bytes())?;
        if i % 7 == 0 {
            engine.delete(format!("k{:02}", (i + 3) % 10).as_bytes())?;
        }
        if i % 10 == 9 {
            engine.flush()?;
        }
    }
    engine.flush()?;

    let before = engine.read_range(b"", b"zzz", 1000);
    // Empty start bound is invalid for writes but fine as a scan bound.
    let before = before?;

    engine.compact()?;
    let after = engine.read_range(b"", b"zzz", 1000)?;
    assert_eq!(before, after);
    Ok(())
}

#[test]
fn merge_priority_scenario() -> Result<()> {
    // The memtable beats tables, and compaction keeps it that way.
    let dir = tempdir()?;
    let engine = open_engine(dir.path())?;

    engine.put(b"k".to_vec(), b"old".to_vec())?;
    engine.flush()?;
    engine.put(b"k".to_vec(), b"new".to_vec())?;
    assert_eq!(engine.read(b"k")?.unwrap(), b"new");

    engine.flush()?;
    engine.compact()?;
    assert_eq!(engine.read(b"k")?.unwrap(), b"new");
    Ok(())
}

#[test]
fn recovery_after_compaction() -> Result<()> {
    let dir = tempdir()?;
    {
        let engine = open_engine(dir.path())?;
        for v in [b"v1".as_ref(), b"v2", b"v3"] {
            engine.put(b"k".to_vec(), v.to_vec())?;
            engine.flush()?;
        }
        engine.compact()?;
    }

    let engine = open_engine(dir.path())?;
    assert_eq!(engine.table_count(), 1);
    assert_eq!(engine.read(b"k")?.unwrap(), b"v3");
    Ok(())
}
