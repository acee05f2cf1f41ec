use super::helpers::{count_seg_files, open_engine};
use anyhow::Result;
use std::sync::Arc;
use std::thread;
use tempfile::tempdir;

// --------------------- Basic put / get / delete ---------------------

#[test]
fn put_and_get() -> Result<()> {
    let dir = tempdir()?;
    let engine = open_engine(dir.path(), 1024 * 1024)?;

    engine.put(b"foo".to_vec(), b"bar".to_vec())?;
    assert_eq!(engine.read(b"foo")?.unwrap(), b"bar");
    Ok(())
}

#[test]
fn get_missing_key() -> Result<()> {
    let dir = tempdir()?;
    let engine = open_engine(dir.path(), 1024 * 1024)?;
    assert!(engine.read(b"nope")?.is_none());
    Ok(())
}

#[test]
fn overwrite_returns_latest() -> Result<()> {
    let dir = tempdir()?;
    let engine = open_engine(dir.path(), 1024 * 1024)?;

    engine.put(b"k".to_vec(), b"v1".to_vec())?;
    engine.put(b"k".to_vec(), b"v2".to_vec())?;
    assert_eq!(engine.read(b"k")?.unwrap(), b"v2");
    Ok(())
}

#[test]
fn delete_then_get_misses() -> Result<()> {
    let dir = tempdir()?;
    let engine = open_engine(dir.path(), 1024 * 1024)?;

    engine.put(b"k".to_vec(), b"v".to_vec())?;
    engine.delete(b"k")?;
    assert!(engine.read(b"k")?.is_none());
    Ok(())
}

#[test]
fn delete_of_absent_key_is_ok() -> Result<()> {
    let dir = tempdir()?;
    let engine = open_engine(dir.path(), 1024 * 1024)?;
    engine.delete(b"never-existed")?;
    Ok(())
}

#[test]
fn empty_value_roundtrips() -> Result<()> {
    let dir = tempdir()?;
    let engine = open_engine(dir.path(), 1024 * 1024)?;
    engine.put(b"k".to_vec(), Vec::new())?;
    assert_eq!(engine.read(b"k")?.unwrap(), b"");
    Ok(())
}

// --------------------- Argument validation ---------------------

#[test]
fn empty_key_is_rejected() -> Result<()> {
    let dir = tempdir()?;
    let engine = open_engine(dir.path(), 1024 * 1024)?;
    assert!(engine.put(Vec::new(), b"v".to_vec()).is_err());
    assert!(engine.delete(b"").is_err());
    Ok(())
}

// --------------------- Batch ---------------------

#[test]
fn batch_put_writes_all_items() -> Result<()> {
    let dir = tempdir()?;
    let engine = open_engine(dir.path(), 1024 * 1024)?;

    let written = engine.batch_put(vec![
        (b"a".to_vec(), b"b".to_vec()),
        (b"foo".to_vec(), b"BAR2".to_vec()),
        (b"z".to_vec(), b"last".to_vec()),
    ])?;
    assert_eq!(written, 3);

    // Every item resolves through its own per-record position.
    assert_eq!(engine.read(b"a")?.unwrap(), b"b");
    assert_eq!(engine.read(b"foo")?.unwrap(), b"BAR2");
    assert_eq!(engine.read(b"z")?.unwrap(), b"last");
    Ok(())
}

#[test]
fn batch_put_duplicate_key_last_wins() -> Result<()> {
    let dir = tempdir()?;
    let engine = open_engine(dir.path(), 1024 * 1024)?;

    engine.batch_put(vec![
        (b"k".to_vec(), b"first".to_vec()),
        (b"other".to_vec(), b"x".to_vec()),
        (b"k".to_vec(), b"second".to_vec()),
    ])?;
    assert_eq!(engine.read(b"k")?.unwrap(), b"second");
    Ok(())
}

#[test]
fn empty_batch_returns_zero() -> Result<()> {
    let dir = tempdir()?;
    let engine = open_engine(dir.path(), 1024 * 1024)?;
    assert_eq!(engine.batch_put(Vec::new())?, 0);
    Ok(())
}

// --------------------- Rotation ---------------------

#[test]
fn small_segment_limit_rotates() -> Result<()> {
    let dir = tempdir()?;
    // Limit of 64 bytes: every couple of writes trips a rotation.
    let engine = open_engine(dir.path(), 64)?;

    for i in 0..10u32 {
        engine.put(format!("key{}", i).into_bytes(), vec![b'v'; 32])?;
    }

    assert!(count_seg_files(dir.path()) > 1, "expected multiple segments");

    // All keys remain readable across segment boundaries.
    for i in 0..10u32 {
        assert!(engine.read(format!("key{}", i).as_bytes())?.is_some());
    }
    Ok(())
}

// --------------------- Lifecycle ---------------------

#[test]
fn operations_fail_after_close() -> Result<()> {
    let dir = tempdir()?;
    let engine = open_engine(dir.path(), 1024 * 1024)?;
    engine.put(b"k".to_vec(), b"v".to_vec())?;

    engine.close()?;
    engine.close()?; // idempotent

    assert!(engine.put(b"k2".to_vec(), b"v".to_vec()).is_err());
    assert!(engine.read(b"k").is_err());
    assert!(engine.delete(b"k").is_err());
    assert!(engine.compact().is_err());
    Ok(())
}

// --------------------- Concurrency ---------------------

#[test]
fn concurrent_writers_land_all_keys() -> Result<()> {
    let dir = tempdir()?;
    let engine = Arc::new(open_engine(dir.path(), 1024 * 1024)?);

    let mut handles = Vec::new();
    for t in 0..4u8 {
        let engine = Arc::clone(&engine);
        handles.push(thread::spawn(move || {
            for i in 0..100u32 {
                engine
                    .put(format!("t{}-{:03}", t, i).into_bytes(), vec![t; 16])
                    .unwrap();
            }
        }));
    }
    for h in handles {
        h.join().unwrap();
    }

    for t in 0..4u8 {
        for i in 0..100u32 {
            let key = format!("t{}-{:03}", t, i).into_bytes();
            assert_eq!(engine.read(&key)?.unwrap(), vec![t; 16]);
        }
    }
    Ok(())
}
