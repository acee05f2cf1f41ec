use crate::*;
use byteorder::{BigEndian, ByteOrder};
use std::fs;
use tempfile::tempdir;

fn entry(key: &[u8], value: &[u8]) -> (Vec<u8>, Vec<u8>) {
    (key.to_vec(), value.to_vec())
}

#[test]
fn write_produces_valid_footer() -> Result<(), TableError> {
    let dir = tempdir().unwrap();
    let path = TableWriter::write(
        dir.path(),
        vec![entry(b"a", b"1"), entry(b"b", b"2")],
        DEFAULT_INDEX_EVERY,
    )?;

    assert!(path.exists());
    assert_eq!(path.extension().unwrap(), "sst");

    let data = fs::read(&path).unwrap();
    assert!(data.len() as u64 >= FOOTER_LEN);
    let footer = &data[data.len() - FOOTER_LEN as usize..];
    assert_eq!(BigEndian::read_u32(&footer[0..4]), TABLE_MAGIC);
    let index_start = BigEndian::read_u64(&footer[8..16]);
    assert!(index_start < data.len() as u64);
    Ok(())
}

#[test]
fn writer_sorts_unsorted_input() -> Result<(), TableError> {
    let dir = tempdir().unwrap();
    let path = TableWriter::write(
        dir.path(),
        vec![entry(b"z", b"3"), entry(b"a", b"1"), entry(b"m", b"2")],
        DEFAULT_INDEX_EVERY,
    )?;

    let reader = std::sync::Arc::new(TableReader::open(&path)?);
    let keys: Vec<Vec<u8>> = reader.iter().map(|(k, _)| k).collect();
    assert_eq!(keys, vec![b"a".to_vec(), b"m".to_vec(), b"z".to_vec()]);
    Ok(())
}

#[test]
fn duplicate_keys_are_rejected() {
    let dir = tempdir().unwrap();
    let result = TableWriter::write(
        dir.path(),
        vec![entry(b"k", b"1"), entry(b"k", b"2")],
        DEFAULT_INDEX_EVERY,
    );
    assert!(matches!(result, Err(TableError::DuplicateKey)));
}

#[test]
fn no_temp_file_remains_after_write() -> Result<(), TableError> {
    let dir = tempdir().unwrap();
    TableWriter::write(dir.path(), vec![entry(b"k", b"v")], DEFAULT_INDEX_EVERY)?;

    let leftovers: Vec<_> = fs::read_dir(dir.path())
        .unwrap()
        .filter_map(|e| e.ok())
        .filter(|e| e.path().to_string_lossy().ends_with(".tmp"))
        .collect();
    assert!(leftovers.is_empty());
    Ok(())
}

#[test]
fn back_to_back_writes_get_distinct_names() -> Result<(), TableError> {
    let dir = tempdir().unwrap();
    let first = TableWriter::write(dir.path(), vec![entry(b"a", b"1")], 64)?;
    let second = TableWriter::write(dir.path(), vec![entry(b"b", b"2")], 64)?;
    assert_ne!(first, second);
    assert!(first.exists() && second.exists());
    Ok(())
}

#[test]
fn tombstones_are_written_as_zero_length_values() -> Result<(), TableError> {
    let dir = tempdir().unwrap();
    let path = TableWriter::write(
        dir.path(),
        vec![entry(b"dead", b""), entry(b"live", b"v")],
        DEFAULT_INDEX_EVERY,
    )?;

    let reader = TableReader::open(&path)?;
    // The tombstone is present and readable; interpretation is up to the
    // engine.
    assert_eq!(reader.get(b"dead")?, Some(Vec::new()));
    assert_eq!(reader.get(b"live")?, Some(b"v".to_vec()));
    Ok(())
}

#[test]
fn empty_table_is_writable_and_openable() -> Result<(), TableError> {
    let dir = tempdir().unwrap();
    let path = TableWriter::write(dir.path(), Vec::new(), DEFAULT_INDEX_EVERY)?;
    let reader = TableReader::open(&path)?;
    assert_eq!(reader.get(b"anything")?, None);
    Ok(())
}
