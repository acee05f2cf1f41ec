use super::*;
use std::fs;
use tempfile::tempdir;

// -------------------- Helpers --------------------

fn make_put(key: &[u8], value: &[u8]) -> WalRecord {
    WalRecord::Put {
        key: key.to_vec(),
        value: value.to_vec(),
    }
}

fn make_delete(key: &[u8]) -> WalRecord {
    WalRecord::Delete { key: key.to_vec() }
}

fn replay_all(wal: &Wal) -> Vec<WalRecord> {
    let mut recs = Vec::new();
    wal.replay(|r| recs.push(r)).unwrap();
    recs
}

// -------------------- Basic write & replay --------------------

#[test]
fn write_and_replay_put_and_delete() {
    let dir = tempdir().unwrap();
    let mut wal = Wal::open(dir.path()).unwrap();

    wal.append(&make_put(b"k", b"v1")).unwrap();
    wal.append(&make_put(b"k2", b"v2")).unwrap();
    wal.append(&make_delete(b"k")).unwrap();

    assert_eq!(
        replay_all(&wal),
        vec![
            make_put(b"k", b"v1"),
            make_put(b"k2", b"v2"),
            make_delete(b"k"),
        ]
    );
}

#[test]
fn empty_value_put_survives_replay_as_put() {
    let dir = tempdir().unwrap();
    let mut wal = Wal::open(dir.path()).unwrap();
    wal.append(&make_put(b"k", b"")).unwrap();

    assert_eq!(replay_all(&wal), vec![make_put(b"k", b"")]);
}

#[test]
fn replay_of_missing_file_is_empty() {
    let dir = tempdir().unwrap();
    let wal = Wal::open(dir.path()).unwrap();
    fs::remove_file(wal.path()).unwrap();
    assert!(replay_all(&wal).is_empty());
}

// -------------------- Torn tails --------------------

#[test]
fn truncated_final_record_is_invisible() {
    let dir = tempdir().unwrap();
    let mut wal = Wal::open(dir.path()).unwrap();
    wal.append(&make_put(b"a", b"1")).unwrap();
    wal.append(&make_put(b"b", b"2")).unwrap();
    wal.sync().unwrap();

    // Chop the final byte: replay must behave as if the last record had
    // never been appended.
    let data = fs::read(wal.path()).unwrap();
    fs::write(wal.path(), &data[..data.len() - 1]).unwrap();

    assert_eq!(replay_all(&wal), vec![make_put(b"a", b"1")]);
}

#[test]
fn corrupt_crc_stops_replay_cleanly() {
    let dir = tempdir().unwrap();
    let mut wal = Wal::open(dir.path()).unwrap();
    wal.append(&make_put(b"good", b"1")).unwrap();
    wal.append(&make_put(b"bad", b"2")).unwrap();
    wal.sync().unwrap();

    // Flip a payload byte in the second record.
    let mut data = fs::read(wal.path()).unwrap();
    let n = data.len();
    data[n - 1] ^= 0xff;
    fs::write(wal.path(), &data).unwrap();

    // No error: the torn tail is consumed, earlier records survive.
    assert_eq!(replay_all(&wal), vec![make_put(b"good", b"1")]);
}

#[test]
fn bad_magic_stops_replay_cleanly() {
    let dir = tempdir().unwrap();
    let mut wal = Wal::open(dir.path()).unwrap();
    wal.append(&make_put(b"k", b"v")).unwrap();
    wal.sync().unwrap();

    // Append garbage that does not start with the frame magic.
    let mut data = fs::read(wal.path()).unwrap();
    data.extend_from_slice(b"this is not a frame");
    fs::write(wal.path(), &data).unwrap();

    assert_eq!(replay_all(&wal), vec![make_put(b"k", b"v")]);
}

// -------------------- Rotation --------------------

#[test]
fn rotate_archives_and_starts_fresh() {
    let dir = tempdir().unwrap();
    let mut wal = Wal::open(dir.path()).unwrap();
    wal.append(&make_put(b"old", b"1")).unwrap();

    let archived = wal.rotate().unwrap();
    assert!(archived.exists());
    let name = archived.file_name().unwrap().to_str().unwrap();
    assert!(name.starts_with("wal-") && name.ends_with(".log"));

    // The active file is fresh and empty.
    assert_eq!(fs::metadata(wal.path()).unwrap().len(), 0);
    assert!(replay_all(&wal).is_empty());

    // New appends land in the new active file only.
    wal.append(&make_put(b"new", b"2")).unwrap();
    assert_eq!(replay_all(&wal), vec![make_put(b"new", b"2")]);
}

#[test]
fn back_to_back_rotations_produce_distinct_archives() {
    let dir = tempdir().unwrap();
    let mut wal = Wal::open(dir.path()).unwrap();

    wal.append(&make_put(b"a", b"1")).unwrap();
    let first = wal.rotate().unwrap();
    wal.append(&make_put(b"b", b"2")).unwrap();
    let second = wal.rotate().unwrap();

    assert_ne!(first, second);
    assert!(first.exists() && second.exists());
}

// -------------------- Sync modes --------------------

#[test]
fn sync_every_append_mode_still_replays() {
    let dir = tempdir().unwrap();
    let mut wal = Wal::open_with_sync(dir.path(), true).unwrap();
    wal.append(&make_put(b"k", b"v")).unwrap();
    assert_eq!(replay_all(&wal), vec![make_put(b"k", b"v")]);
}
