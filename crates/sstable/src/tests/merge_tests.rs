use crate::*;

fn source(entries: &[(&[u8], &[u8])]) -> Box<dyn Iterator<Item = (Vec<u8>, Vec<u8>)>> {
    let owned: Vec<(Vec<u8>, Vec<u8>)> = entries
        .iter()
        .map(|(k, v)| (k.to_vec(), v.to_vec()))
        .collect();
    Box::new(owned.into_iter())
}

fn collect(iter: MergeIter) -> Vec<(Vec<u8>, Vec<u8>)> {
    iter.collect()
}

// -------------------- Basic merge --------------------

#[test]
fn merge_single_source() {
    let merged = collect(MergeIter::new(vec![source(&[
        (b"a", b"1"),
        (b"b", b"2"),
        (b"c", b"3"),
    ])]));
    assert_eq!(merged.len(), 3);
    assert_eq!(merged[0], (b"a".to_vec(), b"1".to_vec()));
    assert_eq!(merged[2], (b"c".to_vec(), b"3".to_vec()));
}

#[test]
fn merge_non_overlapping_interleaves() {
    let merged = collect(MergeIter::new(vec![
        source(&[(b"a", b"1"), (b"c", b"3")]),
        source(&[(b"b", b"2"), (b"d", b"4")]),
    ]));
    let keys: Vec<Vec<u8>> = merged.into_iter().map(|(k, _)| k).collect();
    assert_eq!(keys, vec![b"a".to_vec(), b"b".to_vec(), b"c".to_vec(), b"d".to_vec()]);
}

#[test]
fn merge_of_empty_sources_is_empty() {
    assert_eq!(collect(MergeIter::new(vec![source(&[]), source(&[])])).len(), 0);
    assert_eq!(collect(MergeIter::new(Vec::new())).len(), 0);
}

// -------------------- Duplicate resolution --------------------

#[test]
fn earliest_source_wins_on_ties() {
    let merged = collect(MergeIter::new(vec![
        source(&[(b"k", b"newest")]),
        source(&[(b"k", b"older")]),
        source(&[(b"k", b"oldest")]),
    ]));
    assert_eq!(merged, vec![(b"k".to_vec(), b"newest".to_vec())]);
}

#[test]
fn duplicates_are_consumed_not_reordered() {
    // After resolving a duplicate the losing source must keep advancing in
    // order, not re-emit the shadowed key later.
    let merged = collect(MergeIter::new(vec![
        source(&[(b"b", b"new-b")]),
        source(&[(b"a", b"1"), (b"b", b"old-b"), (b"c", b"3")]),
    ]));
    assert_eq!(
        merged,
        vec![
            (b"a".to_vec(), b"1".to_vec()),
            (b"b".to_vec(), b"new-b".to_vec()),
            (b"c".to_vec(), b"3".to_vec()),
        ]
    );
}

#[test]
fn tombstones_flow_through_and_shadow() {
    // A newer zero-length entry (tombstone) must win the tie so the caller
    // can observe the deletion instead of the older live value.
    let merged = collect(MergeIter::new(vec![
        source(&[(b"k", b"")]),
        source(&[(b"k", b"old-value")]),
    ]));
    assert_eq!(merged, vec![(b"k".to_vec(), Vec::new())]);
}

#[test]
fn three_way_merge_with_partial_overlap() {
    let merged = collect(MergeIter::new(vec![
        source(&[(b"b", b"m-b"), (b"d", b"m-d")]),
        source(&[(b"a", b"t1-a"), (b"b", b"t1-b")]),
        source(&[(b"b", b"t2-b"), (b"c", b"t2-c"), (b"e", b"t2-e")]),
    ]));
    assert_eq!(
        merged,
        vec![
            (b"a".to_vec(), b"t1-a".to_vec()),
            (b"b".to_vec(), b"m-b".to_vec()),
            (b"c".to_vec(), b"t2-c".to_vec()),
            (b"d".to_vec(), b"m-d".to_vec()),
            (b"e".to_vec(), b"t2-e".to_vec()),
        ]
    );
}
