// VarMap integration suite.
//
// Each test documents what behavior is being verified and which
// invariants are assumed or asserted. The core invariants exercised:
// - Round-trip: get(key) after insert(key, value) returns bytes
//   identical to value.
// - In-place replace: re-inserting a key changes neither the entry
//   count nor any other entry's association, for growing and shrinking
//   values alike.
// - Removal: remove slides trailing records left; an absent key is a
//   no-op returning false.
// - Iteration: N live entries yield exactly N views with pairwise
//   distinct keys, in bucket-index then in-bucket order.
use packmap::{cmp_ignore_trailing_nul, hash_djb2, VarMap};

// Test: bulk round-trip across many buckets.
// Assumes: the default djb2 hash spreads keys over all buckets.
// Verifies: every inserted pair is retrievable byte-for-byte.
#[test]
fn bulk_insert_get_round_trip() {
    let mut map = VarMap::new(16);
    let pairs: Vec<(Vec<u8>, Vec<u8>)> = (0..200)
        .map(|i| {
            (
                format!("key-{i}").into_bytes(),
                format!("value-{}", i * 7).into_bytes(),
            )
        })
        .collect();
    for (k, v) in &pairs {
        map.insert(k, v);
    }
    assert_eq!(map.len(), 200);
    for (k, v) in &pairs {
        assert_eq!(map.get_value(k), Some(v.as_slice()), "key {k:?}");
    }
}

// Test: replace storm in one bucket.
// Assumes: bucket_count=1 packs every record into one buffer.
// Verifies: repeated grow/shrink replacements of a middle entry never
// disturb its neighbors.
#[test]
fn replace_storm_keeps_neighbors_intact() {
    let mut map = VarMap::new(1);
    map.insert(b"head", b"H");
    map.insert(b"mid", b"");
    map.insert(b"tail", b"T");

    for round in 0..32 {
        let value = vec![b'x'; round * 3 % 17];
        map.insert(b"mid", &value);
        assert_eq!(map.len(), 3);
        assert_eq!(map.get_value(b"head"), Some(&b"H"[..]));
        assert_eq!(map.get_value(b"mid"), Some(value.as_slice()));
        assert_eq!(map.get_value(b"tail"), Some(&b"T"[..]));
    }
}

// Test: removal order independence.
// Assumes: remove computes each record's span from current offsets.
// Verifies: removing front, back and middle records leaves the
// remaining associations intact and len consistent.
#[test]
fn removal_in_any_order() {
    let mut map = VarMap::new(1);
    for i in 0..6 {
        map.insert(format!("k{i}").as_bytes(), format!("v{i}").as_bytes());
    }
    assert!(map.remove(b"k0")); // front
    assert!(map.remove(b"k5")); // back
    assert!(map.remove(b"k2")); // middle
    assert_eq!(map.len(), 3);
    for live in ["k1", "k3", "k4"] {
        let value = live.replace('k', "v");
        assert_eq!(
            map.get_value(live.as_bytes()),
            Some(value.as_bytes()),
            "{live}"
        );
    }
    for gone in ["k0", "k2", "k5"] {
        assert!(map.get(gone.as_bytes()).is_none());
        assert!(!map.remove(gone.as_bytes()));
    }
}

// Test: iteration cardinality and distinctness.
// Assumes: replaces never duplicate a key within a bucket.
// Verifies: after inserts and replaces, iteration yields exactly the
// live key set.
#[test]
fn iteration_yields_each_key_once() {
    let mut map = VarMap::new(4);
    for i in 0..40 {
        map.insert(format!("k{}", i % 10).as_bytes(), &[i]);
    }
    assert_eq!(map.len(), 10);
    let mut keys: Vec<Vec<u8>> = map.iter().map(|e| e.key.to_vec()).collect();
    assert_eq!(keys.len(), 10);
    keys.sort();
    keys.dedup();
    assert_eq!(keys.len(), 10, "duplicate key in iteration");
}

// Test: entry views read both halves of the packed record.
// Assumes: key and value are adjacent in storage.
// Verifies: the view's key and value match the inserted spans exactly,
// including empty values.
#[test]
fn entry_views_expose_key_and_value() {
    let mut map = VarMap::new(8);
    map.insert(b"present", b"");
    let entry = map.get(b"present").expect("present");
    assert_eq!(entry.key, b"present");
    assert_eq!(entry.value, b"");
}

// Test: custom hash and comparator compose through the public API.
// Assumes: the comparator is the sole equality rule and the hash must
// agree with it on bucket placement.
// Verifies: NUL-terminated and length-only spellings of one key hit the
// same record when both extension points strip the terminator.
#[test]
fn custom_hash_and_comparator_unify_spellings() {
    fn hash_stripped(key: &[u8]) -> u64 {
        match key {
            [head @ .., 0] => hash_djb2(head),
            _ => hash_djb2(key),
        }
    }
    let mut map = VarMap::new(8)
        .with_hasher(hash_stripped)
        .with_comparator(cmp_ignore_trailing_nul);
    map.insert(b"flag\0", b"1");
    assert_eq!(map.get_value(b"flag"), Some(&b"1"[..]));
    map.insert(b"flag", b"2");
    assert_eq!(map.len(), 1);
    assert_eq!(map.get_value(b"flag\0"), Some(&b"2"[..]));
    assert!(map.remove(b"flag\0"));
    assert!(map.get(b"flag").is_none());
}

// Test: zeroed reservation then fill.
// Assumes: insert_zeroed reserves value_len zero bytes under the key.
// Verifies: a later insert of the same key with real bytes lands in the
// reserved slot without changing the entry count.
#[test]
fn reserve_then_fill() {
    let mut map = VarMap::new(2);
    map.insert_zeroed(b"slot", 8);
    assert_eq!(map.get_value(b"slot"), Some(&[0u8; 8][..]));
    map.insert(b"slot", &[7u8; 8]);
    assert_eq!(map.get_value(b"slot"), Some(&[7u8; 8][..]));
    assert_eq!(map.len(), 1);
}
