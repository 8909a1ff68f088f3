//! VarMap: a fixed-bucket-count hash map over byte-string keys and
//! values of arbitrary length.
//!
//! Each bucket is one [`GrowBuffer<u8>`] holding packed records laid out
//! back-to-back:
//!
//! ```text
//! [key_len: 8 bytes][val_len: 8 bytes][key bytes][value bytes]
//! ```
//!
//! There is no ordering guarantee between distinct keys and no padding
//! between records. Within one bucket at most one record carries a given
//! key under the active comparator. Accessors recompute byte offsets
//! from the bucket's current base on every call; nothing caches a raw
//! address across a mutation, and the [`Entry`] view borrows the map so
//! it cannot outlive one either.
//!
//! The bucket count is fixed for the map's lifetime; there is no
//! rehashing. Lookup, insert and remove cost is proportional to the
//! occupancy of the target bucket, not the total map size.

use crate::grow_buffer::GrowBuffer;
use core::cmp::Ordering;

/// Hash over raw key bytes. The result is reduced modulo the bucket
/// count by the map.
pub type HashFn = fn(&[u8]) -> u64;

/// Key comparator: `Equal` means the queried key matches the stored key.
/// The query is always the first argument.
pub type CompareFn = fn(&[u8], &[u8]) -> Ordering;

/// Teardown hook invoked on a raw key or value span when the map is
/// cleared or dropped.
pub type DropFn = fn(&[u8]);

const LEN_FIELD: usize = 8;
const HEADER: usize = 2 * LEN_FIELD;

/// djb2 over raw key bytes; the default hash.
pub fn hash_djb2(key: &[u8]) -> u64 {
    let mut hash: u64 = 5381;
    for &b in key {
        hash = (hash << 5).wrapping_add(hash).wrapping_add(b as u64);
    }
    hash
}

/// Byte-wise compare of the shared prefix, shorter key wins the
/// tie-break; the default comparator.
pub fn cmp_bytes(query: &[u8], stored: &[u8]) -> Ordering {
    query.cmp(stored)
}

/// Comparator that ignores a single trailing NUL byte on either key.
///
/// Lets a NUL-terminated key and its length-only rendition resolve to
/// the same record. Historically this behavior was inferred from the key
/// contents; here it must be opted into explicitly via
/// [`VarMap::with_comparator`]. Keys that legitimately end in a NUL byte
/// must not use it.
pub fn cmp_ignore_trailing_nul(query: &[u8], stored: &[u8]) -> Ordering {
    fn strip(key: &[u8]) -> &[u8] {
        match key {
            [head @ .., 0] => head,
            _ => key,
        }
    }
    strip(query).cmp(strip(stored))
}

/// Non-owning view of one packed record, derived fresh on every access.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct Entry<'a> {
    pub key: &'a [u8],
    pub value: &'a [u8],
}

pub struct VarMap {
    bucket_count: usize,
    hash: HashFn,
    compare: CompareFn,
    drop_key: Option<DropFn>,
    drop_val: Option<DropFn>,
    // Lazily materialized on first insert.
    buckets: Option<Box<[GrowBuffer<u8>]>>,
    len: usize,
}

impl std::fmt::Debug for VarMap {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VarMap")
            .field("bucket_count", &self.bucket_count)
            .field("len", &self.len)
            .finish_non_exhaustive()
    }
}

fn read_len(bytes: &[u8], at: usize) -> usize {
    let mut raw = [0u8; LEN_FIELD];
    raw.copy_from_slice(&bytes[at..at + LEN_FIELD]);
    u64::from_ne_bytes(raw) as usize
}

fn write_len(bytes: &mut [u8], at: usize, len: usize) {
    bytes[at..at + LEN_FIELD].copy_from_slice(&(len as u64).to_ne_bytes());
}

// Scan one bucket for `key`. Returns (record offset, key_len, val_len).
fn find_in(bytes: &[u8], compare: CompareFn, key: &[u8]) -> Option<(usize, usize, usize)> {
    let mut at = 0;
    while at + HEADER <= bytes.len() {
        let key_len = read_len(bytes, at);
        let val_len = read_len(bytes, at + LEN_FIELD);
        let key_start = at + HEADER;
        let stored = &bytes[key_start..key_start + key_len];
        if compare(key, stored) == Ordering::Equal {
            return Some((at, key_len, val_len));
        }
        at = key_start + key_len + val_len;
    }
    None
}

impl VarMap {
    /// A map with `bucket_count` buckets. The count is fixed for the
    /// map's lifetime. No bucket storage is allocated until the first
    /// insert.
    ///
    /// # Panics
    ///
    /// Panics if `bucket_count` is zero.
    pub fn new(bucket_count: usize) -> Self {
        assert!(bucket_count > 0, "VarMap requires at least one bucket");
        Self {
            bucket_count,
            hash: hash_djb2,
            compare: cmp_bytes,
            drop_key: None,
            drop_val: None,
            buckets: None,
            len: 0,
        }
    }

    /// Replace the default djb2 hash.
    pub fn with_hasher(mut self, hash: HashFn) -> Self {
        self.hash = hash;
        self
    }

    /// Replace the default byte-wise comparator. The comparator is the
    /// sole equality rule for keys.
    pub fn with_comparator(mut self, compare: CompareFn) -> Self {
        self.compare = compare;
        self
    }

    /// Install teardown hooks, run once per entry on clear or drop.
    pub fn with_drop_hooks(mut self, key: Option<DropFn>, value: Option<DropFn>) -> Self {
        self.drop_key = key;
        self.drop_val = value;
        self
    }

    pub fn bucket_count(&self) -> usize {
        self.bucket_count
    }

    /// Number of live entries.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    fn bucket_index(&self, key: &[u8]) -> usize {
        ((self.hash)(key) % self.bucket_count as u64) as usize
    }

    /// Insert `key` → `value`. If an entry with an equal key (per the
    /// comparator) exists in the target bucket, its value is replaced in
    /// place: the bucket grows or shrinks around the old value region
    /// and the bytes that follow slide to fit.
    pub fn insert(&mut self, key: &[u8], value: &[u8]) {
        self.insert_impl(key, Some(value), value.len());
    }

    /// Insert `key` with a zero-filled value region of `value_len`
    /// bytes, reserving space to be filled through a later replace.
    pub fn insert_zeroed(&mut self, key: &[u8], value_len: usize) {
        self.insert_impl(key, None, value_len);
    }

    fn insert_impl(&mut self, key: &[u8], value: Option<&[u8]>, value_len: usize) {
        let idx = self.bucket_index(key);
        let compare = self.compare;
        let bucket_count = self.bucket_count;
        let buckets = self.buckets.get_or_insert_with(|| {
            (0..bucket_count)
                .map(|_| GrowBuffer::new())
                .collect::<Vec<_>>()
                .into_boxed_slice()
        });
        let bucket = &mut buckets[idx];

        if let Some((at, key_len, old_len)) = find_in(bucket.as_slice(), compare, key) {
            // Replace in place. Offsets are recomputed below after any
            // growth, never carried across the reallocation.
            let val_start = at + HEADER + key_len;
            let old_end = val_start + old_len;
            if value_len > old_len {
                let delta = value_len - old_len;
                bucket.append(delta);
                let tail = bucket.len() - delta;
                bucket
                    .as_mut_slice()
                    .copy_within(old_end..tail, old_end + delta);
            } else if value_len < old_len {
                let delta = old_len - value_len;
                let tail = bucket.len();
                bucket
                    .as_mut_slice()
                    .copy_within(old_end..tail, val_start + value_len);
                bucket.truncate(tail - delta);
            }
            let bytes = bucket.as_mut_slice();
            write_len(bytes, at + LEN_FIELD, value_len);
            match value {
                Some(v) => bytes[val_start..val_start + value_len].copy_from_slice(v),
                None => bytes[val_start..val_start + value_len].fill(0),
            }
            return;
        }

        // Append a new packed record at the bucket's tail. The appended
        // region is already zero-filled, which covers the reserved-value
        // form.
        let at = bucket.append(HEADER + key.len() + value_len);
        let bytes = bucket.as_mut_slice();
        write_len(bytes, at, key.len());
        write_len(bytes, at + LEN_FIELD, value_len);
        let key_start = at + HEADER;
        bytes[key_start..key_start + key.len()].copy_from_slice(key);
        if let Some(v) = value {
            bytes[key_start + key.len()..key_start + key.len() + value_len].copy_from_slice(v);
        }
        self.len += 1;
    }

    /// Look up `key`. `None` when the map has never been inserted into
    /// or the key is absent. Scans only the target bucket.
    pub fn get(&self, key: &[u8]) -> Option<Entry<'_>> {
        let buckets = self.buckets.as_ref()?;
        let bucket = &buckets[self.bucket_index(key)];
        let (at, key_len, val_len) = find_in(bucket.as_slice(), self.compare, key)?;
        let bytes = bucket.as_slice();
        let key_start = at + HEADER;
        Some(Entry {
            key: &bytes[key_start..key_start + key_len],
            value: &bytes[key_start + key_len..key_start + key_len + val_len],
        })
    }

    /// Value projection of [`VarMap::get`].
    pub fn get_value(&self, key: &[u8]) -> Option<&[u8]> {
        self.get(key).map(|entry| entry.value)
    }

    /// Remove the entry for `key`, sliding all trailing bucket bytes
    /// left over its span. Returns false, mutating nothing, when the key
    /// is absent.
    pub fn remove(&mut self, key: &[u8]) -> bool {
        let idx = self.bucket_index(key);
        let compare = self.compare;
        let Some(buckets) = self.buckets.as_mut() else {
            return false;
        };
        let bucket = &mut buckets[idx];
        let Some((at, key_len, val_len)) = find_in(bucket.as_slice(), compare, key) else {
            return false;
        };
        let end = at + HEADER + key_len + val_len;
        let tail = bucket.len();
        bucket.as_mut_slice().copy_within(end..tail, at);
        bucket.truncate(tail - (end - at));
        self.len -= 1;
        true
    }

    /// Entries in bucket-index order, then in-bucket storage order.
    ///
    /// The iterator borrows the map; mutating the map while an iterator
    /// is live does not compile.
    pub fn iter(&self) -> Iter<'_> {
        Iter {
            map: self,
            bucket: 0,
            at: 0,
        }
    }

    /// Run the teardown hooks for every entry, then release every bucket
    /// buffer and the bucket directory. The map is reusable afterwards.
    pub fn clear(&mut self) {
        let Some(buckets) = self.buckets.take() else {
            self.len = 0;
            return;
        };
        if self.drop_key.is_some() || self.drop_val.is_some() {
            for bucket in buckets.iter() {
                let bytes = bucket.as_slice();
                let mut at = 0;
                while at + HEADER <= bytes.len() {
                    let key_len = read_len(bytes, at);
                    let val_len = read_len(bytes, at + LEN_FIELD);
                    let key_start = at + HEADER;
                    if let Some(hook) = self.drop_key {
                        hook(&bytes[key_start..key_start + key_len]);
                    }
                    if let Some(hook) = self.drop_val {
                        hook(&bytes[key_start + key_len..key_start + key_len + val_len]);
                    }
                    at = key_start + key_len + val_len;
                }
            }
        }
        self.len = 0;
    }
}

impl Drop for VarMap {
    fn drop(&mut self) {
        self.clear();
    }
}

/// Lazy iterator over [`Entry`] views. Finite; ends when no bucket has
/// remaining entries.
pub struct Iter<'a> {
    map: &'a VarMap,
    bucket: usize,
    at: usize,
}

impl<'a> Iterator for Iter<'a> {
    type Item = Entry<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        let buckets = self.map.buckets.as_ref()?;
        while self.bucket < buckets.len() {
            let bytes = buckets[self.bucket].as_slice();
            if self.at + HEADER <= bytes.len() {
                let key_len = read_len(bytes, self.at);
                let val_len = read_len(bytes, self.at + LEN_FIELD);
                let key_start = self.at + HEADER;
                self.at = key_start + key_len + val_len;
                return Some(Entry {
                    key: &bytes[key_start..key_start + key_len],
                    value: &bytes[key_start + key_len..key_start + key_len + val_len],
                });
            }
            self.bucket += 1;
            self.at = 0;
        }
        None
    }
}
