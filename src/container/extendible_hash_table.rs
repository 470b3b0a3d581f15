use std::collections::hash_map::RandomState;
use std::hash::{BuildHasher, Hash, Hasher};

use parking_lot::RwLock;

/// A bucket holding up to `bucket_size` entries. Multiple directory slots
/// may point at the same bucket; `depth` is the number of low-order hash
/// bits all of those slots agree on.
#[derive(Debug)]
struct Bucket<K, V> {
    depth: usize,
    items: Vec<(K, V)>,
}

#[derive(Debug)]
struct Directory<K, V> {
    global_depth: usize,
    num_buckets: usize,
    /// dir[i] is an index into `buckets`. len() == 2^global_depth.
    dir: Vec<usize>,
    /// Bucket arena. Buckets are only ever added; splitting reuses the
    /// overflowed bucket for one half and appends the other.
    buckets: Vec<Bucket<K, V>>,
}

/// In-memory extendible hash table.
///
/// The directory doubles whenever a bucket at maximum local depth
/// overflows; the overflowed bucket splits into two buckets one bit
/// deeper and its entries are re-distributed by their hashes. An insert
/// retries after a split and may split again if every entry still lands
/// in the same half.
///
/// The buffer pool instantiates this as its page directory
/// (`ExtendibleHashTable<PageId, FrameId>`). A single table-wide
/// reader-writer latch guards the directory and all buckets: probes take
/// it shared, inserts and removes take it exclusive.
pub struct ExtendibleHashTable<K, V, S = RandomState> {
    bucket_size: usize,
    hash_builder: S,
    state: RwLock<Directory<K, V>>,
}

impl<K, V> ExtendibleHashTable<K, V, RandomState>
where
    K: Hash + Eq,
{
    /// Creates a table with a single depth-0 bucket of the given capacity.
    pub fn new(bucket_size: usize) -> Self {
        Self::with_hasher(bucket_size, RandomState::new())
    }
}

impl<K, V, S> ExtendibleHashTable<K, V, S>
where
    K: Hash + Eq,
    S: BuildHasher,
{
    /// Creates a table using the supplied hasher. Tests use this to make
    /// bucket placement deterministic.
    pub fn with_hasher(bucket_size: usize, hash_builder: S) -> Self {
        assert!(bucket_size > 0, "bucket_size must be positive");
        Self {
            bucket_size,
            hash_builder,
            state: RwLock::new(Directory {
                global_depth: 0,
                num_buckets: 1,
                dir: vec![0],
                buckets: vec![Bucket {
                    depth: 0,
                    items: Vec::new(),
                }],
            }),
        }
    }

    fn hash_of(&self, key: &K) -> u64 {
        let mut hasher = self.hash_builder.build_hasher();
        key.hash(&mut hasher);
        hasher.finish()
    }

    fn index_of(hash: u64, global_depth: usize) -> usize {
        (hash as usize) & ((1usize << global_depth) - 1)
    }

    /// Inserts the key-value pair, replacing the value if the key is
    /// already present. Never fails; splits buckets (and doubles the
    /// directory) as often as needed to make room.
    pub fn insert(&self, key: K, value: V) {
        let hash = self.hash_of(&key);
        let mut state = self.state.write();

        loop {
            let slot = Self::index_of(hash, state.global_depth);
            let bucket_idx = state.dir[slot];
            let bucket = &mut state.buckets[bucket_idx];

            if let Some(entry) = bucket.items.iter_mut().find(|(k, _)| *k == key) {
                entry.1 = value;
                return;
            }
            if bucket.items.len() < self.bucket_size {
                bucket.items.push((key, value));
                return;
            }

            self.split_bucket(&mut state, bucket_idx);
        }
    }

    /// Splits the full bucket at `bucket_idx` one bit deeper, doubling the
    /// directory first if the bucket is already at global depth.
    fn split_bucket(&self, state: &mut Directory<K, V>, bucket_idx: usize) {
        if state.buckets[bucket_idx].depth == state.global_depth {
            let old_len = state.dir.len();
            for i in 0..old_len {
                let target = state.dir[i];
                state.dir.push(target);
            }
            state.global_depth += 1;
        }

        let old_depth = state.buckets[bucket_idx].depth;
        let new_idx = state.buckets.len();
        state.buckets[bucket_idx].depth = old_depth + 1;
        state.buckets.push(Bucket {
            depth: old_depth + 1,
            items: Vec::new(),
        });

        // Slots pointing at the old bucket agree on the low old_depth
        // bits; bit old_depth now decides which half they belong to.
        for i in 0..state.dir.len() {
            if state.dir[i] == bucket_idx && (i >> old_depth) & 1 == 1 {
                state.dir[i] = new_idx;
            }
        }

        let items = std::mem::take(&mut state.buckets[bucket_idx].items);
        for (k, v) in items {
            let slot = Self::index_of(self.hash_of(&k), state.global_depth);
            let target = state.dir[slot];
            state.buckets[target].items.push((k, v));
        }

        state.num_buckets += 1;
    }

    /// Looks up the value for a key.
    pub fn find(&self, key: &K) -> Option<V>
    where
        V: Clone,
    {
        let hash = self.hash_of(key);
        let state = self.state.read();
        let slot = Self::index_of(hash, state.global_depth);
        let bucket = &state.buckets[state.dir[slot]];
        bucket
            .items
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.clone())
    }

    /// Removes a key. Returns true if it was present.
    pub fn remove(&self, key: &K) -> bool {
        let hash = self.hash_of(key);
        let mut state = self.state.write();
        let slot = Self::index_of(hash, state.global_depth);
        let bucket_idx = state.dir[slot];
        let bucket = &mut state.buckets[bucket_idx];
        if let Some(pos) = bucket.items.iter().position(|(k, _)| k == key) {
            bucket.items.remove(pos);
            true
        } else {
            false
        }
    }

    /// Number of low-order hash bits the directory currently uses.
    pub fn global_depth(&self) -> usize {
        self.state.read().global_depth
    }

    /// Local depth of the bucket behind directory slot `dir_index`.
    pub fn local_depth(&self, dir_index: usize) -> usize {
        let state = self.state.read();
        state.buckets[state.dir[dir_index]].depth
    }

    /// Number of distinct buckets.
    pub fn num_buckets(&self) -> usize {
        self.state.read().num_buckets
    }

    /// Number of directory slots (== 2^global_depth).
    pub fn dir_size(&self) -> usize {
        self.state.read().dir.len()
    }
}
