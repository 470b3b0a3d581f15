//! Integration tests for the extendible hash table

use std::hash::{BuildHasher, Hasher};
use std::sync::Arc;
use std::thread;

use stratum::container::ExtendibleHashTable;

/// Pass-through hasher so bucket placement follows the key's own low
/// bits, making split behavior deterministic.
#[derive(Default)]
struct IdentityHasher(u64);

impl Hasher for IdentityHasher {
    fn finish(&self) -> u64 {
        self.0
    }

    fn write(&mut self, bytes: &[u8]) {
        let mut buf = [0u8; 8];
        let len = bytes.len().min(8);
        buf[..len].copy_from_slice(&bytes[..len]);
        self.0 = u64::from_le_bytes(buf);
    }
}

#[derive(Default, Clone)]
struct IdentityState;

impl BuildHasher for IdentityState {
    type Hasher = IdentityHasher;

    fn build_hasher(&self) -> IdentityHasher {
        IdentityHasher::default()
    }
}

#[test]
fn test_basic_insert_find_remove() {
    let table: ExtendibleHashTable<u64, u64> = ExtendibleHashTable::new(4);

    for i in 0..20u64 {
        table.insert(i, i * 2);
    }
    for i in 0..20u64 {
        assert_eq!(table.find(&i), Some(i * 2));
    }
    assert_eq!(table.find(&99), None);

    assert!(table.remove(&3));
    assert!(!table.remove(&3));
    assert_eq!(table.find(&3), None);
    assert_eq!(table.find(&4), Some(8));
}

#[test]
fn test_insert_overwrites() {
    let table: ExtendibleHashTable<u64, &str> = ExtendibleHashTable::new(2);

    table.insert(1, "first");
    table.insert(1, "second");
    assert_eq!(table.find(&1), Some("second"));
}

#[test]
fn test_recursive_split_on_colliding_low_bits() {
    // Keys whose low 4 bits agree force repeated directory doubling
    // before the third insert finds room: with bucket capacity 2 the
    // first split that separates 0 and 32 from 16 and 48 needs bit 4.
    let table: ExtendibleHashTable<u64, u64, IdentityState> =
        ExtendibleHashTable::with_hasher(2, IdentityState);

    table.insert(0, 100);
    table.insert(16, 116);
    table.insert(32, 132);

    assert!(table.global_depth() >= 3);
    assert!(table.num_buckets() >= 4);

    table.insert(48, 148);

    assert_eq!(table.find(&0), Some(100));
    assert_eq!(table.find(&16), Some(116));
    assert_eq!(table.find(&32), Some(132));
    assert_eq!(table.find(&48), Some(148));
    assert_eq!(table.dir_size(), 1 << table.global_depth());
}

#[test]
fn test_split_partitions_by_new_bit() {
    let table: ExtendibleHashTable<u64, u64, IdentityState> =
        ExtendibleHashTable::with_hasher(2, IdentityState);

    // 0 and 2 share bit 0 = 0; 1 overflows nothing. Inserting 4 (low
    // bits 100) splits the even bucket on bit 1.
    table.insert(0, 0);
    table.insert(2, 2);
    table.insert(1, 1);
    table.insert(4, 4);

    for key in [0u64, 1, 2, 4] {
        assert_eq!(table.find(&key), Some(key), "lost key {}", key);
    }
    for i in 0..table.dir_size() {
        assert!(table.local_depth(i) <= table.global_depth());
    }
}

#[test]
fn test_depth_invariants_under_load() {
    let table: ExtendibleHashTable<u64, u64> = ExtendibleHashTable::new(2);

    // 128 keys cannot fit in fewer than 64 capacity-2 buckets, so the
    // directory reaches depth 6 regardless of hash seeding.
    for i in 0..128u64 {
        table.insert(i, i);
    }

    assert!(table.global_depth() >= 6);
    assert!(table.num_buckets() >= 64);
    assert_eq!(table.dir_size(), 1 << table.global_depth());
    for i in 0..table.dir_size() {
        assert!(table.local_depth(i) <= table.global_depth());
    }
    for i in 0..128u64 {
        assert_eq!(table.find(&i), Some(i));
    }
}

#[test]
fn test_remove_then_reinsert() {
    let table: ExtendibleHashTable<u64, u64> = ExtendibleHashTable::new(2);

    for i in 0..32u64 {
        table.insert(i, i);
    }
    for i in 0..32u64 {
        assert!(table.remove(&i));
    }
    for i in 0..32u64 {
        assert_eq!(table.find(&i), None);
    }
    for i in 0..32u64 {
        table.insert(i, i + 1000);
    }
    for i in 0..32u64 {
        assert_eq!(table.find(&i), Some(i + 1000));
    }
}

#[test]
fn test_concurrent_inserts_and_probes() {
    let table: Arc<ExtendibleHashTable<u64, u64>> = Arc::new(ExtendibleHashTable::new(4));

    let handles: Vec<_> = (0..4u64)
        .map(|t| {
            let table = Arc::clone(&table);
            thread::spawn(move || {
                for i in 0..250u64 {
                    let key = t * 1000 + i;
                    table.insert(key, key);
                    assert_eq!(table.find(&key), Some(key));
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    for t in 0..4u64 {
        for i in 0..250u64 {
            let key = t * 1000 + i;
            assert_eq!(table.find(&key), Some(key));
        }
    }
}
