//! Stratum - the storage-engine core of an embedded relational database
//!
//! The crate provides the four mutually dependent subsystems under a
//! disk-oriented database: pages live on disk, a buffer pool caches them
//! in memory, and an ordered index is built out of pool-managed pages.
//!
//! # Architecture
//!
//! - **Storage Layer** (`storage`): disk I/O and well-known pages
//!   - `DiskManager`: reads and writes pages against the database file
//!   - `DiskScheduler`: background worker thread for page I/O
//!   - `HeaderPage`: the page-0 record map of index roots
//!
//! - **Buffer Pool** (`buffer`): memory management for database pages
//!   - `BufferPoolManager`: pins pages in frames, mediating all disk I/O
//!   - `LruKReplacer`: LRU-K eviction policy
//!   - `FrameHeader`: per-frame metadata and page bytes
//!
//! - **Containers** (`container`): in-memory structures
//!   - `ExtendibleHashTable`: the pool's page-id to frame-id directory
//!
//! - **Index** (`index`): ordered key-value indexing
//!   - `BPlusTree`: disk-backed B+ tree with a forward range iterator
//!   - `GenericKey` / `KeyComparator`: fixed-width keys and their order
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use stratum::buffer::BufferPoolManager;
//! use stratum::common::{RecordId, SlotId, Transaction};
//! use stratum::index::{BPlusTree, GenericKey, IntegerComparator};
//! use stratum::storage::disk::DiskManager;
//! use stratum::PageId;
//!
//! let disk_manager = Arc::new(DiskManager::new("test.db").unwrap());
//! let bpm = Arc::new(BufferPoolManager::new(64, 2, disk_manager));
//!
//! // Page 0 is the header page; allocate it before the first index.
//! let (header_id, _frame) = bpm.new_page().unwrap();
//! bpm.unpin_page(header_id, false);
//!
//! let tree: BPlusTree<GenericKey<8>, RecordId, IntegerComparator> =
//!     BPlusTree::new("demo_index", Arc::clone(&bpm), IntegerComparator, 32, 32);
//!
//! let txn = Transaction::new();
//! let key = GenericKey::<8>::from_integer(42);
//! let rid = RecordId::new(PageId::new(7), SlotId::new(0));
//! tree.insert(&key, &rid, &txn).unwrap();
//! assert_eq!(tree.get_value(&key, &txn).unwrap(), Some(rid));
//! ```

pub mod buffer;
pub mod common;
pub mod container;
pub mod index;
pub mod storage;

// Re-export commonly used types at the crate root
pub use common::{FrameId, PageId, RecordId, Result, SlotId, StratumError, Transaction};
