use std::cmp::Ordering as CmpOrdering;
use std::fmt;
use std::io;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use log::debug;
use parking_lot::RwLock;

use crate::buffer::{BufferPoolManager, FrameHeader};
use crate::common::{PageId, Result, Transaction, HEADER_PAGE_ID, INVALID_PAGE_ID};
use crate::storage::page::HeaderPage;

use super::btree_page::{
    BTreePageMut, BTreePageRef, InternalPageMut, InternalPageRef, LeafPageMut, LeafPageRef,
};
use super::index_iterator::IndexIterator;
use super::key::Storable;
use super::key_comparator::KeyComparator;

/// Disk-backed B+ tree mapping fixed-size keys to fixed-size values.
///
/// Pages are obtained from the buffer pool by id and referenced between
/// nodes as plain page ids; pinning is the only lifetime discipline for
/// page bytes. Keys are unique; duplicate inserts are rejected.
///
/// Concurrency: writers (insert, remove) hold the tree latch exclusively,
/// readers (get_value, iterators) share it. The root-pointer latch orders
/// access to `root_page_id` at operation entry, before the tree latch is
/// taken, and is released once the descent starts. Root changes during a
/// structure modification happen under the exclusive tree latch.
pub struct BPlusTree<K, V, C> {
    index_name: String,
    bpm: Arc<BufferPoolManager>,
    comparator: C,
    leaf_max_size: usize,
    internal_max_size: usize,
    /// Current root page id (INVALID_PAGE_ID while the tree is empty)
    root_page_id: AtomicU32,
    /// Root-pointer latch
    root_latch: RwLock<()>,
    /// Tree latch: shared by readers, exclusive for writers
    tree_latch: RwLock<()>,
    _marker: std::marker::PhantomData<(K, V)>,
}

impl<K, V, C> BPlusTree<K, V, C>
where
    K: Storable,
    V: Storable,
    C: KeyComparator<K>,
{
    /// Creates a tree handle. The tree itself is materialized lazily on
    /// first insert; its root is recorded in the header page under
    /// `index_name`.
    pub fn new(
        index_name: impl Into<String>,
        bpm: Arc<BufferPoolManager>,
        comparator: C,
        leaf_max_size: usize,
        internal_max_size: usize,
    ) -> Self {
        assert!(leaf_max_size >= 2, "leaf_max_size must be at least 2");
        assert!(
            internal_max_size >= 3,
            "internal_max_size must be at least 3"
        );
        Self {
            index_name: index_name.into(),
            bpm,
            comparator,
            leaf_max_size,
            internal_max_size,
            root_page_id: AtomicU32::new(INVALID_PAGE_ID.as_u32()),
            root_latch: RwLock::new(()),
            tree_latch: RwLock::new(()),
            _marker: std::marker::PhantomData,
        }
    }

    pub fn root_page_id(&self) -> PageId {
        PageId::new(self.root_page_id.load(Ordering::Acquire))
    }

    fn store_root(&self, root: PageId) {
        self.root_page_id.store(root.as_u32(), Ordering::Release);
    }

    pub fn is_empty(&self) -> bool {
        self.root_page_id() == INVALID_PAGE_ID
    }

    /// Point lookup.
    pub fn get_value(&self, key: &K, _txn: &Transaction) -> Result<Option<V>> {
        let root_guard = self.root_latch.read();
        let root = self.root_page_id();
        if root == INVALID_PAGE_ID {
            return Ok(None);
        }
        let _tree = self.tree_latch.read();
        drop(root_guard);

        let mut page_id = root;
        loop {
            let frame = self.bpm.fetch_page(page_id)?;
            let next = {
                let data = frame.read_data();
                let header = BTreePageRef::new(&data[..]);
                if header.is_leaf() {
                    let leaf = LeafPageRef::<K, V>::new(&data[..]);
                    let index = leaf.lower_bound(key, &self.comparator);
                    let found = index < leaf.size()
                        && self.comparator.compare(&leaf.key_at(index), key)
                            == CmpOrdering::Equal;
                    let value = if found { Some(leaf.value_at(index)) } else { None };
                    drop(data);
                    self.bpm.unpin_page(page_id, false);
                    return Ok(value);
                }
                let internal = InternalPageRef::<K>::new(&data[..]);
                internal.child_at(internal.lookup_child(key, &self.comparator))
            };
            self.bpm.unpin_page(page_id, false);
            page_id = next;
        }
    }

    /// Inserts a key-value pair. Returns false (leaving the tree
    /// unchanged) if the key already exists. The first insert creates the
    /// root leaf and records it in the header page.
    pub fn insert(&self, key: &K, value: &V, _txn: &Transaction) -> Result<bool> {
        let root_guard = self.root_latch.write();
        if self.root_page_id() == INVALID_PAGE_ID {
            let (root_id, frame) = self.bpm.new_page()?;
            {
                let mut data = frame.write_data();
                let mut leaf = LeafPageMut::<K, V>::new(&mut data[..]);
                leaf.init(root_id, INVALID_PAGE_ID, self.leaf_max_size);
            }
            self.bpm.unpin_page(root_id, true);
            self.store_root(root_id);
            self.update_root_record(root_id, true)?;
            debug!("index {}: created root leaf {}", self.index_name, root_id);
        }
        let _tree = self.tree_latch.write();
        let root = self.root_page_id();
        drop(root_guard);

        self.insert_recursive(root, key, value)
    }

    fn insert_recursive(&self, page_id: PageId, key: &K, value: &V) -> Result<bool> {
        let frame = self.bpm.fetch_page(page_id)?;
        let is_leaf = { BTreePageRef::new(&frame.read_data()[..]).is_leaf() };

        if is_leaf {
            let duplicate = {
                let mut data = frame.write_data();
                let mut leaf = LeafPageMut::<K, V>::new(&mut data[..]);
                let index = leaf.lower_bound(key, &self.comparator);
                if index < leaf.size()
                    && self.comparator.compare(&leaf.key_at(index), key) == CmpOrdering::Equal
                {
                    true
                } else {
                    leaf.insert_at(index, key, value);
                    false
                }
            };
            if duplicate {
                self.bpm.unpin_page(page_id, false);
                return Ok(false);
            }
        } else {
            let child = {
                let data = frame.read_data();
                let internal = InternalPageRef::<K>::new(&data[..]);
                internal.child_at(internal.lookup_child(key, &self.comparator))
            };
            if !self.insert_recursive(child, key, value)? {
                self.bpm.unpin_page(page_id, false);
                return Ok(false);
            }
        }

        let overflowed = {
            let data = frame.read_data();
            let header = BTreePageRef::new(&data[..]);
            if header.is_leaf() {
                header.size() == header.max_size()
            } else {
                header.size() == header.max_size() + 1
            }
        };
        if overflowed {
            self.split(page_id, &frame, is_leaf)?;
        }
        self.bpm.unpin_page(page_id, true);
        Ok(true)
    }

    /// Splits an overflowed node: upper half moves to a new right
    /// sibling and the separator key is pushed into the parent. An
    /// overflowed root first gets a fresh internal parent installed.
    fn split(&self, page_id: PageId, frame: &Arc<FrameHeader>, is_leaf: bool) -> Result<()> {
        let parent_id = {
            let data = frame.read_data();
            BTreePageRef::new(&data[..]).parent_page_id()
        };
        let parent_id = if parent_id == INVALID_PAGE_ID {
            let (new_root_id, root_frame) = self.bpm.new_page()?;
            {
                let mut rdata = root_frame.write_data();
                let mut root = InternalPageMut::<K>::new(&mut rdata[..]);
                root.init(new_root_id, INVALID_PAGE_ID, self.internal_max_size);
                root.push_first_child(page_id);
            }
            self.bpm.unpin_page(new_root_id, true);
            {
                let mut data = frame.write_data();
                BTreePageMut::new(&mut data[..]).set_parent_page_id(new_root_id);
            }
            self.store_root(new_root_id);
            self.update_root_record(new_root_id, false)?;
            debug!("index {}: new root {}", self.index_name, new_root_id);
            new_root_id
        } else {
            parent_id
        };

        let (sibling_id, sibling_frame) = self.bpm.new_page()?;
        let separator;
        let mut moved_children = Vec::new();
        {
            let mut data = frame.write_data();
            let mut sdata = sibling_frame.write_data();
            if is_leaf {
                let mut cur = LeafPageMut::<K, V>::new(&mut data[..]);
                let mut sibling = LeafPageMut::<K, V>::new(&mut sdata[..]);
                sibling.init(sibling_id, parent_id, self.leaf_max_size);
                let size = cur.size();
                let split_from = cur.min_size();
                for i in split_from..size {
                    sibling.push(&cur.key_at(i), &cur.value_at(i));
                }
                cur.set_size(split_from);
                sibling.set_next_page_id(cur.next_page_id());
                cur.set_next_page_id(sibling_id);
                separator = sibling.key_at(0);
            } else {
                let mut cur = InternalPageMut::<K>::new(&mut data[..]);
                let mut sibling = InternalPageMut::<K>::new(&mut sdata[..]);
                sibling.init(sibling_id, parent_id, self.internal_max_size);
                let size = cur.size();
                let split_from = size / 2;
                for i in split_from..size {
                    sibling.push(&cur.key_at(i), cur.child_at(i));
                    moved_children.push(cur.child_at(i));
                }
                cur.set_size(split_from);
                separator = sibling.key_at(0);
            }
        }
        self.bpm.unpin_page(sibling_id, true);

        for child in moved_children {
            self.reparent(child, sibling_id)?;
        }

        let parent_frame = self.bpm.fetch_page(parent_id)?;
        {
            let mut pdata = parent_frame.write_data();
            let mut parent = InternalPageMut::<K>::new(&mut pdata[..]);
            let index = parent.lookup_child(&separator, &self.comparator);
            parent.insert_at(index + 1, &separator, sibling_id);
        }
        self.bpm.unpin_page(parent_id, true);
        Ok(())
    }

    /// Deletes a key. Absent keys are a no-op.
    pub fn remove(&self, key: &K, _txn: &Transaction) -> Result<()> {
        let root_guard = self.root_latch.write();
        let root = self.root_page_id();
        if root == INVALID_PAGE_ID {
            return Ok(());
        }
        let _tree = self.tree_latch.write();
        drop(root_guard);

        self.remove_recursive(root, key)
    }

    fn remove_recursive(&self, page_id: PageId, key: &K) -> Result<()> {
        let frame = self.bpm.fetch_page(page_id)?;
        let is_leaf = { BTreePageRef::new(&frame.read_data()[..]).is_leaf() };

        if is_leaf {
            let removed = {
                let mut data = frame.write_data();
                let mut leaf = LeafPageMut::<K, V>::new(&mut data[..]);
                let index = leaf.lower_bound(key, &self.comparator);
                if index < leaf.size()
                    && self.comparator.compare(&leaf.key_at(index), key) == CmpOrdering::Equal
                {
                    leaf.remove_at(index);
                    true
                } else {
                    false
                }
            };
            if !removed {
                self.bpm.unpin_page(page_id, false);
                return Ok(());
            }
        } else {
            let child = {
                let data = frame.read_data();
                let internal = InternalPageRef::<K>::new(&data[..]);
                internal.child_at(internal.lookup_child(key, &self.comparator))
            };
            self.remove_recursive(child, key)?;
        }

        let (parent_id, underflowed) = {
            let data = frame.read_data();
            let header = BTreePageRef::new(&data[..]);
            let min_size = if header.is_leaf() {
                header.max_size() / 2
            } else {
                (header.max_size() + 1) / 2
            };
            (header.parent_page_id(), header.size() < min_size)
        };
        // The root is allowed to underflow.
        if parent_id == INVALID_PAGE_ID || !underflowed {
            self.bpm.unpin_page(page_id, true);
            return Ok(());
        }

        self.rebalance(page_id, &frame, parent_id, is_leaf)
    }

    /// Restores an underflowed non-root node: borrow from the left
    /// sibling, else from the right, else merge. Consumes the pin the
    /// caller holds on `page_id`.
    fn rebalance(
        &self,
        page_id: PageId,
        frame: &Arc<FrameHeader>,
        parent_id: PageId,
        is_leaf: bool,
    ) -> Result<()> {
        let parent_frame = self.bpm.fetch_page(parent_id)?;

        let (index, parent_size, left_id, right_id) = {
            let pdata = parent_frame.read_data();
            let parent = InternalPageRef::<K>::new(&pdata[..]);
            let size = parent.size();
            let index = parent.child_index_of(page_id).unwrap_or(0);
            let left = (index > 0).then(|| parent.child_at(index - 1));
            let right = (index + 1 < size).then(|| parent.child_at(index + 1));
            (index, size, left, right)
        };

        if let Some(left_id) = left_id {
            let left_frame = self.bpm.fetch_page(left_id)?;
            let borrowed =
                self.try_borrow_left(page_id, frame, &left_frame, &parent_frame, index, is_leaf)?;
            self.bpm.unpin_page(left_id, borrowed);
            if borrowed {
                self.bpm.unpin_page(parent_id, true);
                self.bpm.unpin_page(page_id, true);
                return Ok(());
            }
        }

        if let Some(right_id) = right_id {
            let right_frame = self.bpm.fetch_page(right_id)?;
            let borrowed = self.try_borrow_right(
                page_id,
                frame,
                &right_frame,
                &parent_frame,
                index,
                is_leaf,
            )?;
            self.bpm.unpin_page(right_id, borrowed);
            if borrowed {
                self.bpm.unpin_page(parent_id, true);
                self.bpm.unpin_page(page_id, true);
                return Ok(());
            }
        }

        // An only child has nobody to merge with; leave it underfull.
        if parent_size == 1 {
            self.bpm.unpin_page(parent_id, false);
            self.bpm.unpin_page(page_id, true);
            return Ok(());
        }

        // Merge with the right sibling when one exists, else with the
        // left. The right-hand node of the pair drains into the left and
        // is freed; the separator between them leaves the parent.
        let (left_id, left_frame, right_id, right_frame, sep_index) =
            if let Some(right_id) = right_id {
                let right_frame = self.bpm.fetch_page(right_id)?;
                (page_id, Arc::clone(frame), right_id, right_frame, index + 1)
            } else {
                // parent_size >= 2 and no right sibling, so index >= 1.
                let left_id = left_id.unwrap_or(INVALID_PAGE_ID);
                let left_frame = self.bpm.fetch_page(left_id)?;
                (left_id, left_frame, page_id, Arc::clone(frame), index)
            };

        let mut moved_children = Vec::new();
        {
            let mut pdata = parent_frame.write_data();
            let mut parent = InternalPageMut::<K>::new(&mut pdata[..]);
            let separator = parent.key_at(sep_index);
            let mut ldata = left_frame.write_data();
            let mut rdata = right_frame.write_data();
            if is_leaf {
                let mut left = LeafPageMut::<K, V>::new(&mut ldata[..]);
                let right = LeafPageMut::<K, V>::new(&mut rdata[..]);
                for i in 0..right.size() {
                    left.push(&right.key_at(i), &right.value_at(i));
                }
                left.set_next_page_id(right.next_page_id());
            } else {
                let mut left = InternalPageMut::<K>::new(&mut ldata[..]);
                let right = InternalPageMut::<K>::new(&mut rdata[..]);
                let boundary = left.size();
                for i in 0..right.size() {
                    left.push(&right.key_at(i), right.child_at(i));
                    moved_children.push(right.child_at(i));
                }
                // The drained node's slot-0 key is meaningless; the
                // separator takes its place at the seam.
                left.set_key_at(boundary, &separator);
            }
            parent.remove_at(sep_index);
        }

        for child in moved_children {
            self.reparent(child, left_id)?;
        }

        self.bpm.unpin_page(left_id, true);
        self.bpm.unpin_page(right_id, true);
        self.bpm.unpin_page(parent_id, true);
        self.bpm.delete_page(right_id)?;
        debug!(
            "index {}: merged {} into {}",
            self.index_name, right_id, left_id
        );
        Ok(())
    }

    fn try_borrow_left(
        &self,
        page_id: PageId,
        frame: &Arc<FrameHeader>,
        left_frame: &Arc<FrameHeader>,
        parent_frame: &Arc<FrameHeader>,
        index: usize,
        is_leaf: bool,
    ) -> Result<bool> {
        let moved_child;
        {
            let mut pdata = parent_frame.write_data();
            let mut parent = InternalPageMut::<K>::new(&mut pdata[..]);
            let mut ldata = left_frame.write_data();
            let mut data = frame.write_data();
            if is_leaf {
                let mut left = LeafPageMut::<K, V>::new(&mut ldata[..]);
                let mut cur = LeafPageMut::<K, V>::new(&mut data[..]);
                let left_size = left.size();
                if left_size <= left.min_size() {
                    return Ok(false);
                }
                let key = left.key_at(left_size - 1);
                let value = left.value_at(left_size - 1);
                left.remove_at(left_size - 1);
                cur.insert_at(0, &key, &value);
                parent.set_key_at(index, &key);
                moved_child = None;
            } else {
                let mut left = InternalPageMut::<K>::new(&mut ldata[..]);
                let mut cur = InternalPageMut::<K>::new(&mut data[..]);
                let left_size = left.size();
                if left_size <= left.min_size() {
                    return Ok(false);
                }
                let moved_key = left.key_at(left_size - 1);
                let child = left.child_at(left_size - 1);
                let old_separator = parent.key_at(index);
                left.remove_at(left_size - 1);
                // The borrowed child becomes child 0; the old separator
                // becomes the key of the entry it pushed to slot 1.
                cur.insert_at(0, &moved_key, child);
                cur.set_key_at(1, &old_separator);
                parent.set_key_at(index, &moved_key);
                moved_child = Some(child);
            }
        }
        if let Some(child) = moved_child {
            self.reparent(child, page_id)?;
        }
        Ok(true)
    }

    fn try_borrow_right(
        &self,
        page_id: PageId,
        frame: &Arc<FrameHeader>,
        right_frame: &Arc<FrameHeader>,
        parent_frame: &Arc<FrameHeader>,
        index: usize,
        is_leaf: bool,
    ) -> Result<bool> {
        let moved_child;
        {
            let mut pdata = parent_frame.write_data();
            let mut parent = InternalPageMut::<K>::new(&mut pdata[..]);
            let mut rdata = right_frame.write_data();
            let mut data = frame.write_data();
            if is_leaf {
                let mut right = LeafPageMut::<K, V>::new(&mut rdata[..]);
                let mut cur = LeafPageMut::<K, V>::new(&mut data[..]);
                let right_size = right.size();
                if right_size <= right.min_size() {
                    return Ok(false);
                }
                let key = right.key_at(0);
                let value = right.value_at(0);
                right.remove_at(0);
                cur.push(&key, &value);
                let new_separator = right.key_at(0);
                parent.set_key_at(index + 1, &new_separator);
                moved_child = None;
            } else {
                let mut right = InternalPageMut::<K>::new(&mut rdata[..]);
                let mut cur = InternalPageMut::<K>::new(&mut data[..]);
                let right_size = right.size();
                if right_size <= right.min_size() {
                    return Ok(false);
                }
                let separator = parent.key_at(index + 1);
                let child = right.child_at(0);
                let new_separator = right.key_at(1);
                right.remove_at(0);
                // The right sibling's first child joins this node under
                // the old separator key.
                cur.push(&separator, child);
                parent.set_key_at(index + 1, &new_separator);
                moved_child = Some(child);
            }
        }
        if let Some(child) = moved_child {
            self.reparent(child, page_id)?;
        }
        Ok(true)
    }

    fn reparent(&self, child: PageId, new_parent: PageId) -> Result<()> {
        let frame = self.bpm.fetch_page(child)?;
        {
            let mut data = frame.write_data();
            BTreePageMut::new(&mut data[..]).set_parent_page_id(new_parent);
        }
        self.bpm.unpin_page(child, true);
        Ok(())
    }

    /// Iterator positioned at the smallest key.
    pub fn begin(&self) -> Result<IndexIterator<K, V>> {
        let root_guard = self.root_latch.read();
        let root = self.root_page_id();
        if root == INVALID_PAGE_ID {
            return Ok(self.end());
        }
        let _tree = self.tree_latch.read();
        drop(root_guard);

        let mut page_id = root;
        loop {
            let frame = self.bpm.fetch_page(page_id)?;
            let (is_leaf, size, next_leaf, first_child) = {
                let data = frame.read_data();
                let header = BTreePageRef::new(&data[..]);
                if header.is_leaf() {
                    let leaf = LeafPageRef::<K, V>::new(&data[..]);
                    (true, leaf.size(), leaf.next_page_id(), INVALID_PAGE_ID)
                } else {
                    let internal = InternalPageRef::<K>::new(&data[..]);
                    (false, 0, INVALID_PAGE_ID, internal.child_at(0))
                }
            };
            self.bpm.unpin_page(page_id, false);
            if !is_leaf {
                page_id = first_child;
                continue;
            }
            if size > 0 {
                return Ok(IndexIterator::new(Arc::clone(&self.bpm), page_id, 0));
            }
            // Deletions can leave an empty leaf behind (an only child is
            // never merged away); keep walking the chain.
            if next_leaf == INVALID_PAGE_ID {
                return Ok(self.end());
            }
            page_id = next_leaf;
        }
    }

    /// Iterator positioned at the first entry whose key is >= `key`.
    pub fn begin_from(&self, key: &K) -> Result<IndexIterator<K, V>> {
        let root_guard = self.root_latch.read();
        let root = self.root_page_id();
        if root == INVALID_PAGE_ID {
            return Ok(self.end());
        }
        let _tree = self.tree_latch.read();
        drop(root_guard);

        let mut page_id = root;
        loop {
            let frame = self.bpm.fetch_page(page_id)?;
            let (is_leaf, index, size, next_leaf, child) = {
                let data = frame.read_data();
                let header = BTreePageRef::new(&data[..]);
                if header.is_leaf() {
                    let leaf = LeafPageRef::<K, V>::new(&data[..]);
                    let index = leaf.lower_bound(key, &self.comparator);
                    (true, index, leaf.size(), leaf.next_page_id(), INVALID_PAGE_ID)
                } else {
                    let internal = InternalPageRef::<K>::new(&data[..]);
                    let child = internal.child_at(internal.lookup_child(key, &self.comparator));
                    (false, 0, 0, INVALID_PAGE_ID, child)
                }
            };
            self.bpm.unpin_page(page_id, false);
            if !is_leaf {
                page_id = child;
                continue;
            }
            if index < size {
                return Ok(IndexIterator::new(Arc::clone(&self.bpm), page_id, index));
            }
            // Everything in this leaf is smaller; the chain continues
            // with strictly larger keys, so re-probe the next leaf.
            if next_leaf == INVALID_PAGE_ID {
                return Ok(self.end());
            }
            page_id = next_leaf;
        }
    }

    /// The past-the-end iterator.
    pub fn end(&self) -> IndexIterator<K, V> {
        IndexIterator::new(Arc::clone(&self.bpm), INVALID_PAGE_ID, 0)
    }

    /// Records the current root in the header page so the tree can be
    /// located after a restart. `insert` distinguishes first-time
    /// registration from updates.
    fn update_root_record(&self, root: PageId, insert: bool) -> Result<()> {
        let frame = self.bpm.fetch_page(HEADER_PAGE_ID)?;
        {
            let mut data = frame.write_data();
            let mut header = HeaderPage::new(&mut data[..]);
            if !insert || !header.insert_record(&self.index_name, root)? {
                header.update_record(&self.index_name, root)?;
            }
        }
        self.bpm.unpin_page(HEADER_PAGE_ID, true);
        Ok(())
    }
}

impl<K, V, C> BPlusTree<K, V, C>
where
    K: Storable + fmt::Debug,
    V: Storable,
    C: KeyComparator<K>,
{
    /// Writes a Graphviz rendering of the tree to `out`.
    pub fn draw<W: io::Write>(&self, out: &mut W) -> Result<()> {
        let root_guard = self.root_latch.read();
        let root = self.root_page_id();
        if root == INVALID_PAGE_ID {
            return Ok(());
        }
        let _tree = self.tree_latch.read();
        drop(root_guard);

        writeln!(out, "digraph G {{")?;
        self.to_graph(root, out)?;
        writeln!(out, "}}")?;
        Ok(())
    }

    fn to_graph<W: io::Write>(&self, page_id: PageId, out: &mut W) -> Result<()> {
        let frame = self.bpm.fetch_page(page_id)?;
        let (label, is_leaf, next, children) = {
            let data = frame.read_data();
            let header = BTreePageRef::new(&data[..]);
            if header.is_leaf() {
                let leaf = LeafPageRef::<K, V>::new(&data[..]);
                let keys: Vec<String> =
                    (0..leaf.size()).map(|i| format!("{:?}", leaf.key_at(i))).collect();
                (keys.join("|"), true, leaf.next_page_id(), Vec::new())
            } else {
                let internal = InternalPageRef::<K>::new(&data[..]);
                let keys: Vec<String> = (1..internal.size())
                    .map(|i| format!("{:?}", internal.key_at(i)))
                    .collect();
                let children: Vec<PageId> =
                    (0..internal.size()).map(|i| internal.child_at(i)).collect();
                (keys.join("|"), false, INVALID_PAGE_ID, children)
            }
        };
        self.bpm.unpin_page(page_id, false);

        let prefix = if is_leaf { "LEAF" } else { "INT" };
        writeln!(
            out,
            "  {}_{} [shape=record label=\"P={} | {}\"];",
            prefix,
            page_id.as_u32(),
            page_id.as_u32(),
            label
        )?;
        if is_leaf && next != INVALID_PAGE_ID {
            writeln!(out, "  LEAF_{} -> LEAF_{};", page_id.as_u32(), next.as_u32())?;
        }
        for child in &children {
            let child_frame = self.bpm.fetch_page(*child)?;
            let child_is_leaf = { BTreePageRef::new(&child_frame.read_data()[..]).is_leaf() };
            self.bpm.unpin_page(*child, false);
            let child_prefix = if child_is_leaf { "LEAF" } else { "INT" };
            writeln!(
                out,
                "  INT_{} -> {}_{};",
                page_id.as_u32(),
                child_prefix,
                child.as_u32()
            )?;
        }
        for child in children {
            self.to_graph(child, out)?;
        }
        Ok(())
    }

    /// Dumps the tree structure to standard output.
    pub fn print(&self) -> Result<()> {
        let root_guard = self.root_latch.read();
        let root = self.root_page_id();
        if root == INVALID_PAGE_ID {
            println!("<empty tree>");
            return Ok(());
        }
        let _tree = self.tree_latch.read();
        drop(root_guard);
        self.print_subtree(root, 0)
    }

    fn print_subtree(&self, page_id: PageId, depth: usize) -> Result<()> {
        let frame = self.bpm.fetch_page(page_id)?;
        let children = {
            let data = frame.read_data();
            let header = BTreePageRef::new(&data[..]);
            if header.is_leaf() {
                let leaf = LeafPageRef::<K, V>::new(&data[..]);
                let keys: Vec<String> =
                    (0..leaf.size()).map(|i| format!("{:?}", leaf.key_at(i))).collect();
                println!(
                    "{}Leaf {} next={}: [{}]",
                    "  ".repeat(depth),
                    page_id,
                    leaf.next_page_id(),
                    keys.join(",")
                );
                Vec::new()
            } else {
                let internal = InternalPageRef::<K>::new(&data[..]);
                let keys: Vec<String> = (1..internal.size())
                    .map(|i| format!("{:?}", internal.key_at(i)))
                    .collect();
                println!(
                    "{}Internal {}: [{}]",
                    "  ".repeat(depth),
                    page_id,
                    keys.join(",")
                );
                (0..internal.size()).map(|i| internal.child_at(i)).collect()
            }
        };
        self.bpm.unpin_page(page_id, false);
        for child in children {
            self.print_subtree(child, depth + 1)?;
        }
        Ok(())
    }
}
