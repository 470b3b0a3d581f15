use std::marker::PhantomData;
use std::sync::Arc;

use crate::buffer::BufferPoolManager;
use crate::common::{PageId, Result, INVALID_PAGE_ID};

use super::btree_page::LeafPageRef;
use super::key::Storable;

/// Forward iterator over the leaf chain of a B+ tree.
///
/// The cursor is a plain (page id, index) pair: each access fetches the
/// leaf, reads one entry and unpins it again, so an iterator pins nothing
/// between calls. The end position is represented by an invalid page id.
pub struct IndexIterator<K, V> {
    bpm: Arc<BufferPoolManager>,
    page_id: PageId,
    index: usize,
    _marker: PhantomData<(K, V)>,
}

impl<K, V> IndexIterator<K, V>
where
    K: Storable,
    V: Storable,
{
    pub(crate) fn new(bpm: Arc<BufferPoolManager>, page_id: PageId, index: usize) -> Self {
        Self {
            bpm,
            page_id,
            index,
            _marker: PhantomData,
        }
    }

    pub fn is_end(&self) -> bool {
        self.page_id == INVALID_PAGE_ID
    }

    /// Reads the entry under the cursor. Must not be called at the end.
    pub fn get(&self) -> Result<(K, V)> {
        assert!(!self.is_end(), "dereferencing an end iterator");
        let frame = self.bpm.fetch_page(self.page_id)?;
        let entry = {
            let data = frame.read_data();
            let leaf = LeafPageRef::<K, V>::new(&data[..]);
            (leaf.key_at(self.index), leaf.value_at(self.index))
        };
        self.bpm.unpin_page(self.page_id, false);
        Ok(entry)
    }

    /// Steps to the next entry, following the sibling chain at the end of
    /// each leaf. Must not be called at the end.
    pub fn advance(&mut self) -> Result<()> {
        assert!(!self.is_end(), "advancing an end iterator");
        let frame = self.bpm.fetch_page(self.page_id)?;
        let (size, next) = {
            let data = frame.read_data();
            let leaf = LeafPageRef::<K, V>::new(&data[..]);
            (leaf.size(), leaf.next_page_id())
        };
        self.bpm.unpin_page(self.page_id, false);

        if self.index + 1 < size {
            self.index += 1;
            return Ok(());
        }

        // Move along the chain, skipping any empty leaves deletions may
        // have left behind.
        let mut next = next;
        while next != INVALID_PAGE_ID {
            let frame = self.bpm.fetch_page(next)?;
            let (size, after) = {
                let data = frame.read_data();
                let leaf = LeafPageRef::<K, V>::new(&data[..]);
                (leaf.size(), leaf.next_page_id())
            };
            self.bpm.unpin_page(next, false);
            if size > 0 {
                self.page_id = next;
                self.index = 0;
                return Ok(());
            }
            next = after;
        }
        self.page_id = INVALID_PAGE_ID;
        self.index = 0;
        Ok(())
    }
}

impl<K, V> Iterator for IndexIterator<K, V>
where
    K: Storable,
    V: Storable,
{
    type Item = Result<(K, V)>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.is_end() {
            return None;
        }
        let entry = match self.get() {
            Ok(entry) => entry,
            Err(e) => {
                self.page_id = INVALID_PAGE_ID;
                return Some(Err(e));
            }
        };
        if let Err(e) = self.advance() {
            self.page_id = INVALID_PAGE_ID;
            return Some(Err(e));
        }
        Some(Ok(entry))
    }
}
