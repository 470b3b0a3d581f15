use std::collections::LinkedList;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use log::{debug, error};
use parking_lot::Mutex;

use crate::common::{FrameId, PageId, Result, StratumError, INVALID_PAGE_ID};
use crate::container::ExtendibleHashTable;
use crate::storage::disk::{DiskManager, DiskScheduler};

use super::{FrameHeader, LruKReplacer};

/// BufferPoolManager caches disk pages in a fixed array of frames.
///
/// The page directory (an extendible hash table) maps resident page ids
/// to frame ids; the LRU-K replacer picks a victim when no free frame is
/// left. Page ids are allocated monotonically and never recycled, so a
/// stale id can never alias a newer page even after its frame is reused.
///
/// Locking: a single pool latch linearizes directory, replacer and
/// free-list changes. Disk I/O on a frame runs outside the pool latch
/// while the frame's data write guard - acquired before the latch is
/// released - keeps other callers from observing the frame mid-transition.
pub struct BufferPoolManager {
    pool_size: usize,
    frames: Vec<Arc<FrameHeader>>,
    page_table: ExtendibleHashTable<PageId, FrameId>,
    replacer: LruKReplacer,
    free_list: Mutex<LinkedList<FrameId>>,
    next_page_id: AtomicU32,
    disk_scheduler: DiskScheduler,
    latch: Mutex<()>,
}

impl BufferPoolManager {
    /// Creates a pool with `pool_size` frames, LRU-`replacer_k` eviction
    /// and the default directory bucket size.
    pub fn new(pool_size: usize, replacer_k: usize, disk_manager: Arc<DiskManager>) -> Self {
        Self::with_bucket_size(
            pool_size,
            replacer_k,
            crate::common::DEFAULT_BUCKET_SIZE,
            disk_manager,
        )
    }

    pub fn with_bucket_size(
        pool_size: usize,
        replacer_k: usize,
        bucket_size: usize,
        disk_manager: Arc<DiskManager>,
    ) -> Self {
        let mut frames = Vec::with_capacity(pool_size);
        let mut free_list = LinkedList::new();
        for i in 0..pool_size {
            let frame_id = FrameId::new(i as u32);
            frames.push(Arc::new(FrameHeader::new(frame_id)));
            free_list.push_back(frame_id);
        }

        Self {
            pool_size,
            frames,
            page_table: ExtendibleHashTable::new(bucket_size),
            replacer: LruKReplacer::new(pool_size, replacer_k),
            free_list: Mutex::new(free_list),
            next_page_id: AtomicU32::new(0),
            disk_scheduler: DiskScheduler::new(disk_manager),
            latch: Mutex::new(()),
        }
    }

    /// Allocates a fresh page id and binds it to a frame, pinned once.
    /// The frame's bytes are zeroed. Fails with `OutOfFrames` when every
    /// frame is pinned and nothing is evictable.
    pub fn new_page(&self) -> Result<(PageId, Arc<FrameHeader>)> {
        let latch = self.latch.lock();
        let page_id = PageId::new(self.next_page_id.fetch_add(1, Ordering::SeqCst));

        let frame_id = self.acquire_frame_locked()?;
        let frame = Arc::clone(&self.frames[frame_id.as_usize()]);
        self.replacer.record_access(frame_id)?;
        self.replacer.set_evictable(frame_id, false)?;
        self.page_table.insert(page_id, frame_id);

        let mut data = frame.write_data();
        drop(latch);

        if frame.is_dirty() {
            self.disk_scheduler
                .schedule_write_sync(frame.page_id(), &data[..])?;
        }
        data.fill(0);
        drop(data);

        frame.set_page_id(page_id);
        frame.set_dirty(false);
        frame.pin();

        Ok((page_id, frame))
    }

    /// Fetches a page, pinning its frame. A directory hit bumps the pin
    /// count; a miss claims a frame (writing back the victim's dirty
    /// bytes) and reads the page from disk. Pages that were never written
    /// read back as zeroes.
    pub fn fetch_page(&self, page_id: PageId) -> Result<Arc<FrameHeader>> {
        if page_id == INVALID_PAGE_ID {
            return Err(StratumError::InvalidPageId(page_id));
        }

        let latch = self.latch.lock();

        if let Some(frame_id) = self.page_table.find(&page_id) {
            let frame = Arc::clone(&self.frames[frame_id.as_usize()]);
            self.replacer.record_access(frame_id)?;
            if frame.pin_count() == 0 {
                self.replacer.set_evictable(frame_id, false)?;
            }
            frame.pin();
            return Ok(frame);
        }

        let frame_id = self.acquire_frame_locked()?;
        let frame = Arc::clone(&self.frames[frame_id.as_usize()]);
        self.replacer.record_access(frame_id)?;
        self.replacer.set_evictable(frame_id, false)?;
        self.page_table.insert(page_id, frame_id);

        let mut data = frame.write_data();
        drop(latch);

        if frame.is_dirty() {
            self.disk_scheduler
                .schedule_write_sync(frame.page_id(), &data[..])?;
        }
        self.disk_scheduler
            .schedule_read_sync(page_id, &mut data[..])?;
        drop(data);

        frame.set_page_id(page_id);
        frame.set_dirty(false);
        frame.pin();

        Ok(frame)
    }

    /// Drops one pin on a resident page. Returns false when the page is
    /// not resident or its pin count is already 0. A true `is_dirty`
    /// sticks; unpinning clean never clears an earlier dirty observation.
    pub fn unpin_page(&self, page_id: PageId, is_dirty: bool) -> bool {
        let _latch = self.latch.lock();

        let Some(frame_id) = self.page_table.find(&page_id) else {
            return false;
        };
        let frame = &self.frames[frame_id.as_usize()];

        match frame.unpin() {
            None => false,
            Some(remaining) => {
                if is_dirty {
                    frame.set_dirty(true);
                }
                if remaining == 0 {
                    if let Err(e) = self.replacer.set_evictable(frame_id, true) {
                        error!("replacer rejected frame {} on unpin: {}", frame_id, e);
                    }
                }
                true
            }
        }
    }

    /// Writes a resident page's bytes to disk and clears its dirty flag.
    /// Returns Ok(false) if the page is not resident.
    pub fn flush_page(&self, page_id: PageId) -> Result<bool> {
        if page_id == INVALID_PAGE_ID {
            return Err(StratumError::InvalidPageId(page_id));
        }

        let latch = self.latch.lock();
        let Some(frame_id) = self.page_table.find(&page_id) else {
            return Ok(false);
        };
        let frame = Arc::clone(&self.frames[frame_id.as_usize()]);
        let data = frame.read_data();
        drop(latch);

        self.disk_scheduler.schedule_write_sync(page_id, &data[..])?;
        frame.set_dirty(false);
        Ok(true)
    }

    /// Writes every resident page to disk, clearing dirty flags.
    pub fn flush_all_pages(&self) -> Result<()> {
        for frame in &self.frames {
            let data = frame.read_data();
            let page_id = frame.page_id();
            if page_id == INVALID_PAGE_ID {
                continue;
            }
            self.disk_scheduler.schedule_write_sync(page_id, &data[..])?;
            frame.set_dirty(false);
        }
        Ok(())
    }

    /// Removes a page from the pool, freeing its frame. Returns Ok(true)
    /// when the page is not resident or was removed, Ok(false) when it is
    /// still pinned. The page id itself is never reused.
    pub fn delete_page(&self, page_id: PageId) -> Result<bool> {
        let _latch = self.latch.lock();

        let Some(frame_id) = self.page_table.find(&page_id) else {
            return Ok(true);
        };
        let frame = &self.frames[frame_id.as_usize()];
        // Wait out any in-flight initialization of this frame; its pin is
        // only visible once the initializer releases the data guard.
        drop(frame.write_data());
        if frame.pin_count() > 0 {
            return Ok(false);
        }

        self.page_table.remove(&page_id);
        self.replacer.remove(frame_id)?;
        frame.reset();
        self.free_list.lock().push_back(frame_id);
        debug!("deleted page {} from frame {}", page_id, frame_id);
        Ok(true)
    }

    pub fn pool_size(&self) -> usize {
        self.pool_size
    }

    pub fn free_frame_count(&self) -> usize {
        self.free_list.lock().len()
    }

    /// Pin count of a resident page, None when not resident.
    pub fn get_pin_count(&self, page_id: PageId) -> Option<u32> {
        let _latch = self.latch.lock();
        self.page_table
            .find(&page_id)
            .map(|frame_id| self.frames[frame_id.as_usize()].pin_count())
    }

    /// Claims a frame for a new binding: the free list first, then the
    /// replacer. The victim's old directory entry is removed here, under
    /// the pool latch; its dirty bytes are written back by the caller.
    fn acquire_frame_locked(&self) -> Result<FrameId> {
        if let Some(frame_id) = self.free_list.lock().pop_front() {
            return Ok(frame_id);
        }

        let frame_id = self.replacer.evict().ok_or(StratumError::OutOfFrames)?;
        let frame = &self.frames[frame_id.as_usize()];
        let old_page_id = frame.page_id();
        if old_page_id != INVALID_PAGE_ID {
            self.page_table.remove(&old_page_id);
        }
        debug!("evicting page {} from frame {}", old_page_id, frame_id);
        Ok(frame_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    fn create_bpm(pool_size: usize) -> (BufferPoolManager, NamedTempFile) {
        let temp_file = NamedTempFile::new().unwrap();
        let dm = Arc::new(DiskManager::new(temp_file.path()).unwrap());
        let bpm = BufferPoolManager::new(pool_size, 2, dm);
        (bpm, temp_file)
    }

    #[test]
    fn test_new_pool_is_all_free() {
        let (bpm, _temp) = create_bpm(10);
        assert_eq!(bpm.pool_size(), 10);
        assert_eq!(bpm.free_frame_count(), 10);
    }

    #[test]
    fn test_new_page_is_pinned() {
        let (bpm, _temp) = create_bpm(10);

        let (page_id, _frame) = bpm.new_page().unwrap();
        assert_eq!(page_id, PageId::new(0));
        assert_eq!(bpm.get_pin_count(page_id), Some(1));
        assert_eq!(bpm.free_frame_count(), 9);
    }

    #[test]
    fn test_write_read_roundtrip() {
        let (bpm, _temp) = create_bpm(10);

        let (page_id, frame) = bpm.new_page().unwrap();
        frame.write_data()[0] = 42;
        frame.write_data()[100] = 255;
        bpm.unpin_page(page_id, true);

        let frame = bpm.fetch_page(page_id).unwrap();
        assert_eq!(frame.read_data()[0], 42);
        assert_eq!(frame.read_data()[100], 255);
        bpm.unpin_page(page_id, false);
    }

    #[test]
    fn test_flush_persists_across_pools() {
        let (bpm, temp) = create_bpm(10);

        let (page_id, frame) = bpm.new_page().unwrap();
        frame.write_data()[0] = 42;
        bpm.unpin_page(page_id, true);
        bpm.flush_page(page_id).unwrap();
        drop(bpm);

        let dm = Arc::new(DiskManager::new(temp.path()).unwrap());
        let bpm2 = BufferPoolManager::new(10, 2, dm);
        let frame = bpm2.fetch_page(page_id).unwrap();
        assert_eq!(frame.read_data()[0], 42);
        bpm2.unpin_page(page_id, false);
    }

    #[test]
    fn test_pool_full_when_all_pinned() {
        let (bpm, _temp) = create_bpm(2);

        let (_p1, _f1) = bpm.new_page().unwrap();
        let (_p2, _f2) = bpm.new_page().unwrap();

        assert!(matches!(bpm.new_page(), Err(StratumError::OutOfFrames)));
    }

    #[test]
    fn test_unpin_makes_room() {
        let (bpm, _temp) = create_bpm(2);

        let (p1, _f1) = bpm.new_page().unwrap();
        let (_p2, _f2) = bpm.new_page().unwrap();
        assert!(bpm.unpin_page(p1, false));

        let (p3, _f3) = bpm.new_page().unwrap();
        assert_eq!(p3, PageId::new(2));
        // p1 was evicted to make room.
        assert_eq!(bpm.get_pin_count(p1), None);
    }

    #[test]
    fn test_delete_page() {
        let (bpm, _temp) = create_bpm(10);

        let (page_id, _frame) = bpm.new_page().unwrap();
        // Pinned pages cannot be deleted.
        assert!(!bpm.delete_page(page_id).unwrap());

        bpm.unpin_page(page_id, false);
        assert!(bpm.delete_page(page_id).unwrap());
        assert_eq!(bpm.get_pin_count(page_id), None);
        assert_eq!(bpm.free_frame_count(), 10);

        // Deleting a non-resident page reports success.
        assert!(bpm.delete_page(PageId::new(99)).unwrap());
    }

    #[test]
    fn test_unpin_unknown_page() {
        let (bpm, _temp) = create_bpm(4);
        assert!(!bpm.unpin_page(PageId::new(7), false));
    }
}
