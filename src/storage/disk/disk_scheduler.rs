use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{bounded, Receiver, Sender};

use crate::common::{PageId, Result, StratumError, PAGE_SIZE};

use super::DiskManager;

type PageBuf = Box<[u8; PAGE_SIZE]>;

/// A disk I/O request processed by the scheduler's worker thread.
/// Buffers are owned by the request so the worker never touches caller
/// memory; the completion channel hands read buffers back.
enum DiskRequest {
    Read {
        page_id: PageId,
        buf: PageBuf,
        done: Sender<(bool, PageBuf)>,
    },
    Write {
        page_id: PageId,
        buf: PageBuf,
        done: Sender<bool>,
    },
}

/// DiskScheduler funnels page I/O through a single background worker
/// thread fed by a bounded request queue. The buffer pool uses the
/// synchronous wrappers; the queue decouples it from file-cursor
/// contention and gives one place to add batching later.
pub struct DiskScheduler {
    disk_manager: Arc<DiskManager>,
    request_sender: Sender<DiskRequest>,
    shutdown: Arc<AtomicBool>,
    worker_handle: Option<JoinHandle<()>>,
}

impl DiskScheduler {
    /// Creates a scheduler and spawns its worker thread.
    pub fn new(disk_manager: Arc<DiskManager>) -> Self {
        let (sender, receiver) = bounded::<DiskRequest>(128);
        let shutdown = Arc::new(AtomicBool::new(false));

        let dm = Arc::clone(&disk_manager);
        let shutdown_flag = Arc::clone(&shutdown);
        let worker_handle = thread::spawn(move || {
            Self::worker_loop(dm, receiver, shutdown_flag);
        });

        Self {
            disk_manager,
            request_sender: sender,
            shutdown,
            worker_handle: Some(worker_handle),
        }
    }

    /// Reads a page through the worker, blocking until it completes.
    pub fn schedule_read_sync(&self, page_id: PageId, data: &mut [u8]) -> Result<()> {
        assert_eq!(data.len(), PAGE_SIZE);

        let (tx, rx) = bounded(1);
        let request = DiskRequest::Read {
            page_id,
            buf: Box::new([0u8; PAGE_SIZE]),
            done: tx,
        };
        self.request_sender
            .send(request)
            .map_err(|e| StratumError::DiskScheduler(format!("failed to queue read: {}", e)))?;

        let (ok, buf) = rx
            .recv()
            .map_err(|e| StratumError::DiskScheduler(format!("read completion lost: {}", e)))?;
        if !ok {
            return Err(StratumError::DiskScheduler(format!(
                "read of page {} failed",
                page_id
            )));
        }
        data.copy_from_slice(&buf[..]);
        Ok(())
    }

    /// Writes a page through the worker, blocking until it completes.
    pub fn schedule_write_sync(&self, page_id: PageId, data: &[u8]) -> Result<()> {
        assert_eq!(data.len(), PAGE_SIZE);

        let mut buf: PageBuf = Box::new([0u8; PAGE_SIZE]);
        buf.copy_from_slice(data);

        let (tx, rx) = bounded(1);
        let request = DiskRequest::Write {
            page_id,
            buf,
            done: tx,
        };
        self.request_sender
            .send(request)
            .map_err(|e| StratumError::DiskScheduler(format!("failed to queue write: {}", e)))?;

        let ok = rx
            .recv()
            .map_err(|e| StratumError::DiskScheduler(format!("write completion lost: {}", e)))?;
        if !ok {
            return Err(StratumError::DiskScheduler(format!(
                "write of page {} failed",
                page_id
            )));
        }
        Ok(())
    }

    fn worker_loop(
        disk_manager: Arc<DiskManager>,
        receiver: Receiver<DiskRequest>,
        shutdown: Arc<AtomicBool>,
    ) {
        loop {
            if shutdown.load(Ordering::Relaxed) {
                // Drain what is already queued before exiting.
                while let Ok(request) = receiver.try_recv() {
                    Self::process_request(&disk_manager, request);
                }
                break;
            }

            match receiver.recv_timeout(std::time::Duration::from_millis(100)) {
                Ok(request) => Self::process_request(&disk_manager, request),
                Err(crossbeam_channel::RecvTimeoutError::Timeout) => {}
                Err(crossbeam_channel::RecvTimeoutError::Disconnected) => break,
            }
        }
    }

    fn process_request(disk_manager: &DiskManager, request: DiskRequest) {
        match request {
            DiskRequest::Read {
                page_id,
                mut buf,
                done,
            } => {
                let ok = disk_manager.read_page(page_id, &mut buf[..]).is_ok();
                let _ = done.send((ok, buf));
            }
            DiskRequest::Write { page_id, buf, done } => {
                let ok = disk_manager.write_page(page_id, &buf[..]).is_ok();
                let _ = done.send(ok);
            }
        }
    }

    pub fn disk_manager(&self) -> &Arc<DiskManager> {
        &self.disk_manager
    }
}

impl Drop for DiskScheduler {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::SeqCst);
        if let Some(handle) = self.worker_handle.take() {
            let _ = handle.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    #[test]
    fn test_scheduler_read_write() {
        let temp_file = NamedTempFile::new().unwrap();
        let dm = Arc::new(DiskManager::new(temp_file.path()).unwrap());
        let scheduler = DiskScheduler::new(dm);

        let mut write_data = [0u8; PAGE_SIZE];
        write_data[0] = 42;
        write_data[100] = 255;
        scheduler
            .schedule_write_sync(PageId::new(0), &write_data)
            .unwrap();

        let mut read_data = [0u8; PAGE_SIZE];
        scheduler
            .schedule_read_sync(PageId::new(0), &mut read_data)
            .unwrap();

        assert_eq!(read_data[0], 42);
        assert_eq!(read_data[100], 255);
    }

    #[test]
    fn test_scheduler_many_requests() {
        let temp_file = NamedTempFile::new().unwrap();
        let dm = Arc::new(DiskManager::new(temp_file.path()).unwrap());
        let scheduler = DiskScheduler::new(dm);

        for i in 0..16u32 {
            let data = [i as u8; PAGE_SIZE];
            scheduler.schedule_write_sync(PageId::new(i), &data).unwrap();
        }
        for i in 0..16u32 {
            let mut data = [0u8; PAGE_SIZE];
            scheduler
                .schedule_read_sync(PageId::new(i), &mut data)
                .unwrap();
            assert_eq!(data[0], i as u8);
        }
    }
}
