use std::collections::{BTreeMap, VecDeque};

use parking_lot::Mutex;

use crate::common::{FrameId, Result, StratumError, Timestamp};

/// Per-frame access bookkeeping. The deque keeps the last up-to-k access
/// timestamps with the most recent at the front, so the back is the k-th
/// most recent access once the history is full.
#[derive(Debug, Default)]
struct FrameHistory {
    accesses: VecDeque<Timestamp>,
    allocated: bool,
    evictable: bool,
}

#[derive(Debug)]
struct ReplacerState {
    current_timestamp: Timestamp,
    curr_size: usize,
    histories: Vec<FrameHistory>,
    /// Evictable frames with a full k-history, keyed by the k-th most
    /// recent access. The first entry has the largest backward k-distance.
    complete: BTreeMap<Timestamp, FrameId>,
    /// Evictable frames with fewer than k accesses (+inf k-distance),
    /// keyed by their first access.
    incomplete: BTreeMap<Timestamp, FrameId>,
}

/// LRU-K replacement policy.
///
/// Evicts the frame whose backward k-distance (current timestamp minus
/// the timestamp of its k-th most recent access) is largest. A frame with
/// fewer than k recorded accesses has +inf distance and takes priority;
/// ties among those are broken by earliest first access, i.e. classic LRU.
///
/// Only frames marked evictable participate. A frame that becomes
/// evictable enters the ordering keyed by whatever its k-th-last (or
/// first) access is at that moment.
pub struct LruKReplacer {
    k: usize,
    num_frames: usize,
    state: Mutex<ReplacerState>,
}

impl LruKReplacer {
    /// Creates a replacer tracking `num_frames` frames with parameter `k`.
    pub fn new(num_frames: usize, k: usize) -> Self {
        assert!(k >= 1, "k must be at least 1");
        let mut histories = Vec::with_capacity(num_frames);
        histories.resize_with(num_frames, FrameHistory::default);
        Self {
            k,
            num_frames,
            state: Mutex::new(ReplacerState {
                current_timestamp: 0,
                curr_size: 0,
                histories,
                complete: BTreeMap::new(),
                incomplete: BTreeMap::new(),
            }),
        }
    }

    /// Evicts the evictable frame with the largest backward k-distance.
    /// Returns None if no frame is evictable. The chosen frame's history
    /// is cleared and it leaves the replacer entirely.
    pub fn evict(&self) -> Option<FrameId> {
        let mut state = self.state.lock();
        if state.curr_size == 0 {
            return None;
        }
        let frame_id = if let Some((_, &frame_id)) = state.incomplete.iter().next() {
            frame_id
        } else {
            let (_, &frame_id) = state.complete.iter().next()?;
            frame_id
        };
        Self::remove_internal(&mut state, frame_id);
        Some(frame_id)
    }

    /// Records an access to the given frame at the next timestamp.
    pub fn record_access(&self, frame_id: FrameId) -> Result<()> {
        if frame_id.as_usize() >= self.num_frames {
            return Err(StratumError::InvalidFrameId(frame_id));
        }
        let mut state = self.state.lock();
        let timestamp = state.current_timestamp;
        state.current_timestamp += 1;

        let ReplacerState {
            histories,
            complete,
            incomplete,
            ..
        } = &mut *state;
        let hist = &mut histories[frame_id.as_usize()];
        if !hist.allocated {
            hist.allocated = true;
            hist.evictable = false;
        }
        hist.accesses.push_front(timestamp);

        if hist.evictable {
            if hist.accesses.len() > self.k {
                let stale = hist.accesses.pop_back().unwrap_or_default();
                complete.remove(&stale);
                if let Some(&back) = hist.accesses.back() {
                    complete.insert(back, frame_id);
                }
            } else if hist.accesses.len() == self.k {
                if let Some(&back) = hist.accesses.back() {
                    if hist.accesses.len() > 1 {
                        incomplete.remove(&back);
                    }
                    complete.insert(back, frame_id);
                }
            } else if let Some(&back) = hist.accesses.back() {
                incomplete.insert(back, frame_id);
            }
        } else if hist.accesses.len() > self.k {
            hist.accesses.pop_back();
        }
        Ok(())
    }

    /// Changes a frame's evictable flag, adjusting the replacer size and
    /// the eviction orderings. A frame unknown to the replacer is ignored.
    pub fn set_evictable(&self, frame_id: FrameId, evictable: bool) -> Result<()> {
        if frame_id.as_usize() >= self.num_frames {
            return Err(StratumError::InvalidFrameId(frame_id));
        }
        let mut state = self.state.lock();
        let ReplacerState {
            histories,
            complete,
            incomplete,
            curr_size,
            ..
        } = &mut *state;
        let hist = &mut histories[frame_id.as_usize()];
        if !hist.allocated {
            return Ok(());
        }
        if !hist.evictable && evictable {
            *curr_size += 1;
            if let Some(&back) = hist.accesses.back() {
                if hist.accesses.len() == self.k {
                    complete.insert(back, frame_id);
                } else {
                    incomplete.insert(back, frame_id);
                }
            }
            hist.evictable = true;
        } else if hist.evictable && !evictable {
            *curr_size -= 1;
            if let Some(&back) = hist.accesses.back() {
                complete.remove(&back);
                incomplete.remove(&back);
            }
            hist.evictable = false;
        }
        Ok(())
    }

    /// Removes an evictable frame from the replacer by id. Removing a
    /// frame the replacer does not know is a no-op; removing a pinned
    /// (non-evictable) frame is a caller contract violation.
    pub fn remove(&self, frame_id: FrameId) -> Result<()> {
        if frame_id.as_usize() >= self.num_frames {
            return Ok(());
        }
        let mut state = self.state.lock();
        let hist = &state.histories[frame_id.as_usize()];
        if !hist.allocated {
            return Ok(());
        }
        if !hist.evictable {
            return Err(StratumError::FrameNotEvictable(frame_id));
        }
        Self::remove_internal(&mut state, frame_id);
        Ok(())
    }

    fn remove_internal(state: &mut ReplacerState, frame_id: FrameId) {
        let ReplacerState {
            histories,
            complete,
            incomplete,
            curr_size,
            ..
        } = state;
        let hist = &mut histories[frame_id.as_usize()];
        if let Some(&back) = hist.accesses.back() {
            complete.remove(&back);
            incomplete.remove(&back);
        }
        hist.accesses.clear();
        hist.evictable = false;
        hist.allocated = false;
        *curr_size -= 1;
    }

    /// Returns the number of evictable frames.
    pub fn size(&self) -> usize {
        self.state.lock().curr_size
    }

    pub fn k(&self) -> usize {
        self.k
    }
}
