//! Integration tests for the LRU-K replacer

use stratum::buffer::LruKReplacer;
use stratum::common::FrameId;

#[test]
fn test_eviction_order_single_access() {
    let replacer = LruKReplacer::new(10, 2);

    for i in 0..5 {
        replacer.record_access(FrameId::new(i)).unwrap();
        replacer.set_evictable(FrameId::new(i), true).unwrap();
    }
    assert_eq!(replacer.size(), 5);

    // All frames have fewer than k accesses (+inf distance), so eviction
    // falls back to earliest first access.
    for i in 0..5 {
        assert_eq!(replacer.evict(), Some(FrameId::new(i)));
    }
    assert_eq!(replacer.size(), 0);
    assert_eq!(replacer.evict(), None);
}

#[test]
fn test_classic_interleaved_scenario() {
    // Four frames, k = 2. Access 1, 2, 3, 4, 1, 2; frames 3 and 4 still
    // have a single access, so they leave first (by first access), then
    // frame 1 beats frame 2 on k-distance.
    let replacer = LruKReplacer::new(8, 2);

    for frame in [1u32, 2, 3, 4, 1, 2] {
        replacer.record_access(FrameId::new(frame)).unwrap();
    }
    for frame in 1..=4 {
        replacer.set_evictable(FrameId::new(frame), true).unwrap();
    }
    assert_eq!(replacer.size(), 4);

    assert_eq!(replacer.evict(), Some(FrameId::new(3)));
    assert_eq!(replacer.evict(), Some(FrameId::new(4)));
    assert_eq!(replacer.evict(), Some(FrameId::new(1)));
    assert_eq!(replacer.evict(), Some(FrameId::new(2)));
    assert_eq!(replacer.evict(), None);
}

#[test]
fn test_incomplete_history_has_priority() {
    let replacer = LruKReplacer::new(10, 2);

    // Frame 0 gets a full history, frame 1 stays short.
    replacer.record_access(FrameId::new(0)).unwrap();
    replacer.record_access(FrameId::new(0)).unwrap();
    replacer.record_access(FrameId::new(1)).unwrap();

    replacer.set_evictable(FrameId::new(0), true).unwrap();
    replacer.set_evictable(FrameId::new(1), true).unwrap();

    assert_eq!(replacer.evict(), Some(FrameId::new(1)));
    assert_eq!(replacer.evict(), Some(FrameId::new(0)));
}

#[test]
fn test_pinned_frames_are_skipped() {
    let replacer = LruKReplacer::new(10, 2);

    for i in 0..3 {
        replacer.record_access(FrameId::new(i)).unwrap();
    }
    replacer.set_evictable(FrameId::new(1), true).unwrap();
    replacer.set_evictable(FrameId::new(2), true).unwrap();

    assert_eq!(replacer.size(), 2);
    assert_eq!(replacer.evict(), Some(FrameId::new(1)));
    assert_eq!(replacer.evict(), Some(FrameId::new(2)));
    assert_eq!(replacer.evict(), None);
}

#[test]
fn test_access_while_pinned_counts_on_release() {
    // Accesses recorded while a frame is not evictable must order it
    // correctly once it becomes evictable again.
    let replacer = LruKReplacer::new(10, 2);

    replacer.record_access(FrameId::new(0)).unwrap();
    replacer.record_access(FrameId::new(0)).unwrap();
    replacer.record_access(FrameId::new(1)).unwrap();
    replacer.record_access(FrameId::new(1)).unwrap();

    // Frame 0 is reused (pinned) after frame 1.
    replacer.record_access(FrameId::new(0)).unwrap();
    replacer.record_access(FrameId::new(0)).unwrap();

    replacer.set_evictable(FrameId::new(0), true).unwrap();
    replacer.set_evictable(FrameId::new(1), true).unwrap();

    // Frame 1's k-th-last access is now older than frame 0's.
    assert_eq!(replacer.evict(), Some(FrameId::new(1)));
    assert_eq!(replacer.evict(), Some(FrameId::new(0)));
}

#[test]
fn test_toggle_and_remove() {
    let replacer = LruKReplacer::new(10, 2);

    replacer.record_access(FrameId::new(0)).unwrap();
    replacer.record_access(FrameId::new(1)).unwrap();
    replacer.set_evictable(FrameId::new(0), true).unwrap();
    replacer.set_evictable(FrameId::new(1), true).unwrap();
    assert_eq!(replacer.size(), 2);

    replacer.set_evictable(FrameId::new(0), false).unwrap();
    assert_eq!(replacer.size(), 1);

    replacer.remove(FrameId::new(1)).unwrap();
    assert_eq!(replacer.size(), 0);
    assert_eq!(replacer.evict(), None);

    // Frame 0 is still tracked and can come back.
    replacer.set_evictable(FrameId::new(0), true).unwrap();
    assert_eq!(replacer.evict(), Some(FrameId::new(0)));
}

#[test]
fn test_concurrent_record_and_evict() {
    use std::sync::Arc;
    use std::thread;

    let replacer = Arc::new(LruKReplacer::new(100, 2));

    let handles: Vec<_> = (0..4)
        .map(|t| {
            let replacer = Arc::clone(&replacer);
            thread::spawn(move || {
                for i in 0..25 {
                    let frame_id = FrameId::new((t * 25 + i) as u32);
                    replacer.record_access(frame_id).unwrap();
                    replacer.set_evictable(frame_id, true).unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(replacer.size(), 100);
    for _ in 0..100 {
        assert!(replacer.evict().is_some());
    }
    assert_eq!(replacer.size(), 0);
    assert_eq!(replacer.evict(), None);
}
