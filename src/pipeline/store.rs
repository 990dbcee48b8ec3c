//! Latest-only frame slot

use std::sync::Arc;

use arc_swap::ArcSwapOption;
use crossbeam::utils::CachePadded;

use super::{BufferStats, Stats};
use crate::Frame;

/// Holds the most recent frame and nothing else.
///
/// Writers swap in a whole `Arc<Frame>`, so readers see either nothing or a
/// complete frame. Reads never remove the frame.
pub struct FrameStore {
    slot: ArcSwapOption<Frame>,
    stats: CachePadded<Stats>,
}

impl FrameStore {
    pub fn new() -> Self {
        Self {
            slot: ArcSwapOption::empty(),
            stats: CachePadded::new(Stats::default()),
        }
    }

    /// Producer: replace the stored frame
    pub fn put(&self, frame: Frame) {
        self.slot.store(Some(Arc::new(frame)));
        self.stats.written();
    }

    /// Consumer: current frame, `None` until the first `put`
    pub fn get(&self) -> Option<Arc<Frame>> {
        let frame = self.slot.load_full();
        if frame.is_some() {
            self.stats.read();
        }
        frame
    }

    /// Sequence of the stored frame, 0 while empty
    pub fn version(&self) -> u64 {
        match &*self.slot.load() {
            Some(frame) => frame.sequence,
            None => 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.slot.load().is_none()
    }

    pub fn stats(&self) -> BufferStats {
        self.stats.snapshot()
    }
}

impl Default for FrameStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_until_first_put() {
        let store = FrameStore::new();
        assert!(store.get().is_none());
        assert_eq!(store.version(), 0);
    }

    #[test]
    fn get_returns_most_recent_put() {
        let store = FrameStore::new();
        for seq in 1..=5u64 {
            store.put(Frame::new(vec![seq as u8], seq));
            let current = store.get().unwrap();
            assert_eq!(current.sequence, seq);
            assert_eq!(current.data.as_ref(), &[seq as u8]);
        }
        assert_eq!(store.version(), 5);
    }

    #[test]
    fn repeated_get_is_idempotent() {
        let store = FrameStore::new();
        store.put(Frame::new(&b"jpeg"[..], 1));

        let first = store.get().unwrap();
        let second = store.get().unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(store.stats().frames_read, 2);
    }

    #[test]
    fn concurrent_readers_never_see_partial_frames() {
        let store = Arc::new(FrameStore::new());
        let writer = {
            let store = Arc::clone(&store);
            std::thread::spawn(move || {
                for seq in 1..=1000u64 {
                    store.put(Frame::new(vec![(seq % 251) as u8; 64], seq));
                }
            })
        };

        let readers: Vec<_> = (0..4)
            .map(|_| {
                let store = Arc::clone(&store);
                std::thread::spawn(move || {
                    for _ in 0..1000 {
                        if let Some(frame) = store.get() {
                            let expected = (frame.sequence % 251) as u8;
                            assert_eq!(frame.len(), 64);
                            assert!(frame.data.iter().all(|&b| b == expected));
                        }
                    }
                })
            })
            .collect();

        writer.join().unwrap();
        for reader in readers {
            reader.join().unwrap();
        }
        assert_eq!(store.version(), 1000);
    }
}
