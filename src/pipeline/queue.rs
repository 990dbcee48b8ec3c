//! Bounded FIFO frame queue with drop-newest overflow

use std::time::Duration;

use crossbeam::utils::CachePadded;
use flume::{Receiver, Sender, TryRecvError, TrySendError};
use tracing::debug;

use super::{BufferStats, Enqueued, Stats};
use crate::{Frame, RelayError, Result};

/// Bounded MPMC queue of frames
///
/// Order of admission is order of delivery. When full, the incoming frame
/// is discarded; queued frames are never evicted.
pub struct FrameQueue {
    tx: Sender<Frame>,
    rx: Receiver<Frame>,
    capacity: usize,

    /// Statistics
    stats: CachePadded<Stats>,
}

impl FrameQueue {
    pub fn new(capacity: usize) -> Result<Self> {
        if capacity == 0 {
            return Err(RelayError::invalid_config("frame queue capacity must be at least 1"));
        }
        let (tx, rx) = flume::bounded(capacity);
        Ok(Self {
            tx,
            rx,
            capacity,
            stats: CachePadded::new(Stats::default()),
        })
    }

    /// Producer: append to the tail, waiting up to `timeout` for room
    pub async fn enqueue(&self, frame: Frame, timeout: Duration) -> Enqueued {
        let sequence = frame.sequence;
        let outcome = match self.tx.try_send(frame) {
            Ok(()) => Enqueued::Accepted,
            Err(TrySendError::Full(frame)) if !timeout.is_zero() => {
                match tokio::time::timeout(timeout, self.tx.send_async(frame)).await {
                    Ok(Ok(())) => Enqueued::Accepted,
                    _ => Enqueued::Dropped,
                }
            }
            Err(_) => Enqueued::Dropped,
        };

        match outcome {
            Enqueued::Accepted => self.stats.written(),
            Enqueued::Dropped => {
                self.stats.dropped();
                debug!(sequence, capacity = self.capacity, "queue full, dropping frame");
            }
        }
        outcome
    }

    /// Consumer: take the head frame, or `None` once `timeout` expires
    pub async fn dequeue(&self, timeout: Duration) -> Option<Frame> {
        let frame = match self.rx.try_recv() {
            Ok(frame) => Some(frame),
            Err(TryRecvError::Empty) if !timeout.is_zero() => {
                tokio::time::timeout(timeout, self.rx.recv_async())
                    .await
                    .ok()
                    .and_then(|received| received.ok())
            }
            Err(_) => None,
        };

        if frame.is_some() {
            self.stats.read();
        }
        frame
    }

    pub fn len(&self) -> usize {
        self.rx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn stats(&self) -> BufferStats {
        self.stats.snapshot()
    }
}
