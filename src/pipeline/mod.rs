//! Shared frame buffers between ingestion and the viewer streams

pub mod queue;
pub mod store;

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use crate::{BufferMode, Frame, Result};

pub use queue::FrameQueue;
pub use store::FrameStore;

/// Outcome of handing a frame to a buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Enqueued {
    Accepted,
    /// Queue stayed full for the whole timeout; the new frame was discarded.
    Dropped,
}

/// Snapshot of buffer counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BufferStats {
    pub frames_written: u64,
    pub frames_read: u64,
    pub frames_dropped: u64,
}

#[derive(Default)]
pub(crate) struct Stats {
    frames_written: AtomicU64,
    frames_read: AtomicU64,
    frames_dropped: AtomicU64,
}

impl Stats {
    pub(crate) fn written(&self) {
        self.frames_written.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn read(&self) {
        self.frames_read.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn dropped(&self) {
        self.frames_dropped.fetch_add(1, Ordering::Relaxed);
        metrics::counter!("framerelay_frames_dropped_total").increment(1);
    }

    pub(crate) fn snapshot(&self) -> BufferStats {
        BufferStats {
            frames_written: self.frames_written.load(Ordering::Relaxed),
            frames_read: self.frames_read.load(Ordering::Relaxed),
            frames_dropped: self.frames_dropped.load(Ordering::Relaxed),
        }
    }
}

/// The process-wide buffer, chosen once at startup.
///
/// Producers call [`push`](Self::push), each viewer session calls
/// [`pull`](Self::pull) once per tick. Share it behind an `Arc`.
pub enum FrameBuffer {
    Latest(FrameStore),
    Fifo {
        queue: FrameQueue,
        enqueue_timeout: Duration,
        dequeue_timeout: Duration,
    },
}

impl FrameBuffer {
    pub fn latest() -> Self {
        FrameBuffer::Latest(FrameStore::new())
    }

    pub fn fifo(
        capacity: usize,
        enqueue_timeout: Duration,
        dequeue_timeout: Duration,
    ) -> Result<Self> {
        Ok(FrameBuffer::Fifo {
            queue: FrameQueue::new(capacity)?,
            enqueue_timeout,
            dequeue_timeout,
        })
    }

    pub fn mode(&self) -> BufferMode {
        match self {
            FrameBuffer::Latest(_) => BufferMode::Latest,
            FrameBuffer::Fifo { .. } => BufferMode::Fifo,
        }
    }

    /// How long a producer may wait on a full queue; zero for latest-only
    pub fn enqueue_timeout(&self) -> Duration {
        match self {
            FrameBuffer::Latest(_) => Duration::ZERO,
            FrameBuffer::Fifo {
                enqueue_timeout, ..
            } => *enqueue_timeout,
        }
    }

    /// Producer: hand over one frame
    pub async fn push(&self, frame: Frame) -> Enqueued {
        self.push_within(frame, self.enqueue_timeout()).await
    }

    /// Producer: hand over one frame, waiting at most `timeout` for room
    pub async fn push_within(&self, frame: Frame, timeout: Duration) -> Enqueued {
        match self {
            FrameBuffer::Latest(store) => {
                store.put(frame);
                Enqueued::Accepted
            }
            FrameBuffer::Fifo { queue, .. } => queue.enqueue(frame, timeout).await,
        }
    }

    /// Consumer: next frame to show, if any.
    ///
    /// Latest-only returns the stored frame without consuming it. FIFO
    /// removes the head, waiting up to the dequeue timeout.
    pub async fn pull(&self) -> Option<Frame> {
        match self {
            FrameBuffer::Latest(store) => store.get().map(|frame| (*frame).clone()),
            FrameBuffer::Fifo {
                queue,
                dequeue_timeout,
                ..
            } => queue.dequeue(*dequeue_timeout).await,
        }
    }

    /// Frames currently held
    pub fn len(&self) -> usize {
        match self {
            FrameBuffer::Latest(store) => usize::from(!store.is_empty()),
            FrameBuffer::Fifo { queue, .. } => queue.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> BufferStats {
        match self {
            FrameBuffer::Latest(store) => store.stats(),
            FrameBuffer::Fifo { queue, .. } => queue.stats(),
        }
    }
}
