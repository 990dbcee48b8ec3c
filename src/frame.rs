use std::time::Instant;

use bytes::Bytes;

/// One encoded image as pushed by the producer.
///
/// The payload is never inspected or mutated; cloning shares the buffer.
#[derive(Debug, Clone)]
pub struct Frame {
    /// Encoded image bytes (JPEG in practice)
    pub data: Bytes,

    /// Admission order, starting at 1. Doubles as the latest slot's version.
    pub sequence: u64,

    /// When the gateway accepted the frame
    pub received_at: Instant,
}

impl Frame {
    pub fn new(data: impl Into<Bytes>, sequence: u64) -> Self {
        Self {
            data: data.into(),
            sequence,
            received_at: Instant::now(),
        }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}
