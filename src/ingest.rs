//! Producer-facing side: turns upload payloads into frames

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use bytes::Bytes;
use serde_json::Value;
use tokio::time::Instant;
use tracing::{debug, instrument, warn};

use crate::error::{INVALID_PAYLOAD, NO_FRAME_FOUND};
use crate::{Enqueued, Frame, FrameBuffer, RelayError, Result};

/// Per-batch tally
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchReport {
    pub accepted: usize,
    /// Decoded but rejected by a full queue
    pub dropped: usize,
    /// Entries that were not a non-empty base64 string
    pub skipped: usize,
}

/// Forwards uploaded frames into the shared buffer and stamps their sequence.
#[derive(Clone)]
pub struct IngestionGateway {
    buffer: Arc<FrameBuffer>,
    /// Stamping counter only; frames reach viewers through `buffer` alone.
    next_sequence: Arc<AtomicU64>,
}

impl IngestionGateway {
    pub fn new(buffer: Arc<FrameBuffer>) -> Self {
        Self {
            buffer,
            next_sequence: Arc::new(AtomicU64::new(1)),
        }
    }

    pub fn buffer(&self) -> &Arc<FrameBuffer> {
        &self.buffer
    }

    fn stamp(&self, data: Bytes) -> Frame {
        Frame::new(data, self.next_sequence.fetch_add(1, Ordering::Relaxed))
    }

    /// Accept one raw frame. Empty payloads are refused untouched.
    #[instrument(skip_all, fields(bytes = data.len()))]
    pub async fn accept_single(&self, data: Bytes) -> Result<Enqueued> {
        if data.is_empty() {
            return Err(RelayError::InvalidPayload(NO_FRAME_FOUND));
        }
        let frame = self.stamp(data);
        let sequence = frame.sequence;
        let outcome = self.buffer.push(frame).await;
        debug!(sequence, ?outcome, "frame ingested");
        Ok(outcome)
    }

    /// Accept a JSON body of the form `{"frames": ["<base64>", ...]}`.
    ///
    /// The body is validated before anything is pushed. Bad entries are
    /// skipped one by one; the rest go into the buffer in list order.
    /// The whole batch shares one enqueue timeout: once it is spent, the
    /// remaining entries are admitted only if there is room right away.
    #[instrument(skip_all, fields(bytes = body.len()))]
    pub async fn accept_batch(&self, body: &[u8]) -> Result<BatchReport> {
        let entries = parse_batch(body)?;
        let mut report = BatchReport::default();
        let deadline = Instant::now() + self.buffer.enqueue_timeout();

        for (index, entry) in entries.iter().enumerate() {
            let Some(text) = entry.as_str() else {
                warn!(index, "skipping non-string batch entry");
                report.skipped += 1;
                continue;
            };
            let data = match decode_entry(index, text) {
                Ok(data) => data,
                Err(e) => {
                    warn!("skipping batch entry: {}", e);
                    report.skipped += 1;
                    continue;
                }
            };
            if data.is_empty() {
                warn!(index, "skipping empty batch entry");
                report.skipped += 1;
                continue;
            }

            let budget = deadline.saturating_duration_since(Instant::now());
            let frame = self.stamp(Bytes::from(data));
            match self.buffer.push_within(frame, budget).await {
                Enqueued::Accepted => report.accepted += 1,
                Enqueued::Dropped => report.dropped += 1,
            }
        }

        debug!(
            accepted = report.accepted,
            dropped = report.dropped,
            skipped = report.skipped,
            "batch ingested"
        );
        Ok(report)
    }
}

fn parse_batch(body: &[u8]) -> Result<Vec<Value>> {
    let mut payload: Value =
        serde_json::from_slice(body).map_err(|_| RelayError::InvalidPayload(INVALID_PAYLOAD))?;
    match payload.get_mut("frames").map(Value::take) {
        Some(Value::Array(entries)) => Ok(entries),
        _ => Err(RelayError::InvalidPayload(INVALID_PAYLOAD)),
    }
}

fn decode_entry(index: usize, text: &str) -> Result<Vec<u8>> {
    STANDARD
        .decode(text.trim())
        .map_err(|source| RelayError::Decode { index, source })
}
