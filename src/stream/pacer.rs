//! Per-viewer pacing loop

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use tokio::sync::mpsc::{self, Receiver, Sender};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, info_span, Instrument};

use super::segment;
use crate::{FrameBuffer, RelayError, Result};

/// Drives one MJPEG stream per viewer at a capped rate.
///
/// Every tick reserves room in the viewer's single-segment body channel,
/// then pulls at most one frame from the shared buffer. A frame is only
/// taken from the buffer once there is a live slot to deliver it into, so
/// a slow or departed viewer never drains frames meant for others.
#[derive(Clone)]
pub struct StreamPacer {
    buffer: Arc<FrameBuffer>,
    interval: Duration,
    shutdown: CancellationToken,
}

impl StreamPacer {
    pub fn new(buffer: Arc<FrameBuffer>, interval: Duration, shutdown: CancellationToken) -> Self {
        Self {
            buffer,
            interval,
            shutdown,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Start a session task and return the receiving end of its segments.
    ///
    /// Dropping the receiver ends the session.
    pub fn spawn(&self, session: u64) -> Receiver<Bytes> {
        let (tx, rx) = mpsc::channel(1);
        let pacer = self.clone();
        tokio::spawn(
            async move {
                match pacer.run(tx).await {
                    Ok(()) => debug!("session stopped by shutdown"),
                    Err(e) => debug!("session ended: {}", e),
                }
            }
            .instrument(info_span!("session", id = session)),
        );
        rx
    }

    /// Run until the viewer goes away or shutdown is signalled.
    ///
    /// Returns `Ok` on shutdown and `Err(Disconnected)` when the body
    /// receiver has been dropped.
    pub async fn run(self, tx: Sender<Bytes>) -> Result<()> {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        metrics::gauge!("framerelay_stream_sessions_active").increment(1.0);
        info!(mode = ?self.buffer.mode(), interval = ?self.interval, "viewer connected");

        let outcome = loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => break Ok(()),
                _ = ticker.tick() => {}
            }

            let permit = tokio::select! {
                _ = self.shutdown.cancelled() => break Ok(()),
                permit = tx.reserve() => match permit {
                    Ok(permit) => permit,
                    Err(_) => break Err(RelayError::Disconnected),
                },
            };

            // The viewer may leave while a FIFO pull is waiting; stop
            // before a frame comes off the queue.
            let frame = tokio::select! {
                biased;
                _ = self.shutdown.cancelled() => break Ok(()),
                _ = tx.closed() => break Err(RelayError::Disconnected),
                frame = self.buffer.pull() => frame,
            };
            let Some(frame) = frame else {
                continue;
            };

            permit.send(segment::encode(&frame));
            metrics::counter!("framerelay_segments_sent_total").increment(1);
        };

        metrics::gauge!("framerelay_stream_sessions_active").decrement(1.0);
        info!("viewer stream closed");
        outcome
    }
}
