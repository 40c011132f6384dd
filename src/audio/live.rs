use super::segmenter::AudioChunk;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// What the producer does when the session lags behind capture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BackpressurePolicy {
    /// Wait for queue capacity
    #[default]
    Block,
    /// Discard the incoming buffer while the queue is full
    DropNewest,
}

/// Result of handing a buffer to the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushOutcome {
    Queued,
    Dropped,
    /// The session stopped consuming audio
    Closed,
}

/// Create a bounded producer/consumer pair for live audio.
///
/// End-of-stream is signalled by dropping every [`AudioProducer`].
pub fn live_channel(capacity: usize, policy: BackpressurePolicy) -> (AudioProducer, LiveSegmenter) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    let producer = AudioProducer {
        tx,
        policy,
        dropped: Arc::new(AtomicU64::new(0)),
    };
    let segmenter = LiveSegmenter {
        rx,
        next_index: 0,
        finished: false,
    };
    (producer, segmenter)
}

/// Capture side of a live stream.
#[derive(Debug, Clone)]
pub struct AudioProducer {
    tx: mpsc::Sender<Vec<u8>>,
    policy: BackpressurePolicy,
    dropped: Arc<AtomicU64>,
}

impl AudioProducer {
    pub async fn push(&self, buffer: Vec<u8>) -> PushOutcome {
        match self.policy {
            BackpressurePolicy::Block => match self.tx.send(buffer).await {
                Ok(()) => PushOutcome::Queued,
                Err(_) => PushOutcome::Closed,
            },
            BackpressurePolicy::DropNewest => match self.tx.try_send(buffer) {
                Ok(()) => PushOutcome::Queued,
                Err(mpsc::error::TrySendError::Full(buffer)) => {
                    let total = self.dropped.fetch_add(1, Ordering::SeqCst) + 1;
                    warn!(
                        "Audio queue full, dropped {} bytes (total dropped buffers: {})",
                        buffer.len(),
                        total
                    );
                    PushOutcome::Dropped
                }
                Err(mpsc::error::TrySendError::Closed(_)) => PushOutcome::Closed,
            },
        }
    }

    /// Buffers discarded under [`BackpressurePolicy::DropNewest`].
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::SeqCst)
    }

    pub fn policy(&self) -> BackpressurePolicy {
        self.policy
    }
}

/// Session side of a live stream: tags buffers with increasing indexes.
#[derive(Debug)]
pub struct LiveSegmenter {
    rx: mpsc::Receiver<Vec<u8>>,
    next_index: u64,
    finished: bool,
}

impl LiveSegmenter {
    /// Next chunk, waiting for capture if necessary.
    ///
    /// Once the producers are gone a single empty terminal chunk is
    /// returned, then `None`.
    pub async fn next_chunk(&mut self) -> Option<AudioChunk> {
        if self.finished {
            return None;
        }

        // recv is cancel-safe; the index only advances once a buffer arrives
        let received = self.rx.recv().await;
        let index = self.next_index;
        self.next_index += 1;

        match received {
            Some(data) => Some(AudioChunk {
                index,
                data,
                is_last: false,
            }),
            None => {
                debug!("Live audio ended after {} buffers", index);
                self.finished = true;
                Some(AudioChunk {
                    index,
                    data: Vec::new(),
                    is_last: true,
                })
            }
        }
    }

    /// Stop accepting audio; buffered chunks can still be drained.
    pub fn close(&mut self) {
        self.rx.close();
    }
}
