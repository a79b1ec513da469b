use std::sync::Arc;
use std::time::Duration;

use bytes::{BufMut, BytesMut};
use serde::Serialize;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;

use crate::clock::Clock;
use crate::error::PipelineError;
use crate::event::Event;
use crate::metadata::Metadata;
use crate::payload::Payload;

/// Accumulates encoded events until `limit_bytes` is reached.
struct PayloadBuffer {
    bytes: BytesMut,
    limit_bytes: usize,
}

impl PayloadBuffer {
    fn new(limit_bytes: usize) -> Self {
        Self {
            bytes: BytesMut::new(),
            limit_bytes,
        }
    }

    fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Appends `encoded` if it fits within `limit_bytes`. Returns it back on
    /// refusal so the caller can flush and retry without cloning on the
    /// common (accepted) path. A single message larger than `limit_bytes`
    /// is always refused, even against an empty buffer.
    fn add(&mut self, encoded: bytes::Bytes) -> Result<(), bytes::Bytes> {
        if self.bytes.len() + encoded.len() > self.limit_bytes {
            return Err(encoded);
        }
        self.bytes.put(encoded.as_ref());
        Ok(())
    }

    fn take<T>(&mut self) -> Option<Payload<T>> {
        if self.is_empty() {
            return None;
        }
        let bytes = std::mem::take(&mut self.bytes).freeze();
        Some(Payload::new(Arc::new(Metadata::default()), bytes))
    }
}

/// External handle for requesting a forced flush of the batch strategy
/// stage, following the two-channel pattern: a non-blocking request send
/// and a dedicated, mutex-serialized acknowledgement receiver.
#[derive(Clone)]
pub(crate) struct BatchHandle {
    force_flush_tx: mpsc::Sender<()>,
    force_flush_done_rx: Arc<Mutex<mpsc::Receiver<()>>>,
}

impl BatchHandle {
    pub(crate) async fn flush(&self, timeout: Duration) -> Result<(), PipelineError> {
        tokio::time::timeout(timeout, async {
            if self.force_flush_tx.try_send(()).is_err() {
                // A flush is already pending; fall through and wait for its ack.
            }
            let mut done_rx = self.force_flush_done_rx.lock().await;
            done_rx
                .recv()
                .await
                .ok_or(PipelineError::FlushTimeout { stage: "batch strategy" })
        })
        .await
        .map_err(|_| PipelineError::FlushTimeout { stage: "batch strategy" })?
    }
}

/// Groups surviving events into size- or time-bounded payloads.
pub(crate) fn spawn_batch_strategy<T>(
    mut input_rx: mpsc::Receiver<Event<T>>,
    output_tx: mpsc::Sender<Payload<T>>,
    buffer_limit_bytes: usize,
    flush_interval: Duration,
    clock: Arc<dyn Clock>,
) -> (JoinHandle<()>, BatchHandle)
where
    T: Serialize + Send + 'static,
{
    let (force_flush_tx, mut force_flush_rx) = mpsc::channel::<()>(1);
    let (force_flush_done_tx, force_flush_done_rx) = mpsc::channel::<()>(1);

    let handle = tokio::spawn(async move {
        let mut buffer = PayloadBuffer::new(buffer_limit_bytes);
        let mut ticker = clock.ticker(flush_interval);

        macro_rules! flush_buffer {
            () => {
                if let Some(payload) = buffer.take::<T>() {
                    if output_tx.send(payload).await.is_err() {
                        break;
                    }
                }
            };
        }

        loop {
            tokio::select! {
                biased;

                forced = force_flush_rx.recv() => {
                    if forced.is_none() { continue }
                    flush_buffer!();
                    let _ = force_flush_done_tx.try_send(());
                }

                _ = ticker.tick() => {
                    flush_buffer!();
                }

                event = input_rx.recv() => {
                    let Some(event) = event else { break };
                    let encoded = match event.encode() {
                        Ok(bytes) => bytes,
                        Err(err) => {
                            tracing::error!(error = %err, "batch strategy: failed to encode event, dropping");
                            continue;
                        }
                    };
                    if let Err(rejected) = buffer.add(encoded) {
                        flush_buffer!();
                        if let Err(oversized) = buffer.add(rejected) {
                            tracing::warn!(
                                size = oversized.len(),
                                limit = buffer_limit_bytes,
                                "batch strategy: single message exceeds buffer limit, dropping"
                            );
                        }
                    }
                }
            }
        }

        ticker.stop();
        flush_buffer!();
        tracing::debug!("batch strategy: input channel closed, stopping");
    });

    (
        handle,
        BatchHandle {
            force_flush_tx,
            force_flush_done_rx: Arc::new(Mutex::new(force_flush_done_rx)),
        },
    )
}
