use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::error::PipelineError;
use crate::event::Event;
use crate::payload::Payload;

/// External handle for requesting a flush of the stream strategy stage.
#[derive(Clone)]
pub(crate) struct StreamHandle {
    flush_tx: mpsc::Sender<oneshot::Sender<()>>,
}

impl StreamHandle {
    pub(crate) async fn flush(&self, timeout: Duration) -> Result<(), PipelineError> {
        let (ack_tx, ack_rx) = oneshot::channel();
        tokio::time::timeout(timeout, async {
            self.flush_tx
                .send(ack_tx)
                .await
                .map_err(|_| PipelineError::FlushTimeout { stage: "stream strategy" })?;
            ack_rx
                .await
                .map_err(|_| PipelineError::FlushTimeout { stage: "stream strategy" })
        })
        .await
        .map_err(|_| PipelineError::FlushTimeout { stage: "stream strategy" })?
    }
}

fn to_payload<T: Serialize>(event: &Event<T>) -> Option<Payload<T>> {
    match event.encode() {
        Ok(bytes) => Some(Payload::new(Arc::new(event.metadata().clone()), bytes)),
        Err(err) => {
            tracing::error!(error = %err, "stream strategy: failed to encode event, dropping");
            None
        }
    }
}

/// Turns every surviving event into its own payload immediately.
pub(crate) fn spawn_stream_strategy<T>(
    mut input_rx: mpsc::Receiver<Event<T>>,
    output_tx: mpsc::Sender<Payload<T>>,
) -> (JoinHandle<()>, StreamHandle)
where
    T: Serialize + Send + 'static,
{
    let (flush_tx, mut flush_rx) = mpsc::channel::<oneshot::Sender<()>>(4);

    let handle = tokio::spawn(async move {
        loop {
            tokio::select! {
                biased;

                ack = flush_rx.recv() => {
                    let Some(ack) = ack else { continue };
                    if let Ok(event) = input_rx.try_recv() {
                        if let Some(payload) = to_payload(&event) {
                            if output_tx.send(payload).await.is_err() {
                                let _ = ack.send(());
                                break;
                            }
                        }
                    }
                    let _ = ack.send(());
                }

                event = input_rx.recv() => {
                    let Some(event) = event else { break };
                    if let Some(payload) = to_payload(&event) {
                        if output_tx.send(payload).await.is_err() {
                            break;
                        }
                    }
                }
            }
        }
        tracing::debug!("stream strategy: input channel closed, stopping");
    });

    (handle, StreamHandle { flush_tx })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::RawEvent;
    use serde::Serialize;

    #[derive(Serialize, Clone)]
    struct Msg(u32);

    #[tokio::test]
    async fn every_event_becomes_its_own_payload() {
        let (input_tx, input_rx) = mpsc::channel(4);
        let (output_tx, mut output_rx) = mpsc::channel(4);
        let (handle, _sh) = spawn_stream_strategy(input_rx, output_tx);

        input_tx.send(Event::new(RawEvent::new(Msg(1)))).await.unwrap();
        input_tx.send(Event::new(RawEvent::new(Msg(2)))).await.unwrap();
        drop(input_tx);

        let first = output_rx.recv().await.unwrap();
        assert_eq!(first.bytes().as_ref(), b"1\n");
        let second = output_rx.recv().await.unwrap();
        assert_eq!(second.bytes().as_ref(), b"2\n");
        assert!(output_rx.recv().await.is_none());
        handle.await.unwrap();
    }
}
