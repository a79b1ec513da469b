use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::error::PipelineError;
use crate::payload::Payload;
use crate::sink::{Sink, SinkResult};

/// The inbound queue's default capacity when a caller doesn't override it.
pub const DEFAULT_QUEUE_CAPACITY: usize = 100;

/// External handle for requesting a flush of the Sender stage.
#[derive(Clone)]
pub(crate) struct SenderHandle {
    flush_tx: mpsc::Sender<oneshot::Sender<()>>,
}

impl SenderHandle {
    pub(crate) async fn flush(&self, timeout: Duration) -> Result<(), PipelineError> {
        let (ack_tx, ack_rx) = oneshot::channel();
        tokio::time::timeout(timeout, async {
            self.flush_tx
                .send(ack_tx)
                .await
                .map_err(|_| PipelineError::FlushTimeout { stage: "sender" })?;
            ack_rx
                .await
                .map_err(|_| PipelineError::FlushTimeout { stage: "sender" })
        })
        .await
        .map_err(|_| PipelineError::FlushTimeout { stage: "sender" })?
    }
}

async fn write_one<T>(
    sink: &Arc<dyn Sink<T>>,
    payload: Payload<T>,
    result_tx: &Option<mpsc::Sender<SinkResult<T>>>,
) where
    T: Send + Sync + 'static,
{
    let error = sink.write(&payload).await.err();
    if let Some(err) = &error {
        tracing::error!(error = %err, "sender: sink write failed");
    }
    if let Some(result_tx) = result_tx {
        let _ = result_tx.send(SinkResult { payload, error }).await;
    }
}

/// The final stage: drains the bounded queue and writes each payload to the
/// sink, optionally reporting the outcome over `result_tx`. Exits once the
/// queue closes; does not close the sink itself (the orchestrator owns that,
/// since the sink may be shared or reused outside the pipeline's lifetime).
pub(crate) fn spawn_sender<T>(
    mut queue_rx: mpsc::Receiver<Payload<T>>,
    sink: Arc<dyn Sink<T>>,
    result_tx: Option<mpsc::Sender<SinkResult<T>>>,
) -> (JoinHandle<()>, SenderHandle)
where
    T: Send + Sync + 'static,
{
    let (flush_tx, mut flush_rx) = mpsc::channel::<oneshot::Sender<()>>(4);

    let handle = tokio::spawn(async move {
        loop {
            tokio::select! {
                biased;

                ack = flush_rx.recv() => {
                    let Some(ack) = ack else { continue };
                    if let Ok(payload) = queue_rx.try_recv() {
                        write_one(&sink, payload, &result_tx).await;
                    }
                    let _ = ack.send(());
                }

                payload = queue_rx.recv() => {
                    let Some(payload) = payload else { break };
                    write_one(&sink, payload, &result_tx).await;
                }
            }
        }
        tracing::debug!("sender: queue closed, stopping");
    });

    (handle, SenderHandle { flush_tx })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::Metadata;
    use async_trait::async_trait;
    use bytes::Bytes;
    use tokio::sync::Mutex as TokioMutex;

    struct BufferSink(TokioMutex<Vec<u8>>);

    #[async_trait]
    impl Sink<()> for BufferSink {
        async fn write(&self, payload: &Payload<()>) -> Result<(), crate::sink::SinkError> {
            self.0.lock().await.extend_from_slice(payload.bytes());
            Ok(())
        }

        async fn close(&self) -> Result<(), crate::sink::SinkError> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn writes_every_payload_to_the_sink() {
        let (queue_tx, queue_rx) = mpsc::channel(4);
        let sink = Arc::new(BufferSink(TokioMutex::new(Vec::new())));
        let (handle, _sh) = spawn_sender(queue_rx, sink.clone(), None);

        queue_tx
            .send(Payload::new(Arc::new(Metadata::default()), Bytes::from_static(b"a\n")))
            .await
            .unwrap();
        queue_tx
            .send(Payload::new(Arc::new(Metadata::default()), Bytes::from_static(b"b\n")))
            .await
            .unwrap();
        drop(queue_tx);
        handle.await.unwrap();

        assert_eq!(sink.0.lock().await.as_slice(), b"a\nb\n");
    }

    #[tokio::test]
    async fn reports_write_errors_on_the_result_channel() {
        struct FailingSink;
        #[async_trait]
        impl Sink<()> for FailingSink {
            async fn write(&self, _payload: &Payload<()>) -> Result<(), crate::sink::SinkError> {
                Err("boom".into())
            }
            async fn close(&self) -> Result<(), crate::sink::SinkError> {
                Ok(())
            }
        }

        let (queue_tx, queue_rx) = mpsc::channel(4);
        let (result_tx, mut result_rx) = mpsc::channel(4);
        let (handle, _sh) = spawn_sender(queue_rx, Arc::new(FailingSink), Some(result_tx));

        queue_tx
            .send(Payload::new(Arc::new(Metadata::default()), Bytes::from_static(b"x\n")))
            .await
            .unwrap();
        drop(queue_tx);

        let result = result_rx.recv().await.unwrap();
        assert!(result.error.is_some());
        handle.await.unwrap();
    }
}
