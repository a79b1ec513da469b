use std::marker::PhantomData;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::Mutex;

use crate::payload::Payload;

/// Opaque error type for sink failures. Sinks wrap whatever underlying I/O
/// error they encounter; the pipeline only needs `Display` + `Error`.
pub type SinkError = Box<dyn std::error::Error + Send + Sync>;

/// A payload that failed (or succeeded) at the sink, reported back over the
/// optional result channel.
#[derive(Debug)]
pub struct SinkResult<T> {
    pub payload: Payload<T>,
    pub error: Option<SinkError>,
}

/// The pipeline's only externally-observable write boundary. Implementations
/// must be safe to call concurrently with `close` only ever called once, at
/// teardown.
#[async_trait]
pub trait Sink<T>: Send + Sync {
    async fn write(&self, payload: &Payload<T>) -> Result<(), SinkError>;
    async fn close(&self) -> Result<(), SinkError>;
}

/// Wraps any `AsyncWrite`. `close` flushes but does not shut the writer down,
/// matching a generic writer's lifetime usually being owned elsewhere.
pub struct WriterSink<T, W> {
    writer: Mutex<W>,
    _marker: PhantomData<fn() -> T>,
}

impl<T, W> WriterSink<T, W>
where
    W: AsyncWrite + Unpin + Send,
{
    pub fn new(writer: W) -> Self {
        Self {
            writer: Mutex::new(writer),
            _marker: PhantomData,
        }
    }
}

#[async_trait]
impl<T, W> Sink<T> for WriterSink<T, W>
where
    T: Send + Sync,
    W: AsyncWrite + Unpin + Send,
{
    async fn write(&self, payload: &Payload<T>) -> Result<(), SinkError> {
        let mut writer = self.writer.lock().await;
        writer.write_all(payload.bytes()).await?;
        Ok(())
    }

    async fn close(&self) -> Result<(), SinkError> {
        let mut writer = self.writer.lock().await;
        writer.flush().await?;
        Ok(())
    }
}

/// Append-mode file sink. Unlike `WriterSink`, `close` syncs the file to disk
/// and shuts the handle down, since the sink owns the file for its whole
/// lifetime.
pub struct FileSink<T> {
    file: Mutex<tokio::fs::File>,
    _marker: PhantomData<fn() -> T>,
}

impl<T> FileSink<T> {
    pub async fn create(path: impl AsRef<std::path::Path>) -> std::io::Result<Self> {
        let file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .await?;
        Ok(Self {
            file: Mutex::new(file),
            _marker: PhantomData,
        })
    }
}

#[async_trait]
impl<T> Sink<T> for FileSink<T>
where
    T: Send + Sync,
{
    async fn write(&self, payload: &Payload<T>) -> Result<(), SinkError> {
        let mut file = self.file.lock().await;
        file.write_all(payload.bytes()).await?;
        Ok(())
    }

    async fn close(&self) -> Result<(), SinkError> {
        let mut file = self.file.lock().await;
        file.sync_all().await?;
        file.shutdown().await?;
        Ok(())
    }
}

/// A sink writing to the process's standard output.
pub fn stdout_sink<T>() -> Arc<dyn Sink<T>>
where
    T: Send + Sync + 'static,
{
    Arc::new(WriterSink::new(tokio::io::stdout()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::Metadata;
    use bytes::Bytes;
    use std::sync::Arc as StdArc;

    #[tokio::test]
    async fn writer_sink_appends_bytes_and_flush_on_close_is_a_noop() {
        let buffer: Vec<u8> = Vec::new();
        let sink: WriterSink<(), Vec<u8>> = WriterSink::new(buffer);
        let payload = Payload::<()>::new(StdArc::new(Metadata::default()), Bytes::from_static(b"hello\n"));
        sink.write(&payload).await.unwrap();
        sink.close().await.unwrap();
    }

    #[tokio::test]
    async fn file_sink_creates_and_appends() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("events.log");
        let sink: FileSink<()> = FileSink::create(&path).await.unwrap();
        let payload = Payload::<()>::new(StdArc::new(Metadata::default()), Bytes::from_static(b"a\n"));
        sink.write(&payload).await.unwrap();
        sink.close().await.unwrap();

        let contents = tokio::fs::read(&path).await.unwrap();
        assert_eq!(contents, b"a\n");
    }
}
