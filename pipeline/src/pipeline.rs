use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;

use crate::adapter::spawn_adapter;
use crate::clock::{Clock, WallClock};
use crate::error::PipelineError;
use crate::event::RawEvent;
use crate::processor::{spawn_processor, ProcessorHandle};
use crate::rule::Rule;
use crate::sender::{spawn_sender, SenderHandle, DEFAULT_QUEUE_CAPACITY};
use crate::sink::{Sink, SinkResult};
use crate::strategy::batch::{spawn_batch_strategy, BatchHandle};
use crate::strategy::stream::{spawn_stream_strategy, StreamHandle};
use crate::strategy::SendingStrategyConfig;

/// The default deadline a `flush`/`stop` step waits before giving up on a
/// single stage's acknowledgement.
pub const DEFAULT_FLUSH_TIMEOUT: Duration = Duration::from_secs(30);

/// How surviving events are converted to payloads. An internal mirror of
/// `SendingStrategyConfig` that also carries the running stage's flush
/// handle, once started.
enum StrategyHandle {
    Stream(StreamHandle),
    Batch(BatchHandle),
}

impl StrategyHandle {
    async fn flush(&self, timeout: Duration) -> Result<(), PipelineError> {
        match self {
            StrategyHandle::Stream(h) => h.flush(timeout).await,
            StrategyHandle::Batch(h) => h.flush(timeout).await,
        }
    }
}

/// Builder for a pipeline's fixed configuration. Construct with `new`, chain
/// `with_*` calls, then hand to `Pipeline::new`.
pub struct PipelineConfig<T> {
    rules: Vec<Box<dyn Rule<T>>>,
    sink: Arc<dyn Sink<T>>,
    result_tx: Option<mpsc::Sender<SinkResult<T>>>,
    sending_strategy: SendingStrategyConfig,
    clock: Arc<dyn Clock>,
    queue_capacity: usize,
}

impl<T> PipelineConfig<T>
where
    T: Send + Sync + 'static,
{
    pub fn new(sink: Arc<dyn Sink<T>>) -> Self {
        Self {
            rules: Vec::new(),
            sink,
            result_tx: None,
            sending_strategy: SendingStrategyConfig::Stream,
            clock: Arc::new(WallClock),
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
        }
    }

    pub fn with_rules(mut self, rules: Vec<Box<dyn Rule<T>>>) -> Self {
        self.rules = rules;
        self
    }

    pub fn with_result_channel(mut self, result_tx: mpsc::Sender<SinkResult<T>>) -> Self {
        self.result_tx = Some(result_tx);
        self
    }

    pub fn with_sending_strategy(mut self, strategy: SendingStrategyConfig) -> Self {
        self.sending_strategy = strategy;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity;
        self
    }
}

struct Running<T> {
    raw_tx: mpsc::Sender<RawEvent<T>>,
    adapter_handle: JoinHandle<()>,
    processor_handle: JoinHandle<()>,
    processor_flush: ProcessorHandle,
    strategy_handle: JoinHandle<()>,
    strategy_flush: StrategyHandle,
    sender_handle: JoinHandle<()>,
    sender_flush: SenderHandle,
    sink: Arc<dyn Sink<T>>,
}

enum State<T> {
    Idle(PipelineConfig<T>),
    Running(Running<T>),
    Stopped,
}

/// A running (or not yet started) event pipeline: Adapter → Processor →
/// Strategy → Sender. One `write` call per event; `start`/`stop` bracket the
/// pipeline's lifetime, `flush` nudges every stage to drain ahead of
/// schedule without tearing anything down.
pub struct Pipeline<T> {
    state: Mutex<Option<State<T>>>,
}

impl<T> Pipeline<T>
where
    T: Serialize + DeserializeOwned + Send + Sync + 'static,
{
    pub fn new(config: PipelineConfig<T>) -> Self {
        Self {
            state: Mutex::new(Some(State::Idle(config))),
        }
    }

    /// Spawns every stage and wires the channels between them. Panics if
    /// called more than once on the same pipeline.
    pub async fn start(&self) {
        let mut guard = self.state.lock().await;
        let config = match guard.take() {
            Some(State::Idle(config)) => config,
            Some(other) => {
                *guard = Some(other);
                panic!("pipeline already started");
            }
            None => panic!("pipeline already started"),
        };

        let (raw_tx, raw_rx) = mpsc::channel::<RawEvent<T>>(1);
        let (event_tx, event_rx) = mpsc::channel(1);
        let (strategy_in_tx, strategy_in_rx) = mpsc::channel(1);
        let (payload_tx, payload_rx) = mpsc::channel(config.queue_capacity);

        let adapter_handle = spawn_adapter(raw_rx, event_tx, config.clock.clone());
        let (processor_handle, processor_flush) =
            spawn_processor(config.rules, event_rx, strategy_in_tx);

        let (strategy_handle, strategy_flush) = match config.sending_strategy {
            SendingStrategyConfig::Stream => {
                let (h, flush) = spawn_stream_strategy(strategy_in_rx, payload_tx);
                (h, StrategyHandle::Stream(flush))
            }
            SendingStrategyConfig::Batch {
                buffer_limit_bytes,
                flush_interval,
            } => {
                let (h, flush) = spawn_batch_strategy(
                    strategy_in_rx,
                    payload_tx,
                    buffer_limit_bytes,
                    flush_interval,
                    config.clock.clone(),
                );
                (h, StrategyHandle::Batch(flush))
            }
        };

        let (sender_handle, sender_flush) =
            spawn_sender(payload_rx, config.sink.clone(), config.result_tx);

        *guard = Some(State::Running(Running {
            raw_tx,
            adapter_handle,
            processor_handle,
            processor_flush,
            strategy_handle,
            strategy_flush,
            sender_handle,
            sender_flush,
            sink: config.sink,
        }));
    }

    /// Submits a raw event to the pipeline. Holds the state lock for the
    /// duration of the send, serializing concurrent writers through the
    /// ingest channel, as the pipeline offers no other backpressure signal.
    pub async fn write(&self, raw: RawEvent<T>) -> Result<(), PipelineError> {
        let guard = self.state.lock().await;
        match guard.as_ref() {
            Some(State::Running(running)) => running
                .raw_tx
                .send(raw)
                .await
                .map_err(|_| PipelineError::Stopped),
            _ => Err(PipelineError::Stopped),
        }
    }

    /// Nudges every stage to drain one step ahead of schedule without
    /// tearing the pipeline down.
    pub async fn flush(&self) -> Result<(), PipelineError> {
        self.flush_with_timeout(DEFAULT_FLUSH_TIMEOUT).await
    }

    pub async fn flush_with_timeout(&self, timeout: Duration) -> Result<(), PipelineError> {
        let guard = self.state.lock().await;
        match guard.as_ref() {
            Some(State::Running(running)) => {
                running.processor_flush.flush(timeout).await?;
                running.strategy_flush.flush(timeout).await?;
                running.sender_flush.flush(timeout).await
            }
            _ => Err(PipelineError::Stopped),
        }
    }

    /// Tears the pipeline down: flushes every stage, closes each channel hop
    /// in order, awaits every stage's task, and closes the sink. Every step
    /// runs regardless of earlier failures; their errors are aggregated.
    pub async fn stop(&self) -> Result<(), PipelineError> {
        self.stop_with_timeout(DEFAULT_FLUSH_TIMEOUT).await
    }

    pub async fn stop_with_timeout(&self, timeout: Duration) -> Result<(), PipelineError> {
        let mut guard = self.state.lock().await;
        let running = match guard.take() {
            Some(State::Running(running)) => running,
            Some(State::Idle(_)) => {
                *guard = Some(State::Stopped);
                return Err(PipelineError::Stopped);
            }
            Some(State::Stopped) | None => {
                *guard = Some(State::Stopped);
                return Err(PipelineError::AlreadyStopped);
            }
        };

        let mut errors = Vec::new();

        if let Err(err) = running.processor_flush.flush(timeout).await {
            errors.push(err);
        }
        if let Err(err) = running.strategy_flush.flush(timeout).await {
            errors.push(err);
        }
        if let Err(err) = running.sender_flush.flush(timeout).await {
            errors.push(err);
        }

        drop(running.raw_tx);
        if let Err(err) = running.adapter_handle.await {
            tracing::error!(error = %err, "adapter task panicked");
        }
        if let Err(err) = running.processor_handle.await {
            tracing::error!(error = %err, "processor task panicked");
        }
        if let Err(err) = running.strategy_handle.await {
            tracing::error!(error = %err, "strategy task panicked");
        }
        if let Err(err) = running.sender_handle.await {
            tracing::error!(error = %err, "sender task panicked");
        }

        if let Err(err) = running.sink.close().await {
            errors.push(PipelineError::SinkClose(err));
        }

        *guard = Some(State::Stopped);

        if errors.is_empty() {
            Ok(())
        } else {
            Err(PipelineError::Teardown(errors))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rule::{FnRule, RuleResult, RuleVariant};
    use crate::sink::Sink;
    use async_trait::async_trait;
    use bytes::Bytes;
    use serde::{Deserialize, Serialize};

    #[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
    struct Msg {
        n: u32,
    }

    struct BufferSink(tokio::sync::Mutex<Vec<Bytes>>);

    #[async_trait]
    impl Sink<Msg> for BufferSink {
        async fn write(&self, payload: &crate::payload::Payload<Msg>) -> Result<(), crate::sink::SinkError> {
            self.0.lock().await.push(payload.bytes().clone());
            Ok(())
        }
        async fn close(&self) -> Result<(), crate::sink::SinkError> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn stream_pipeline_delivers_every_event_to_the_sink() {
        let sink = Arc::new(BufferSink(tokio::sync::Mutex::new(Vec::new())));
        let config = PipelineConfig::new(sink.clone() as Arc<dyn Sink<Msg>>);
        let pipeline = Pipeline::new(config);
        pipeline.start().await;

        pipeline.write(RawEvent::new(Msg { n: 1 })).await.unwrap();
        pipeline.write(RawEvent::new(Msg { n: 2 })).await.unwrap();

        pipeline.stop().await.unwrap();

        let written = sink.0.lock().await;
        assert_eq!(written.len(), 2);
        assert_eq!(written[0].as_ref(), b"{\"n\":1}\n");
    }

    #[tokio::test]
    async fn dropped_events_never_reach_the_sink() {
        let sink = Arc::new(BufferSink(tokio::sync::Mutex::new(Vec::new())));
        let rules: Vec<Box<dyn Rule<Msg>>> = vec![Box::new(FnRule::new(
            RuleVariant::Filter,
            |evt: &mut crate::event::Event<Msg>| RuleResult::Filter {
                drop: evt.content().n % 2 == 0,
                reason: "even".into(),
            },
        ))];
        let config = PipelineConfig::new(sink.clone() as Arc<dyn Sink<Msg>>).with_rules(rules);
        let pipeline = Pipeline::new(config);
        pipeline.start().await;

        pipeline.write(RawEvent::new(Msg { n: 1 })).await.unwrap();
        pipeline.write(RawEvent::new(Msg { n: 2 })).await.unwrap();

        pipeline.stop().await.unwrap();

        let written = sink.0.lock().await;
        assert_eq!(written.len(), 1);
        assert_eq!(written[0].as_ref(), b"{\"n\":1}\n");
    }

    #[tokio::test]
    async fn write_after_stop_fails() {
        let sink = Arc::new(BufferSink(tokio::sync::Mutex::new(Vec::new())));
        let config = PipelineConfig::new(sink as Arc<dyn Sink<Msg>>);
        let pipeline = Pipeline::new(config);
        pipeline.start().await;
        pipeline.stop().await.unwrap();

        let result = pipeline.write(RawEvent::new(Msg { n: 1 })).await;
        assert!(matches!(result, Err(PipelineError::Stopped)));
    }

    #[tokio::test]
    #[should_panic(expected = "already started")]
    async fn start_twice_panics() {
        let sink = Arc::new(BufferSink(tokio::sync::Mutex::new(Vec::new())));
        let config = PipelineConfig::new(sink as Arc<dyn Sink<Msg>>);
        let pipeline = Pipeline::new(config);
        pipeline.start().await;
        pipeline.start().await;
    }
}
