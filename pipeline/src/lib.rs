//! A generic, concurrent event-processing pipeline: producers submit raw
//! events, which flow through an Adapter, a rule-based Processor, a
//! streaming or batching send strategy, and finally a Sender that writes
//! each resulting payload to a pluggable `Sink`.

mod adapter;
mod clock;
mod error;
mod event;
mod json;
mod metadata;
mod path;
mod payload;
mod pipeline;
mod processor;
mod rule;
mod sender;
mod sink;
mod strategy;

pub use clock::{Clock, ManualClock, Ticker, WallClock};
pub use error::PipelineError;
pub use event::{Event, RawEvent};
pub use metadata::{Metadata, Tags};
pub use payload::Payload;
pub use pipeline::{Pipeline, PipelineConfig, DEFAULT_FLUSH_TIMEOUT};
pub use rule::lookup::{LookupRule, LookupTable, LookupTableEntry};
pub use rule::{FnRule, Rule, RuleResult, RuleVariant};
pub use sender::DEFAULT_QUEUE_CAPACITY;
pub use sink::{stdout_sink, FileSink, Sink, SinkError, SinkResult, WriterSink};
pub use strategy::SendingStrategyConfig;
