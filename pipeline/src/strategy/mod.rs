//! Converts the processor's surviving `Event<T>` stream into `Payload<T>`s
//! for the Sender, using one of two strategies.

pub(crate) mod batch;
pub(crate) mod stream;

use std::time::Duration;

/// How events are grouped before being handed to the Sender.
pub enum SendingStrategyConfig {
    /// Every surviving event becomes its own payload, immediately.
    Stream,
    /// Events accumulate until `buffer_limit_bytes` is reached or
    /// `flush_interval` elapses since the last flush, whichever is first.
    Batch {
        buffer_limit_bytes: usize,
        flush_interval: Duration,
    },
}
