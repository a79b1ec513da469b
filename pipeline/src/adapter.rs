use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::clock::Clock;
use crate::event::{Event, RawEvent};

/// Receives raw producer input, stamps a missing ingestion time, and
/// forwards the resulting `Event<T>` downstream. Exits once `raw_rx` closes,
/// after which it drops `event_tx`, propagating closure to the Processor.
pub(crate) fn spawn_adapter<T>(
    mut raw_rx: mpsc::Receiver<RawEvent<T>>,
    event_tx: mpsc::Sender<Event<T>>,
    clock: Arc<dyn Clock>,
) -> JoinHandle<()>
where
    T: Send + 'static,
{
    tokio::spawn(async move {
        while let Some(raw) = raw_rx.recv().await {
            let mut event = Event::new(raw);
            event.stamp_ingestion_time(clock.now());
            if event_tx.send(event).await.is_err() {
                tracing::debug!("adapter: downstream processor gone, stopping");
                break;
            }
        }
        tracing::debug!("adapter: ingest channel closed, stopping");
    })
}
