use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::error::PipelineError;
use crate::event::Event;
use crate::rule::{evaluate_chain, Rule};

/// External handle for requesting a flush of the Processor stage.
#[derive(Clone)]
pub(crate) struct ProcessorHandle {
    flush_tx: mpsc::Sender<oneshot::Sender<()>>,
}

impl ProcessorHandle {
    /// Asks the processor to drain at most one already-buffered event ahead
    /// of schedule, then waits for the acknowledgement or `timeout`.
    pub(crate) async fn flush(&self, timeout: Duration) -> Result<(), PipelineError> {
        let (ack_tx, ack_rx) = oneshot::channel();
        tokio::time::timeout(timeout, async {
            self.flush_tx
                .send(ack_tx)
                .await
                .map_err(|_| PipelineError::FlushTimeout { stage: "processor" })?;
            ack_rx
                .await
                .map_err(|_| PipelineError::FlushTimeout { stage: "processor" })
        })
        .await
        .map_err(|_| PipelineError::FlushTimeout { stage: "processor" })?
    }
}

/// Runs the rule chain over every incoming event and forwards survivors.
/// Exits once `input_rx` closes, dropping `output_tx` to propagate closure
/// downstream.
pub(crate) fn spawn_processor<T>(
    rules: Vec<Box<dyn Rule<T>>>,
    mut input_rx: mpsc::Receiver<Event<T>>,
    output_tx: mpsc::Sender<Event<T>>,
) -> (JoinHandle<()>, ProcessorHandle)
where
    T: Send + 'static,
{
    let (flush_tx, mut flush_rx) = mpsc::channel::<oneshot::Sender<()>>(4);

    let handle = tokio::spawn(async move {
        loop {
            tokio::select! {
                biased;

                ack = flush_rx.recv() => {
                    let Some(ack) = ack else { continue };
                    if let Ok(event) = input_rx.try_recv() {
                        if let Some(surviving) = evaluate_chain(&rules, event) {
                            if output_tx.send(surviving).await.is_err() {
                                let _ = ack.send(());
                                break;
                            }
                        }
                    }
                    let _ = ack.send(());
                }

                event = input_rx.recv() => {
                    let Some(event) = event else { break };
                    if let Some(surviving) = evaluate_chain(&rules, event) {
                        if output_tx.send(surviving).await.is_err() {
                            break;
                        }
                    }
                }
            }
        }
        tracing::debug!("processor: input channel closed, stopping");
    });

    (handle, ProcessorHandle { flush_tx })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::RawEvent;
    use crate::rule::{FnRule, RuleResult, RuleVariant};

    #[tokio::test]
    async fn drops_filtered_events_and_forwards_survivors() {
        let rules: Vec<Box<dyn Rule<i32>>> = vec![Box::new(FnRule::new(
            RuleVariant::Filter,
            |evt: &mut Event<i32>| RuleResult::Filter {
                drop: *evt.content() < 0,
                reason: "negative".into(),
            },
        ))];
        let (input_tx, input_rx) = mpsc::channel(4);
        let (output_tx, mut output_rx) = mpsc::channel(4);
        let (handle, _ph) = spawn_processor(rules, input_rx, output_tx);

        input_tx.send(Event::new(RawEvent::new(-1))).await.unwrap();
        input_tx.send(Event::new(RawEvent::new(5))).await.unwrap();
        drop(input_tx);

        let surviving = output_rx.recv().await.unwrap();
        assert_eq!(surviving.content(), &5);
        assert!(output_rx.recv().await.is_none());
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn flush_acknowledges_even_with_nothing_buffered() {
        let (_input_tx, input_rx) = mpsc::channel::<Event<i32>>(4);
        let (output_tx, _output_rx) = mpsc::channel(4);
        let (_handle, ph) = spawn_processor(Vec::new(), input_rx, output_tx);

        ph.flush(Duration::from_millis(200)).await.unwrap();
    }
}
