use crate::sink::SinkError;

/// Errors surfaced by the pipeline's public operations.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("pipeline is not running")]
    Stopped,

    #[error("pipeline has already been stopped")]
    AlreadyStopped,

    #[error("flush of the {stage} stage timed out")]
    FlushTimeout { stage: &'static str },

    #[error("sink close failed")]
    SinkClose(#[source] SinkError),

    #[error("teardown encountered {} error(s)", .0.len())]
    Teardown(Vec<PipelineError>),
}
