use std::collections::HashMap;
use std::time::SystemTime;

/// String-to-string tags attached to an event. Keys are unique; insertion
/// order carries no meaning.
pub type Tags = HashMap<String, String>;

/// Metadata carried alongside an event's content. Never serialized — it is
/// pipeline-internal bookkeeping, not part of the wire form.
#[derive(Debug, Clone, Default)]
pub struct Metadata {
    pub tags: Tags,
    pub ingestion_time: Option<SystemTime>,
}
