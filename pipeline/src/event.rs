use std::time::SystemTime;

use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::json::encode_html_escaped;
use crate::metadata::{Metadata, Tags};

/// A user-supplied content value plus optional metadata, as submitted by a
/// producer. `None` metadata is equivalent to empty tags and an unset
/// ingestion time.
#[derive(Debug, Clone)]
pub struct RawEvent<T> {
    pub content: T,
    pub metadata: Option<Metadata>,
}

impl<T> RawEvent<T> {
    pub fn new(content: T) -> Self {
        Self {
            content,
            metadata: None,
        }
    }

    pub fn with_metadata(content: T, metadata: Metadata) -> Self {
        Self {
            content,
            metadata: Some(metadata),
        }
    }

    pub fn with_tags(content: T, tags: Tags) -> Self {
        Self::with_metadata(
            content,
            Metadata {
                tags,
                ingestion_time: None,
            },
        )
    }
}

/// The in-pipeline record: a content value plus metadata that is never
/// serialized onto the wire. Transform rules mutate the content in place;
/// the Adapter is the only stage allowed to fill in a missing ingestion time.
#[derive(Debug, Clone)]
pub struct Event<T> {
    metadata: Metadata,
    content: T,
}

impl<T> Event<T> {
    pub fn new(raw: RawEvent<T>) -> Self {
        let metadata = raw.metadata.unwrap_or_default();
        Self {
            metadata,
            content: raw.content,
        }
    }

    pub fn content(&self) -> &T {
        &self.content
    }

    pub fn content_mut(&mut self) -> &mut T {
        &mut self.content
    }

    pub fn into_content(self) -> T {
        self.content
    }

    pub fn set_content(&mut self, content: T) {
        self.content = content;
    }

    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    pub fn tags(&self) -> &Tags {
        &self.metadata.tags
    }

    pub fn ingestion_time(&self) -> Option<SystemTime> {
        self.metadata.ingestion_time
    }

    /// Fills the ingestion time iff it is unset. Called by the Adapter only.
    pub(crate) fn stamp_ingestion_time(&mut self, now: SystemTime) {
        if self.metadata.ingestion_time.is_none() {
            self.metadata.ingestion_time = Some(now);
        }
    }
}

impl<T: Serialize> Event<T> {
    /// The wire form: HTML-escaped JSON of the content only, newline-terminated.
    pub fn encode(&self) -> serde_json::Result<Bytes> {
        encode_html_escaped(&self.content)
    }
}

impl<T: DeserializeOwned> Event<T> {
    pub fn decode_content(data: &[u8]) -> serde_json::Result<T> {
        serde_json::from_slice(data)
    }
}
