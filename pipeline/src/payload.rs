use std::marker::PhantomData;
use std::sync::Arc;

use bytes::Bytes;

use crate::metadata::Metadata;

/// A serialized, sink-ready unit: a metadata reference plus the encoded
/// bytes. Immutable after construction; `T` is phantom — it exists only so
/// a `Payload<T>` can only reach a `Sink<T>` built for the same content type.
#[derive(Debug, Clone)]
pub struct Payload<T> {
    pub(crate) metadata: Arc<Metadata>,
    pub(crate) bytes: Bytes,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Payload<T> {
    pub fn new(metadata: Arc<Metadata>, bytes: Bytes) -> Self {
        Self {
            metadata,
            bytes,
            _marker: PhantomData,
        }
    }

    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    pub fn bytes(&self) -> &Bytes {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}
