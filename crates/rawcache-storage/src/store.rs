//! Object store trait definition.

use std::fmt;

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use futures::stream::{self, BoxStream, StreamExt};
use rawcache_core::Meta;

use crate::error::StoreError;

/// Streaming body of a stored object.
pub type ObjectBody = BoxStream<'static, std::io::Result<Bytes>>;

/// A stored object opened for reading.
pub struct StoredObject {
    /// The body, streamed from the backend.
    pub body: ObjectBody,
    /// Size of the body in bytes.
    pub size: u64,
    /// Content-Type recorded when the object was written.
    pub content_type: Option<String>,
    /// Backend-assigned ETag, if the backend tracks one.
    pub etag: Option<String>,
    /// Last-Modified as an HTTP date, if the backend tracks one.
    pub last_modified: Option<String>,
}

impl StoredObject {
    /// Wraps an in-memory buffer as a stored object.
    pub fn from_bytes(data: Bytes, content_type: Option<String>) -> Self {
        let size = data.len() as u64;
        Self {
            body: stream::once(async move { Ok(data) }).boxed(),
            size,
            content_type,
            etag: None,
            last_modified: None,
        }
    }

    /// Reads the whole body into memory.
    pub async fn into_bytes(mut self) -> std::io::Result<Bytes> {
        let mut buf = BytesMut::with_capacity(self.size as usize);
        while let Some(chunk) = self.body.next().await {
            buf.extend_from_slice(&chunk?);
        }
        Ok(buf.freeze())
    }
}

impl fmt::Debug for StoredObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoredObject")
            .field("size", &self.size)
            .field("content_type", &self.content_type)
            .field("etag", &self.etag)
            .field("last_modified", &self.last_modified)
            .finish_non_exhaustive()
    }
}

/// A key/value store of body blobs and JSON metadata records.
///
/// Implementations must be cheap to share across tasks and must keep
/// "not found" distinguishable from every other failure.
///
/// # Implementors
///
/// - `S3Store` - S3-compatible bucket
/// - `FsStore` - local directory
/// - `MemoryStore` - in-process map
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Returns whether a body exists under `key`.
    ///
    /// Absence is `Ok(false)`, never an error.
    async fn exists(&self, key: &str) -> Result<bool, StoreError>;

    /// Opens the body stored under `key`.
    ///
    /// # Errors
    ///
    /// - `StoreError::NotFound` if nothing is stored under `key`
    /// - any other variant if the backend failed
    async fn get(&self, key: &str) -> Result<StoredObject, StoreError>;

    /// Writes a body under `key`, replacing any previous one.
    async fn put(
        &self,
        key: &str,
        data: Bytes,
        content_type: Option<&str>,
    ) -> Result<(), StoreError>;

    /// Reads the metadata record stored under `key`.
    ///
    /// Returns `Ok(None)` when the record is absent or is not valid JSON.
    async fn get_meta(&self, key: &str) -> Result<Option<Meta>, StoreError>;

    /// Writes (overwrites) the metadata record under `key`.
    async fn put_meta(&self, key: &str, meta: &Meta) -> Result<(), StoreError>;

    /// Verifies the backend is reachable.
    async fn ping(&self) -> Result<(), StoreError>;

    /// Returns the backend name, for logging.
    fn name(&self) -> &str;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_from_bytes_round_trips_body() {
        let object = StoredObject::from_bytes(Bytes::from_static(b"hello"), None);
        assert_eq!(object.size, 5);

        let body = object.into_bytes().await.unwrap();
        assert_eq!(&body[..], b"hello");
    }

    #[tokio::test]
    async fn test_into_bytes_concatenates_chunks() {
        let chunks = vec![
            Ok(Bytes::from_static(b"ab")),
            Ok(Bytes::from_static(b"cd")),
            Ok(Bytes::from_static(b"e")),
        ];
        let object = StoredObject {
            body: stream::iter(chunks).boxed(),
            size: 5,
            content_type: None,
            etag: None,
            last_modified: None,
        };

        assert_eq!(&object.into_bytes().await.unwrap()[..], b"abcde");
    }

    #[tokio::test]
    async fn test_into_bytes_surfaces_stream_errors() {
        let chunks = vec![
            Ok(Bytes::from_static(b"ab")),
            Err(std::io::Error::other("connection reset")),
        ];
        let object = StoredObject {
            body: stream::iter(chunks).boxed(),
            size: 2,
            content_type: None,
            etag: None,
            last_modified: None,
        };

        assert!(object.into_bytes().await.is_err());
    }
}
