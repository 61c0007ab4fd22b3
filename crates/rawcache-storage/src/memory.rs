//! In-memory object store.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use rawcache_core::Meta;
use tracing::{debug, warn};

use crate::error::StoreError;
use crate::store::{ObjectStore, StoredObject};

#[derive(Debug, Clone)]
struct MemoryEntry {
    data: Bytes,
    content_type: Option<String>,
    written_at: DateTime<Utc>,
}

/// Object store backed by a process-local map.
///
/// Bodies and metadata records share one key space, exactly like a bucket.
/// Nothing is persisted; contents are lost when the process exits.
///
/// Besides the [`ObjectStore`] contract it exposes write counters and a
/// couple of switches to simulate backend failures.
#[derive(Debug)]
pub struct MemoryStore {
    entries: RwLock<HashMap<String, MemoryEntry>>,
    fail_writes: AtomicBool,
    available: AtomicBool,
    object_writes: AtomicUsize,
    meta_writes: AtomicUsize,
}

impl MemoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            fail_writes: AtomicBool::new(false),
            available: AtomicBool::new(true),
            object_writes: AtomicUsize::new(0),
            meta_writes: AtomicUsize::new(0),
        }
    }

    /// Stores raw bytes under `key`, bypassing metadata encoding.
    pub fn insert_raw(&self, key: impl Into<String>, data: impl Into<Bytes>) {
        self.entries.write().insert(
            key.into(),
            MemoryEntry {
                data: data.into(),
                content_type: None,
                written_at: Utc::now(),
            },
        );
    }

    /// Returns true if anything is stored under `key`.
    pub fn contains(&self, key: &str) -> bool {
        self.entries.read().contains_key(key)
    }

    /// Returns true if nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Number of successful `put` calls.
    pub fn object_writes(&self) -> usize {
        self.object_writes.load(Ordering::SeqCst)
    }

    /// Number of successful `put_meta` calls.
    pub fn meta_writes(&self) -> usize {
        self.meta_writes.load(Ordering::SeqCst)
    }

    /// Makes every subsequent write fail until reset.
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Controls the result of `ping`.
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    fn check_writable(&self, operation: &'static str, key: &str) -> Result<(), StoreError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError::backend(
                "memory",
                operation,
                key,
                "writes disabled",
            ));
        }
        Ok(())
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    async fn exists(&self, key: &str) -> Result<bool, StoreError> {
        Ok(self.contains(key))
    }

    async fn get(&self, key: &str) -> Result<StoredObject, StoreError> {
        let entry = self
            .entries
            .read()
            .get(key)
            .cloned()
            .ok_or_else(|| StoreError::not_found(key))?;

        let mut object = StoredObject::from_bytes(entry.data, entry.content_type);
        object.last_modified = Some(
            entry
                .written_at
                .format("%a, %d %b %Y %H:%M:%S GMT")
                .to_string(),
        );
        Ok(object)
    }

    async fn put(
        &self,
        key: &str,
        data: Bytes,
        content_type: Option<&str>,
    ) -> Result<(), StoreError> {
        self.check_writable("put", key)?;

        debug!(%key, bytes = data.len(), "object stored in memory");
        self.entries.write().insert(
            key.to_string(),
            MemoryEntry {
                data,
                content_type: content_type.map(String::from),
                written_at: Utc::now(),
            },
        );
        self.object_writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn get_meta(&self, key: &str) -> Result<Option<Meta>, StoreError> {
        let Some(entry) = self.entries.read().get(key).cloned() else {
            return Ok(None);
        };

        match Meta::from_slice(&entry.data) {
            Ok(meta) => Ok(Some(meta)),
            Err(e) => {
                warn!(%key, error = %e, "ignoring unreadable metadata record");
                Ok(None)
            },
        }
    }

    async fn put_meta(&self, key: &str, meta: &Meta) -> Result<(), StoreError> {
        self.check_writable("put_meta", key)?;

        let data = meta.to_vec()?;
        self.entries.write().insert(
            key.to_string(),
            MemoryEntry {
                data: Bytes::from(data),
                content_type: Some("application/json".to_string()),
                written_at: Utc::now(),
            },
        );
        self.meta_writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn ping(&self) -> Result<(), StoreError> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(StoreError::unavailable("memory store marked unavailable"))
        }
    }

    fn name(&self) -> &str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_put_and_get() {
        let store = MemoryStore::new();
        store
            .put("objects/d/a", Bytes::from_static(b"hello"), Some("text/plain"))
            .await
            .unwrap();

        assert!(store.exists("objects/d/a").await.unwrap());

        let object = store.get("objects/d/a").await.unwrap();
        assert_eq!(object.size, 5);
        assert_eq!(object.content_type.as_deref(), Some("text/plain"));
        assert!(object.last_modified.as_deref().unwrap().ends_with("GMT"));
        assert_eq!(&object.into_bytes().await.unwrap()[..], b"hello");
        assert_eq!(store.object_writes(), 1);
    }

    #[tokio::test]
    async fn test_missing_object() {
        let store = MemoryStore::new();

        assert!(!store.exists("nope").await.unwrap());
        assert!(store.get("nope").await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_meta_round_trip() {
        let store = MemoryStore::new();
        let meta = Meta::positive(Some("\"e\"".into()), None, 10, 3);

        store.put_meta("meta/d/a.json", &meta).await.unwrap();

        assert_eq!(store.get_meta("meta/d/a.json").await.unwrap(), Some(meta));
        assert_eq!(store.meta_writes(), 1);
    }

    #[tokio::test]
    async fn test_absent_and_corrupt_meta_read_as_none() {
        let store = MemoryStore::new();
        store.insert_raw("meta/d/bad.json", "{{{");

        assert_eq!(store.get_meta("meta/d/none.json").await.unwrap(), None);
        assert_eq!(store.get_meta("meta/d/bad.json").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_fail_writes_switch() {
        let store = MemoryStore::new();
        store.set_fail_writes(true);

        assert!(store.put("k", Bytes::new(), None).await.is_err());
        assert!(store.put_meta("m", &Meta::negative(1)).await.is_err());
        assert!(store.is_empty());

        store.set_fail_writes(false);
        assert!(store.put("k", Bytes::new(), None).await.is_ok());
    }

    #[tokio::test]
    async fn test_ping_follows_availability() {
        let store = MemoryStore::new();
        assert!(store.ping().await.is_ok());

        store.set_available(false);
        assert!(store.ping().await.is_err());
    }
}
