//! Local filesystem object store.
//!
//! Keys are arbitrary strings taken from request paths, so they are never
//! used as file names directly. Each key is hashed (SHA-256) and the hex
//! digest names the file, fanned out over 256 subdirectories:
//!
//! ```text
//! <root>/3f/3fa9...c1          body or metadata record
//! <root>/3f/3fa9...c1.ctype    content type of the body, if any
//! ```

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use futures::StreamExt;
use rawcache_core::Meta;
use sha2::{Digest, Sha256};
use tokio_util::io::ReaderStream;
use tracing::{debug, warn};

use crate::error::StoreError;
use crate::store::{ObjectStore, StoredObject};

const CONTENT_TYPE_SUFFIX: &str = "ctype";

/// Object store rooted at a local directory.
#[derive(Debug)]
pub struct FsStore {
    root: PathBuf,
    tmp_counter: AtomicU64,
}

impl FsStore {
    /// Opens (and creates if needed) a store rooted at `root`.
    pub async fn open(root: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let root = root.into();
        tokio::fs::create_dir_all(&root).await?;
        debug!(root = %root.display(), "filesystem store opened");

        Ok(Self {
            root,
            tmp_counter: AtomicU64::new(0),
        })
    }

    /// Returns the root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Returns the file that holds the value for `key`.
    fn path_for(&self, key: &str) -> PathBuf {
        let digest = hex::encode(Sha256::digest(key.as_bytes()));
        self.root.join(&digest[..2]).join(digest)
    }

    fn content_type_path(path: &Path) -> PathBuf {
        path.with_extension(CONTENT_TYPE_SUFFIX)
    }

    /// Writes `data` to `path` through a temporary file and a rename, so
    /// readers never observe a partially written value.
    async fn write_atomic(&self, path: &Path, data: &[u8]) -> Result<(), StoreError> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let n = self.tmp_counter.fetch_add(1, Ordering::Relaxed);
        let tmp = path.with_extension(format!("tmp{}-{}", std::process::id(), n));

        tokio::fs::write(&tmp, data).await?;
        if let Err(e) = tokio::fs::rename(&tmp, path).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(e.into());
        }
        Ok(())
    }
}

#[async_trait]
impl ObjectStore for FsStore {
    async fn exists(&self, key: &str) -> Result<bool, StoreError> {
        match tokio::fs::metadata(self.path_for(key)).await {
            Ok(meta) => Ok(meta.is_file()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn get(&self, key: &str) -> Result<StoredObject, StoreError> {
        let path = self.path_for(key);

        let file = match tokio::fs::File::open(&path).await {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::NotFound => return Err(StoreError::not_found(key)),
            Err(e) => return Err(e.into()),
        };
        let stat = file.metadata().await?;

        let content_type = match tokio::fs::read_to_string(Self::content_type_path(&path)).await {
            Ok(ct) if !ct.is_empty() => Some(ct),
            Ok(_) => None,
            Err(e) if e.kind() == ErrorKind::NotFound => None,
            Err(e) => return Err(e.into()),
        };

        let last_modified = stat.modified().ok().map(|t| {
            DateTime::<Utc>::from(t)
                .format("%a, %d %b %Y %H:%M:%S GMT")
                .to_string()
        });

        Ok(StoredObject {
            body: ReaderStream::new(file).boxed(),
            size: stat.len(),
            content_type,
            etag: None,
            last_modified,
        })
    }

    async fn put(
        &self,
        key: &str,
        data: Bytes,
        content_type: Option<&str>,
    ) -> Result<(), StoreError> {
        let path = self.path_for(key);

        // Content type first: a crash in between leaves an orphan sidecar,
        // never a body labelled with a stale type.
        let ct_path = Self::content_type_path(&path);
        match content_type {
            Some(ct) => self.write_atomic(&ct_path, ct.as_bytes()).await?,
            None => match tokio::fs::remove_file(&ct_path).await {
                Ok(()) => {},
                Err(e) if e.kind() == ErrorKind::NotFound => {},
                Err(e) => return Err(e.into()),
            },
        }

        self.write_atomic(&path, &data).await?;
        debug!(%key, bytes = data.len(), path = %path.display(), "object written");
        Ok(())
    }

    async fn get_meta(&self, key: &str) -> Result<Option<Meta>, StoreError> {
        let data = match tokio::fs::read(self.path_for(key)).await {
            Ok(data) => data,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        match Meta::from_slice(&data) {
            Ok(meta) => Ok(Some(meta)),
            Err(e) => {
                warn!(%key, error = %e, "ignoring unreadable metadata record");
                Ok(None)
            },
        }
    }

    async fn put_meta(&self, key: &str, meta: &Meta) -> Result<(), StoreError> {
        let data = meta.to_vec()?;
        self.write_atomic(&self.path_for(key), &data).await
    }

    async fn ping(&self) -> Result<(), StoreError> {
        match tokio::fs::metadata(&self.root).await {
            Ok(meta) if meta.is_dir() => Ok(()),
            Ok(_) => Err(StoreError::unavailable(format!(
                "{} is not a directory",
                self.root.display()
            ))),
            Err(e) => Err(StoreError::unavailable(format!(
                "{}: {}",
                self.root.display(),
                e
            ))),
        }
    }

    fn name(&self) -> &str {
        "fs"
    }
}
