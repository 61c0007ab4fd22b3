//! # rawcache storage
//!
//! Object store backends for the rawcache proxy.
//!
//! The proxy talks to storage only through the [`ObjectStore`] trait: a flat
//! key/value space of body blobs plus small JSON metadata records. Any
//! conforming backend can be swapped in without touching the request
//! coordinator.
//!
//! ## Backends
//!
//! - [`S3Store`] - S3-compatible bucket (MinIO in the reference deployment)
//! - [`FsStore`] - files under a local directory, named by key hash
//! - [`MemoryStore`] - process-local map, used by tests and ephemeral setups
//!
//! ## Example
//!
//! ```
//! use bytes::Bytes;
//! use rawcache_storage::{MemoryStore, ObjectStore};
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), rawcache_storage::StoreError> {
//! let store = MemoryStore::new();
//! store.put("objects/example.com/a.txt", Bytes::from_static(b"hello"), Some("text/plain")).await?;
//!
//! assert!(store.exists("objects/example.com/a.txt").await?);
//! let object = store.get("objects/example.com/a.txt").await?;
//! assert_eq!(object.size, 5);
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod fs;
pub mod memory;
pub mod s3;
pub mod store;

// Re-exports
pub use error::StoreError;
pub use fs::FsStore;
pub use memory::MemoryStore;
pub use s3::{S3Settings, S3Store};
pub use store::{ObjectBody, ObjectStore, StoredObject};

// Re-export rawcache_core for consumers
pub use rawcache_core;
