//! Error types for object store backends.

/// Errors that can occur when talking to an object store.
///
/// `NotFound` is kept separate from every other failure: callers treat it as
/// a non-fatal "absent" signal, while the other variants are real errors.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The requested key does not exist.
    #[error("object not found: {key}")]
    NotFound { key: String },

    /// The backend rejected or failed an operation.
    #[error("{backend} {operation} failed for '{key}': {message}")]
    Backend {
        backend: &'static str,
        operation: &'static str,
        key: String,
        message: String,
    },

    /// The backend is not reachable at all.
    #[error("storage unavailable: {reason}")]
    Unavailable { reason: String },

    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A metadata record could not be encoded.
    #[error(transparent)]
    Meta(#[from] rawcache_core::CoreError),
}

impl StoreError {
    /// Creates a NotFound error.
    pub fn not_found(key: impl Into<String>) -> Self {
        Self::NotFound { key: key.into() }
    }

    /// Creates a Backend error.
    pub fn backend(
        backend: &'static str,
        operation: &'static str,
        key: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::Backend {
            backend,
            operation,
            key: key.into(),
            message: message.into(),
        }
    }

    /// Creates an Unavailable error.
    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self::Unavailable {
            reason: reason.into(),
        }
    }

    /// Returns true if this error only means "the key is absent".
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}
