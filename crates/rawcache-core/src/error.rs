//! Error types for the rawcache core.
//!
//! The core is almost entirely total: key derivation and the freshness
//! predicates never fail. The only fallible operations are parsing an inbound
//! request path and (de)serializing the metadata sidecar.

use thiserror::Error;

/// Errors produced by the core domain types.
#[derive(Debug, Error)]
pub enum CoreError {
    /// The request path does not have the `/<domain>/<route>` shape.
    #[error("invalid path '{path}': {reason}")]
    InvalidPath {
        /// The raw path as received
        path: String,
        /// Why it was rejected
        reason: String,
    },

    /// The metadata sidecar could not be encoded or decoded.
    #[error("metadata serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl CoreError {
    /// Creates an InvalidPath error.
    pub fn invalid_path(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidPath {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Returns true if this error was caused by client input.
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::InvalidPath { .. })
    }
}

/// Type alias for Results with CoreError.
pub type Result<T> = std::result::Result<T, CoreError>;
