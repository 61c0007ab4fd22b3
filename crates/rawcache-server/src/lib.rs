//! rawcache server - path-routed HTTP caching proxy.
//!
//! `GET /<domain>/<route>[?query]` is answered with the content of
//! `https://<domain>/<route>[?query]`, stored in an object store and served
//! from there until its TTL expires. Concurrent misses for the same object
//! are collapsed into a single upstream fetch.

pub mod config;
pub mod coordinator;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod response;
pub mod server;
pub mod singleflight;
pub mod state;
pub mod upstream;

pub use config::{CliArgs, ConfigError, Settings, StorageBackend};
pub use coordinator::{CachePolicy, Coordinator, Outcome};
pub use error::ProxyError;
pub use handlers::health::HealthResponse;
pub use response::{CacheStatus, X_CACHE};
pub use server::{create_router, run_server};
pub use state::AppState;
pub use upstream::{HttpUpstream, Upstream, UpstreamError, UpstreamResponse};

/// Returns the crate version.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_is_defined() {
        assert!(!version().is_empty());
    }
}
