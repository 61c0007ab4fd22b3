//! # rawcache core
//!
//! Domain types for the rawcache proxy: the metadata sidecar stored next to
//! every cached object, the freshness model that decides whether an entry can
//! be served without talking to the origin, and the deterministic mapping
//! from a `/<domain>/<route>` request to storage keys.
//!
//! Everything in this crate is pure. Storage backends live in
//! `rawcache-storage` and the HTTP surface in `rawcache-server`.
//!
//! ## Example
//!
//! ```
//! use std::time::Duration;
//! use rawcache_core::{CacheKeys, Meta, ProxyTarget, freshness};
//!
//! let target = ProxyTarget::parse("/example.com/a.txt", None).unwrap();
//! assert_eq!(target.upstream_url(), "https://example.com/a.txt");
//!
//! let keys = CacheKeys::derive(target.domain(), target.route());
//! assert_eq!(keys.object_key(), "objects/example.com/a.txt");
//!
//! let meta = Meta::positive(Some("\"x1\"".into()), None, 3600, 5);
//! assert!(freshness::is_fresh(&meta, Duration::from_secs(3600)));
//! ```

pub mod error;
pub mod freshness;
pub mod keys;
pub mod meta;
pub mod target;

// Re-exports
pub use error::{CoreError, Result};
pub use keys::{CacheKeys, meta_key, object_key};
pub use meta::{Meta, format_timestamp, now_timestamp, parse_timestamp};
pub use target::ProxyTarget;

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

    #[test]
    fn version_is_semver() {
        let v = version();
        assert_eq!(v.split('.').count(), 3, "Version should be semver");
    }
}
