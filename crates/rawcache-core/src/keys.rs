//! Storage key derivation.

use std::fmt;

/// Par de keys de almacenamiento para una entrada de cache.
///
/// Both keys are pure functions of `(domain, route)`: the route is used
/// verbatim except that every leading `/` is stripped, and the domain is not
/// normalized at all (case, punycode and trailing dots are preserved).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKeys {
    object: String,
    meta: String,
}

impl CacheKeys {
    /// Derives the object and metadata keys for a domain and route.
    ///
    /// # Examples
    ///
    /// ```
    /// use rawcache_core::CacheKeys;
    ///
    /// let keys = CacheKeys::derive("example.com", "//docs/a.txt");
    /// assert_eq!(keys.object_key(), "objects/example.com/docs/a.txt");
    /// assert_eq!(keys.meta_key(), "meta/example.com/docs/a.txt.json");
    /// ```
    pub fn derive(domain: &str, route: &str) -> Self {
        Self {
            object: object_key(domain, route),
            meta: meta_key(domain, route),
        }
    }

    /// Returns the key of the raw body blob.
    pub fn object_key(&self) -> &str {
        &self.object
    }

    /// Returns the key of the JSON metadata record.
    pub fn meta_key(&self) -> &str {
        &self.meta
    }
}

impl fmt::Display for CacheKeys {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.object)
    }
}

/// Returns `objects/<domain>/<route>`.
pub fn object_key(domain: &str, route: &str) -> String {
    format!("objects/{}/{}", domain, trim_route(route))
}

/// Returns `meta/<domain>/<route>.json`.
pub fn meta_key(domain: &str, route: &str) -> String {
    format!("meta/{}/{}.json", domain, trim_route(route))
}

fn trim_route(route: &str) -> &str {
    route.trim_start_matches('/')
}
