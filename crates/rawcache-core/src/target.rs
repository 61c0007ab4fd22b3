//! Parsing of inbound `/<domain>/<route>` paths.

use std::fmt;

use crate::error::{CoreError, Result};
use crate::keys::CacheKeys;

/// Upstream target resolved from an inbound request path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyTarget {
    domain: String,
    route: String,
    upstream_url: String,
}

impl ProxyTarget {
    /// Parses `/<domain>/<route>` and builds `https://<domain>/<route>[?query]`.
    ///
    /// Only a single leading `/` is stripped before splitting on the next
    /// `/`. The domain and route are not escaped or validated beyond that;
    /// a malformed domain simply fails later at the fetch.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidPath`] when there is no route segment or
    /// the domain segment is empty.
    ///
    /// # Examples
    ///
    /// ```
    /// use rawcache_core::ProxyTarget;
    ///
    /// let target = ProxyTarget::parse("/example.com/dir/a.txt", Some("v=1")).unwrap();
    /// assert_eq!(target.domain(), "example.com");
    /// assert_eq!(target.route(), "dir/a.txt");
    /// assert_eq!(target.upstream_url(), "https://example.com/dir/a.txt?v=1");
    ///
    /// assert!(ProxyTarget::parse("/onlydomain", None).is_err());
    /// ```
    pub fn parse(path: &str, raw_query: Option<&str>) -> Result<Self> {
        let trimmed = path.strip_prefix('/').unwrap_or(path);

        let (domain, route) = match trimmed.split_once('/') {
            Some((domain, route)) if !domain.is_empty() => (domain, route),
            Some(_) => return Err(CoreError::invalid_path(path, "domain segment is empty")),
            None => {
                return Err(CoreError::invalid_path(
                    path,
                    "path must be /<domain>/<route>",
                ));
            },
        };

        let mut upstream_url = format!(
            "https://{}/{}",
            domain.trim_end_matches('/'),
            route.trim_start_matches('/')
        );
        if let Some(query) = raw_query.filter(|q| !q.is_empty()) {
            upstream_url.push('?');
            upstream_url.push_str(query);
        }

        Ok(Self {
            domain: domain.to_string(),
            route: route.to_string(),
            upstream_url,
        })
    }

    /// Returns the domain segment exactly as it appeared in the path.
    pub fn domain(&self) -> &str {
        &self.domain
    }

    /// Returns the route segment (everything after the domain's `/`).
    pub fn route(&self) -> &str {
        &self.route
    }

    /// Returns the origin URL to fetch.
    pub fn upstream_url(&self) -> &str {
        &self.upstream_url
    }

    /// Derives the storage keys for this target.
    pub fn keys(&self) -> CacheKeys {
        CacheKeys::derive(&self.domain, &self.route)
    }
}

impl fmt::Display for ProxyTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.domain, self.route)
    }
}
