//! Metadata sidecar stored next to every cached object.
//!
//! The JSON layout (`etag`, `last_modified`, `cached_at`, `ttl_sec`, `size`,
//! `neg`) is shared with records already present in deployed buckets, so the
//! field names and the "omit when empty" behaviour must not change.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Metadata describing one cache entry.
///
/// A record is either *positive* (describes a stored body) or *negative*
/// (`is_negative == true`, remembers that the origin answered 404 and has no
/// body behind it).
///
/// # Example
///
/// ```
/// use rawcache_core::Meta;
///
/// let meta = Meta::negative(60);
/// assert!(meta.is_negative);
/// assert_eq!(meta.ttl_seconds, 60);
/// assert!(!meta.cached_at.is_empty());
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Meta {
    /// Opaque ETag validator from the origin.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub etag: Option<String>,

    /// Opaque Last-Modified validator from the origin.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_modified: Option<String>,

    /// RFC 3339 UTC timestamp of the last authoritative outcome.
    ///
    /// Kept as the raw string: a malformed value is legal on disk and simply
    /// makes the entry stale.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub cached_at: String,

    /// TTL override in seconds; zero or negative means "use the default".
    #[serde(rename = "ttl_sec", default, skip_serializing_if = "is_zero")]
    pub ttl_seconds: i64,

    /// Size of the stored body in bytes.
    #[serde(rename = "size", default, skip_serializing_if = "is_zero")]
    pub size_bytes: i64,

    /// True when this entry records an upstream miss.
    #[serde(rename = "neg", default, skip_serializing_if = "is_false")]
    pub is_negative: bool,
}

fn is_zero(value: &i64) -> bool {
    *value == 0
}

fn is_false(value: &bool) -> bool {
    !*value
}

impl Meta {
    /// Creates a positive record stamped with the current time.
    pub fn positive(
        etag: Option<String>,
        last_modified: Option<String>,
        ttl_seconds: i64,
        size_bytes: i64,
    ) -> Self {
        Self {
            etag: etag.filter(|v| !v.is_empty()),
            last_modified: last_modified.filter(|v| !v.is_empty()),
            cached_at: now_timestamp(),
            ttl_seconds,
            size_bytes,
            is_negative: false,
        }
    }

    /// Creates a negative (upstream 404) record stamped with the current time.
    pub fn negative(ttl_seconds: i64) -> Self {
        Self {
            cached_at: now_timestamp(),
            ttl_seconds,
            is_negative: true,
            ..Self::default()
        }
    }

    /// Refreshes `cached_at` after a successful revalidation.
    ///
    /// Validators, TTL and size are left untouched.
    pub fn touch(&mut self) {
        self.touch_at(Utc::now());
    }

    /// Same as [`Meta::touch`] with an explicit clock reading.
    pub fn touch_at(&mut self, now: DateTime<Utc>) {
        self.cached_at = format_timestamp(now);
    }

    /// Returns the parsed `cached_at`, or `None` if missing or malformed.
    pub fn cached_at(&self) -> Option<DateTime<Utc>> {
        parse_timestamp(&self.cached_at)
    }

    /// Returns the non-empty ETag validator, if any.
    pub fn etag(&self) -> Option<&str> {
        self.etag.as_deref().filter(|v| !v.is_empty())
    }

    /// Returns the non-empty Last-Modified validator, if any.
    pub fn last_modified(&self) -> Option<&str> {
        self.last_modified.as_deref().filter(|v| !v.is_empty())
    }

    /// Returns true if the record carries at least one validator.
    pub fn has_validators(&self) -> bool {
        self.etag().is_some() || self.last_modified().is_some()
    }

    /// Decodes a record from its JSON representation.
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }

    /// Encodes the record as JSON.
    pub fn to_vec(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }
}

/// Formats a timestamp the way `cached_at` is written: UTC, nanoseconds, `Z`.
pub fn format_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

/// Returns the current time formatted for `cached_at`.
pub fn now_timestamp() -> String {
    format_timestamp(Utc::now())
}

/// Parses an RFC 3339 timestamp, returning `None` for empty or malformed input.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if raw.is_empty() {
        return None;
    }
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}
