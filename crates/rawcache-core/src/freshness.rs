//! Freshness model.
//!
//! Two total predicates over a [`Meta`] record. A record whose `cached_at`
//! is missing or unparseable is never fresh, so a corrupt sidecar degrades to
//! a refetch instead of an error or a stale hit.

use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::meta::Meta;

/// Returns the TTL that applies to `meta`.
///
/// The record's own `ttl_seconds` wins when positive; otherwise the
/// caller-supplied default is used.
pub fn effective_ttl(meta: &Meta, default_ttl: Duration) -> Duration {
    if meta.ttl_seconds > 0 {
        Duration::from_secs(meta.ttl_seconds as u64)
    } else {
        default_ttl
    }
}

/// Returns true if a positive entry can be served without revalidation.
pub fn is_fresh(meta: &Meta, default_ttl: Duration) -> bool {
    is_fresh_at(meta, default_ttl, Utc::now())
}

/// Same as [`is_fresh`] with an explicit clock reading.
///
/// # Example
///
/// ```
/// use std::time::Duration;
/// use chrono::{TimeZone, Utc};
/// use rawcache_core::{Meta, freshness::is_fresh_at};
///
/// let meta = Meta {
///     cached_at: "2025-01-01T00:00:00Z".into(),
///     ..Meta::default()
/// };
/// let ttl = Duration::from_secs(60);
///
/// assert!(is_fresh_at(&meta, ttl, Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 59).unwrap()));
/// assert!(!is_fresh_at(&meta, ttl, Utc.with_ymd_and_hms(2025, 1, 1, 0, 1, 0).unwrap()));
/// ```
pub fn is_fresh_at(meta: &Meta, default_ttl: Duration, now: DateTime<Utc>) -> bool {
    if meta.is_negative {
        return false;
    }
    within_ttl(meta, effective_ttl(meta, default_ttl), now)
}

/// Returns true if a negative entry still suppresses upstream fetches.
pub fn is_negative_fresh(meta: &Meta, ttl_404: Duration) -> bool {
    is_negative_fresh_at(meta, ttl_404, Utc::now())
}

/// Same as [`is_negative_fresh`] with an explicit clock reading.
pub fn is_negative_fresh_at(meta: &Meta, ttl_404: Duration, now: DateTime<Utc>) -> bool {
    if !meta.is_negative {
        return false;
    }
    within_ttl(meta, effective_ttl(meta, ttl_404), now)
}

fn within_ttl(meta: &Meta, ttl: Duration, now: DateTime<Utc>) -> bool {
    let Some(cached_at) = meta.cached_at() else {
        return false;
    };

    // A cached_at in the future yields a negative age, which is below any TTL.
    match (now - cached_at).to_std() {
        Ok(age) => age < ttl,
        Err(_) => true,
    }
}
