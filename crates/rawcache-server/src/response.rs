//! Response construction for proxied content.
//!
//! Every proxied response carries an `X-Cache` header naming the path that
//! produced it:
//!
//! | value         | meaning                                              |
//! |---------------|------------------------------------------------------|
//! | `HIT`         | fresh entry streamed from the store                  |
//! | `STALE`       | streamed by the serve-if-present policy, unchecked   |
//! | `REVALIDATED` | origin answered 304, entry refreshed and streamed    |
//! | `MISS`        | fetched from the origin                              |
//! | `NEGATIVE`    | remembered upstream 404                              |

use std::fmt;

use axum::{
    body::Body,
    http::{HeaderMap, HeaderName, HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use bytes::Bytes;
use rawcache_storage::StoredObject;

/// Header reporting how a proxied response was produced.
pub static X_CACHE: HeaderName = HeaderName::from_static("x-cache");

/// Content type used when the origin does not send one.
pub const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// Which path of the proxy produced a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheStatus {
    Hit,
    Stale,
    Revalidated,
    Miss,
    Negative,
}

impl CacheStatus {
    /// Returns the `X-Cache` header value.
    pub fn as_str(&self) -> &'static str {
        match self {
            CacheStatus::Hit => "HIT",
            CacheStatus::Stale => "STALE",
            CacheStatus::Revalidated => "REVALIDATED",
            CacheStatus::Miss => "MISS",
            CacheStatus::Negative => "NEGATIVE",
        }
    }

    /// Returns the header value ready to insert.
    pub fn header_value(&self) -> HeaderValue {
        HeaderValue::from_static(self.as_str())
    }
}

impl fmt::Display for CacheStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A body fetched from the origin, kept in memory so every waiter of a
/// coalesced fetch can be answered from it.
#[derive(Debug, Clone)]
pub struct FetchedBody {
    pub body: Bytes,
    pub content_type: Option<String>,
    pub etag: Option<String>,
    pub last_modified: Option<String>,
}

/// Streams a stored object back to the client.
pub fn cached_response(object: StoredObject, status: CacheStatus) -> Response {
    let StoredObject {
        body,
        size,
        content_type,
        etag,
        last_modified,
    } = object;

    let mut response = Body::from_stream(body).into_response();
    *response.status_mut() = StatusCode::OK;

    let headers = response.headers_mut();
    insert_optional(headers, header::CONTENT_TYPE, content_type.as_deref());
    insert_optional(headers, header::ETAG, etag.as_deref());
    insert_optional(headers, header::LAST_MODIFIED, last_modified.as_deref());
    headers.insert(header::CONTENT_LENGTH, HeaderValue::from(size));
    headers.insert(X_CACHE.clone(), status.header_value());

    response
}

/// Answers with a body that was just fetched from the origin.
pub fn fetched_response(fetched: FetchedBody) -> Response {
    let FetchedBody {
        body,
        content_type,
        etag,
        last_modified,
    } = fetched;

    let length = body.len() as u64;
    let mut response = Body::from(body).into_response();
    *response.status_mut() = StatusCode::OK;

    let headers = response.headers_mut();
    let content_type = content_type
        .as_deref()
        .filter(|ct| !ct.is_empty())
        .unwrap_or(DEFAULT_CONTENT_TYPE);
    insert_optional(headers, header::CONTENT_TYPE, Some(content_type));
    insert_optional(headers, header::ETAG, etag.as_deref());
    insert_optional(headers, header::LAST_MODIFIED, last_modified.as_deref());
    headers.insert(header::CONTENT_LENGTH, HeaderValue::from(length));
    headers.insert(X_CACHE.clone(), CacheStatus::Miss.header_value());

    response
}

/// Drops the body of a response, keeping status and headers (HEAD).
pub fn without_body(response: Response) -> Response {
    let (parts, _) = response.into_parts();
    Response::from_parts(parts, Body::empty())
}

fn insert_optional(headers: &mut HeaderMap, name: HeaderName, value: Option<&str>) {
    // Valores que no son header validos se omiten
    if let Some(value) = value.filter(|v| !v.is_empty())
        && let Ok(value) = HeaderValue::from_str(value)
    {
        headers.insert(name, value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;

    #[test]
    fn test_cache_status_values() {
        assert_eq!(CacheStatus::Hit.as_str(), "HIT");
        assert_eq!(CacheStatus::Stale.as_str(), "STALE");
        assert_eq!(CacheStatus::Revalidated.as_str(), "REVALIDATED");
        assert_eq!(CacheStatus::Miss.as_str(), "MISS");
        assert_eq!(CacheStatus::Negative.to_string(), "NEGATIVE");
    }

    #[tokio::test]
    async fn test_fetched_response_defaults_content_type() {
        let response = fetched_response(FetchedBody {
            body: Bytes::from_static(b"abc"),
            content_type: None,
            etag: Some("\"v1\"".into()),
            last_modified: None,
        });

        assert_eq!(response.status(), StatusCode::OK);
        let headers = response.headers();
        assert_eq!(headers[header::CONTENT_TYPE], DEFAULT_CONTENT_TYPE);
        assert_eq!(headers[header::ETAG], "\"v1\"");
        assert_eq!(headers[header::CONTENT_LENGTH], "3");
        assert_eq!(headers[&X_CACHE], "MISS");
        assert!(!headers.contains_key(header::LAST_MODIFIED));

        let body = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(&body[..], b"abc");
    }

    #[tokio::test]
    async fn test_cached_response_copies_object_headers() {
        let mut object = StoredObject::from_bytes(Bytes::from_static(b"hello"), Some("text/plain".into()));
        object.last_modified = Some("Wed, 21 Oct 2015 07:28:00 GMT".into());

        let response = cached_response(object, CacheStatus::Hit);

        let headers = response.headers();
        assert_eq!(headers[header::CONTENT_TYPE], "text/plain");
        assert_eq!(headers[header::CONTENT_LENGTH], "5");
        assert_eq!(headers[header::LAST_MODIFIED], "Wed, 21 Oct 2015 07:28:00 GMT");
        assert_eq!(headers[&X_CACHE], "HIT");

        let body = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(&body[..], b"hello");
    }

    #[tokio::test]
    async fn test_without_body_keeps_headers() {
        let response = without_body(fetched_response(FetchedBody {
            body: Bytes::from_static(b"abc"),
            content_type: Some("text/plain".into()),
            etag: None,
            last_modified: None,
        }));

        assert_eq!(response.headers()[header::CONTENT_LENGTH], "3");
        let body = response.into_body().collect().await.unwrap().to_bytes();
        assert!(body.is_empty());
    }
}
