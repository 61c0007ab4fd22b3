//! Upstream (origin) fetcher.

use std::time::Duration;

use async_trait::async_trait;
use axum::http::{HeaderMap, StatusCode, header};
use bytes::Bytes;
use tracing::{debug, instrument};

use crate::config::UpstreamSettings;

/// Errors talking to the origin. A non-2xx status is not an error here; it
/// is reported through [`UpstreamResponse::status`].
#[derive(Debug, Clone, thiserror::Error)]
pub enum UpstreamError {
    #[error("failed to build HTTP client: {0}")]
    Client(String),

    #[error("request to {url} timed out")]
    Timeout { url: String },

    #[error("connection to {url} failed: {message}")]
    Connect { url: String, message: String },

    #[error("request to {url} failed: {message}")]
    Request { url: String, message: String },

    #[error("reading body from {url} failed: {message}")]
    Body { url: String, message: String },
}

impl UpstreamError {
    fn from_reqwest(url: &str, err: reqwest::Error) -> Self {
        let url = url.to_string();
        if err.is_timeout() {
            Self::Timeout { url }
        } else if err.is_connect() {
            Self::Connect {
                url,
                message: err.to_string(),
            }
        } else if err.is_body() || err.is_decode() {
            Self::Body {
                url,
                message: err.to_string(),
            }
        } else {
            Self::Request {
                url,
                message: err.to_string(),
            }
        }
    }
}

/// What the origin answered.
#[derive(Debug, Clone)]
pub struct UpstreamResponse {
    pub status: StatusCode,
    pub content_type: Option<String>,
    pub etag: Option<String>,
    pub last_modified: Option<String>,
    /// Full body; `None` for 304.
    pub body: Option<Bytes>,
}

impl UpstreamResponse {
    /// Builds a response from a status, headers and body.
    pub fn new(status: StatusCode, headers: &HeaderMap, body: Option<Bytes>) -> Self {
        Self {
            status,
            content_type: header_string(headers, header::CONTENT_TYPE),
            etag: header_string(headers, header::ETAG),
            last_modified: header_string(headers, header::LAST_MODIFIED),
            body,
        }
    }

    pub fn is_not_modified(&self) -> bool {
        self.status == StatusCode::NOT_MODIFIED
    }
}

fn header_string(headers: &HeaderMap, name: header::HeaderName) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
        .map(String::from)
}

/// Performs conditional GETs against the origin.
#[async_trait]
pub trait Upstream: Send + Sync {
    /// Fetches `url`, sending `If-None-Match` / `If-Modified-Since` when the
    /// validators are given. The whole body is read before returning.
    async fn fetch(
        &self,
        url: &str,
        if_none_match: Option<&str>,
        if_modified_since: Option<&str>,
    ) -> Result<UpstreamResponse, UpstreamError>;
}

/// [`Upstream`] backed by a pooled `reqwest` client.
#[derive(Debug, Clone)]
pub struct HttpUpstream {
    client: reqwest::Client,
}

impl HttpUpstream {
    /// Builds the client from settings.
    pub fn new(settings: &UpstreamSettings) -> Result<Self, UpstreamError> {
        let client = reqwest::Client::builder()
            .user_agent(format!("rawcache/{}", crate::version()))
            .connect_timeout(Duration::from_secs(settings.connect_timeout))
            .timeout(Duration::from_secs(settings.timeout))
            .tcp_keepalive(Duration::from_secs(60))
            .pool_idle_timeout(Duration::from_secs(settings.pool_idle_timeout))
            .pool_max_idle_per_host(settings.pool_max_idle_per_host)
            .redirect(reqwest::redirect::Policy::limited(10))
            .build()
            .map_err(|e| UpstreamError::Client(e.to_string()))?;

        Ok(Self { client })
    }
}

#[async_trait]
impl Upstream for HttpUpstream {
    #[instrument(skip(self), fields(status))]
    async fn fetch(
        &self,
        url: &str,
        if_none_match: Option<&str>,
        if_modified_since: Option<&str>,
    ) -> Result<UpstreamResponse, UpstreamError> {
        let mut request = self.client.get(url);
        if let Some(etag) = if_none_match.filter(|v| !v.is_empty()) {
            request = request.header(header::IF_NONE_MATCH, etag);
        }
        if let Some(lm) = if_modified_since.filter(|v| !v.is_empty()) {
            request = request.header(header::IF_MODIFIED_SINCE, lm);
        }

        let response = request
            .send()
            .await
            .map_err(|e| UpstreamError::from_reqwest(url, e))?;

        let status = response.status();
        tracing::Span::current().record("status", status.as_u16());
        let headers = response.headers().clone();

        if status == StatusCode::NOT_MODIFIED {
            debug!("origin reports not modified");
            return Ok(UpstreamResponse::new(status, &headers, None));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| UpstreamError::from_reqwest(url, e))?;

        debug!(bytes = body.len(), "origin response read");
        Ok(UpstreamResponse::new(status, &headers, Some(body)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_response_extracts_validators() {
        let mut headers = HeaderMap::new();
        headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("text/plain"));
        headers.insert(header::ETAG, HeaderValue::from_static("\"abc\""));
        headers.insert(header::LAST_MODIFIED, HeaderValue::from_static(""));

        let response = UpstreamResponse::new(StatusCode::OK, &headers, Some(Bytes::new()));

        assert_eq!(response.content_type.as_deref(), Some("text/plain"));
        assert_eq!(response.etag.as_deref(), Some("\"abc\""));
        assert_eq!(response.last_modified, None);
        assert!(!response.is_not_modified());
    }

    #[test]
    fn test_client_builds_from_default_settings() {
        assert!(HttpUpstream::new(&UpstreamSettings::default()).is_ok());
    }
}
