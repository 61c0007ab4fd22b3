//! Origen simulado para tests del proxy.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use axum::http::{HeaderMap, HeaderName, HeaderValue, StatusCode, header};
use bytes::Bytes;
use parking_lot::Mutex;
use rawcache_server::{Upstream, UpstreamError, UpstreamResponse};

/// Respuesta programada para una URL.
#[derive(Debug, Clone)]
pub struct MockReply {
    status: StatusCode,
    headers: HeaderMap,
    body: Bytes,
    transport_error: Option<String>,
}

impl MockReply {
    pub fn ok(body: &'static str) -> Self {
        Self::status(StatusCode::OK).body(body)
    }

    pub fn status(status: StatusCode) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            body: Bytes::new(),
            transport_error: None,
        }
    }

    pub fn transport_error(message: &str) -> Self {
        Self {
            transport_error: Some(message.to_string()),
            ..Self::status(StatusCode::BAD_GATEWAY)
        }
    }

    pub fn body(mut self, body: &'static str) -> Self {
        self.body = Bytes::from_static(body.as_bytes());
        self
    }

    pub fn header(mut self, name: HeaderName, value: &'static str) -> Self {
        self.headers.insert(name, HeaderValue::from_static(value));
        self
    }

    pub fn etag(self, etag: &'static str) -> Self {
        self.header(header::ETAG, etag)
    }

    pub fn content_type(self, content_type: &'static str) -> Self {
        self.header(header::CONTENT_TYPE, content_type)
    }
}

/// Un fetch recibido por el origen simulado.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedFetch {
    pub url: String,
    pub if_none_match: Option<String>,
    pub if_modified_since: Option<String>,
}

/// [`Upstream`] con respuestas programadas por URL. Las URLs sin respuesta
/// programada devuelven 404.
#[derive(Default)]
pub struct MockUpstream {
    replies: Mutex<HashMap<String, MockReply>>,
    fetches: Mutex<Vec<RecordedFetch>>,
    calls: AtomicUsize,
    delay: Mutex<Duration>,
}

impl MockUpstream {
    pub fn new() -> Self {
        Self::default()
    }

    /// Programa la respuesta para una URL, reemplazando la anterior.
    pub fn reply(&self, url: &str, reply: MockReply) {
        self.replies.lock().insert(url.to_string(), reply);
    }

    /// Retrasa cada fetch.
    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock() = delay;
    }

    /// Numero de fetches recibidos.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Fetches recibidos, en orden.
    pub fn fetches(&self) -> Vec<RecordedFetch> {
        self.fetches.lock().clone()
    }
}

#[async_trait]
impl Upstream for MockUpstream {
    async fn fetch(
        &self,
        url: &str,
        if_none_match: Option<&str>,
        if_modified_since: Option<&str>,
    ) -> Result<UpstreamResponse, UpstreamError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.fetches.lock().push(RecordedFetch {
            url: url.to_string(),
            if_none_match: if_none_match.map(String::from),
            if_modified_since: if_modified_since.map(String::from),
        });

        let delay = *self.delay.lock();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        let reply = self
            .replies
            .lock()
            .get(url)
            .cloned()
            .unwrap_or_else(|| MockReply::status(StatusCode::NOT_FOUND));

        if let Some(message) = reply.transport_error {
            return Err(UpstreamError::Connect {
                url: url.to_string(),
                message,
            });
        }

        let body = (reply.status != StatusCode::NOT_MODIFIED).then_some(reply.body);
        Ok(UpstreamResponse::new(reply.status, &reply.headers, body))
    }
}
