//! Request coordinator.
//!
//! Turns `/<domain>/<route>` into a cached copy of `https://<domain>/<route>`:
//!
//! 1. parse the path (400 if it has no route segment)
//! 2. with `serve_if_present`, stream any stored object right away
//! 3. read the metadata record; absent and unreadable are the same thing
//! 4. negative-fresh answers 404, positive-fresh streams the object
//! 5. otherwise enter the single-flight section for the object key, re-check,
//!    and do one conditional fetch + persist on behalf of every waiter
//! 6. turn the shared [`Outcome`] into a response
//!
//! Nothing is retried.

use std::sync::Arc;
use std::time::Duration;

use axum::http::{Method, StatusCode};
use axum::response::{IntoResponse, Response};
use rawcache_core::{CacheKeys, Meta, ProxyTarget, freshness};
use rawcache_storage::ObjectStore;
use tracing::{Span, debug, info, instrument, warn};

use crate::error::ProxyError;
use crate::response::{CacheStatus, FetchedBody, cached_response, fetched_response, without_body};
use crate::singleflight::SingleFlight;
use crate::upstream::Upstream;

/// Cache policy knobs.
#[derive(Debug, Clone, Copy)]
pub struct CachePolicy {
    pub ttl_default: Duration,
    pub ttl_404: Duration,
    pub serve_if_present: bool,
    pub request_timeout: Duration,
}

impl Default for CachePolicy {
    fn default() -> Self {
        Self {
            ttl_default: Duration::from_secs(3600),
            ttl_404: Duration::from_secs(60),
            serve_if_present: false,
            request_timeout: Duration::from_secs(120),
        }
    }
}

impl From<&crate::config::Settings> for CachePolicy {
    fn from(settings: &crate::config::Settings) -> Self {
        Self {
            ttl_default: Duration::from_secs(settings.cache.ttl_default),
            ttl_404: Duration::from_secs(settings.cache.ttl_404),
            serve_if_present: settings.cache.serve_if_present,
            request_timeout: settings.request_timeout(),
        }
    }
}

/// Result of one single-flight execution, shared by all its waiters.
#[derive(Debug, Clone)]
pub enum Outcome {
    /// The stored object is valid; stream it.
    ServeCache { revalidated: bool },
    /// The origin does not have it.
    NotFound { negative_cached: bool },
    /// The origin answered a status that is neither 2xx, 304 nor 404.
    UpstreamError { status: StatusCode },
    /// A new body was fetched and persisted.
    WroteBody(FetchedBody),
}

type FlightResult = Result<Outcome, ProxyError>;

/// Drives the cache protocol for every proxied request.
pub struct Coordinator {
    store: Arc<dyn ObjectStore>,
    upstream: Arc<dyn Upstream>,
    policy: CachePolicy,
    flights: SingleFlight<FlightResult>,
}

impl Coordinator {
    pub fn new(store: Arc<dyn ObjectStore>, upstream: Arc<dyn Upstream>, policy: CachePolicy) -> Self {
        Self {
            store,
            upstream,
            policy,
            flights: SingleFlight::new(),
        }
    }

    pub fn store(&self) -> &Arc<dyn ObjectStore> {
        &self.store
    }

    /// Returns the number of fetches currently in progress.
    pub fn in_flight(&self) -> usize {
        self.flights.in_flight()
    }

    /// Handles one proxied request and always produces a response.
    pub async fn handle(&self, method: &Method, path: &str, query: Option<&str>) -> Response {
        if method != Method::GET && method != Method::HEAD {
            return ProxyError::MethodNotAllowed(method.clone()).into_response();
        }

        let timeout = self.policy.request_timeout;
        let response = match tokio::time::timeout(timeout, self.serve(path, query)).await {
            Ok(Ok(response)) => response,
            Ok(Err(err)) => {
                if err.status_code().is_server_error() {
                    warn!(%path, error = %err, "proxy request failed");
                }
                err.into_response()
            },
            Err(_) => {
                warn!(%path, timeout_s = timeout.as_secs(), "request deadline expired");
                ProxyError::Timeout(timeout).into_response()
            },
        };

        if method == Method::HEAD {
            without_body(response)
        } else {
            response
        }
    }

    #[instrument(skip(self, query), fields(domain, route))]
    async fn serve(&self, path: &str, query: Option<&str>) -> Result<Response, ProxyError> {
        let target = ProxyTarget::parse(path, query).map_err(|e| ProxyError::BadPath(e.to_string()))?;
        let span = Span::current();
        span.record("domain", target.domain());
        span.record("route", target.route());

        let keys = target.keys();

        if self.policy.serve_if_present
            && object_exists(self.store.as_ref(), keys.object_key()).await
        {
            match self.store.get(keys.object_key()).await {
                Ok(object) => {
                    debug!("serving stored object without freshness check");
                    return Ok(cached_response(object, CacheStatus::Stale));
                },
                Err(e) => debug!(error = %e, "eager serve failed, falling through"),
            }
        }

        if let Some(meta) = read_meta(self.store.as_ref(), keys.meta_key()).await {
            if freshness::is_negative_fresh(&meta, self.policy.ttl_404) {
                return Err(ProxyError::NegativeCached);
            }
            if freshness::is_fresh(&meta, self.policy.ttl_default)
                && object_exists(self.store.as_ref(), keys.object_key()).await
            {
                match self.store.get(keys.object_key()).await {
                    Ok(object) => return Ok(cached_response(object, CacheStatus::Hit)),
                    Err(e) => debug!(error = %e, "fresh object unreadable, refetching"),
                }
            }
        }

        let fill = Fill {
            store: Arc::clone(&self.store),
            upstream: Arc::clone(&self.upstream),
            keys: keys.clone(),
            url: target.upstream_url().to_string(),
            ttl_default: self.policy.ttl_default,
            ttl_404: self.policy.ttl_404,
        };
        let (result, shared) = self
            .flights
            .run(keys.object_key(), move || fill.run())
            .await?;
        if shared {
            debug!("outcome shared with concurrent requests");
        }

        match result? {
            Outcome::ServeCache { revalidated } => {
                let object = self
                    .store
                    .get(keys.object_key())
                    .await
                    .map_err(|e| ProxyError::cache_read(keys.object_key(), e))?;
                let status = if revalidated {
                    CacheStatus::Revalidated
                } else {
                    CacheStatus::Hit
                };
                Ok(cached_response(object, status))
            },
            Outcome::NotFound { negative_cached } => Err(if negative_cached {
                ProxyError::NegativeCached
            } else {
                ProxyError::UpstreamNotFound
            }),
            Outcome::UpstreamError { status } => Err(ProxyError::UpstreamStatus { status }),
            Outcome::WroteBody(fetched) => Ok(fetched_response(fetched)),
        }
    }
}

/// The work run once per key inside the single-flight section. Owns
/// everything it touches so it can outlive the request that started it.
struct Fill {
    store: Arc<dyn ObjectStore>,
    upstream: Arc<dyn Upstream>,
    keys: CacheKeys,
    url: String,
    ttl_default: Duration,
    ttl_404: Duration,
}

impl Fill {
    async fn run(self) -> FlightResult {
        let store = self.store.as_ref();
        let meta = read_meta(store, self.keys.meta_key()).await;

        // Otro vuelo pudo haber llenado la entrada mientras esperabamos
        if let Some(meta) = meta.as_ref() {
            if freshness::is_negative_fresh(meta, self.ttl_404) {
                return Ok(Outcome::NotFound {
                    negative_cached: true,
                });
            }
            if freshness::is_fresh(meta, self.ttl_default)
                && object_exists(store, self.keys.object_key()).await
            {
                return Ok(Outcome::ServeCache { revalidated: false });
            }
        }

        let (if_none_match, if_modified_since) = match meta.as_ref() {
            Some(meta) if meta.has_validators() => {
                debug!(url = %self.url, "conditional fetch");
                (meta.etag(), meta.last_modified())
            },
            _ => (None, None),
        };

        let response = self
            .upstream
            .fetch(&self.url, if_none_match, if_modified_since)
            .await?;
        let status = response.status;

        if response.is_not_modified()
            && let Some(mut meta) = meta
        {
            meta.touch();
            if let Err(e) = store.put_meta(self.keys.meta_key(), &meta).await {
                warn!(key = %self.keys.meta_key(), error = %e, "failed to refresh metadata after 304");
            }
            info!(url = %self.url, "revalidated");
            return Ok(Outcome::ServeCache { revalidated: true });
        }

        if status == StatusCode::NOT_FOUND {
            let negative = Meta::negative(ttl_secs(self.ttl_404));
            if let Err(e) = store.put_meta(self.keys.meta_key(), &negative).await {
                warn!(key = %self.keys.meta_key(), error = %e, "failed to record negative entry");
            }
            info!(url = %self.url, "origin 404 cached negatively");
            return Ok(Outcome::NotFound {
                negative_cached: false,
            });
        }

        if !status.is_success() {
            info!(url = %self.url, status = status.as_u16(), "origin returned error status");
            return Ok(Outcome::UpstreamError { status });
        }

        let body = response.body.unwrap_or_default();
        let size = body.len();

        // Cuerpo primero, metadata al final: la metadata nunca apunta a un
        // objeto que no existe.
        store
            .put(self.keys.object_key(), body.clone(), response.content_type.as_deref())
            .await
            .map_err(|e| ProxyError::persist(self.keys.object_key(), e))?;

        let meta = Meta::positive(
            response.etag.clone(),
            response.last_modified.clone(),
            ttl_secs(self.ttl_default),
            size as i64,
        );
        store
            .put_meta(self.keys.meta_key(), &meta)
            .await
            .map_err(|e| ProxyError::persist(self.keys.meta_key(), e))?;

        info!(url = %self.url, bytes = size, "fetched and stored");
        Ok(Outcome::WroteBody(FetchedBody {
            body,
            content_type: response.content_type,
            etag: response.etag,
            last_modified: response.last_modified,
        }))
    }
}

fn ttl_secs(ttl: Duration) -> i64 {
    i64::try_from(ttl.as_secs()).unwrap_or(i64::MAX)
}

/// Existence check where a store failure counts as "absent".
async fn object_exists(store: &dyn ObjectStore, key: &str) -> bool {
    match store.exists(key).await {
        Ok(exists) => exists,
        Err(e) => {
            debug!(%key, error = %e, "exists check failed");
            false
        },
    }
}

/// Metadata read where a store failure counts as "no metadata".
async fn read_meta(store: &dyn ObjectStore, key: &str) -> Option<Meta> {
    match store.get_meta(key).await {
        Ok(meta) => meta,
        Err(e) => {
            debug!(%key, error = %e, "metadata read failed");
            None
        },
    }
}
