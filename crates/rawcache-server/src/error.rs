use std::time::Duration;

use axum::{
    Json,
    http::{Method, StatusCode},
    response::{IntoResponse, Response},
};
use serde::Serialize;

use crate::response::{CacheStatus, X_CACHE};
use crate::singleflight::FlightError;
use crate::upstream::UpstreamError;

/// Errors returned by the proxy, each mapped to one HTTP status.
///
/// Cloneable because a single upstream fetch may answer many waiters.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ProxyError {
    /// El path no tiene la forma /<domain>/<route>
    #[error("path must be /<domain>/<route>: {0}")]
    BadPath(String),

    /// Metodo distinto de GET/HEAD
    #[error("method {0} not allowed")]
    MethodNotAllowed(Method),

    /// 404 recordado en cache negativa
    #[error("Upstream negative-cached 404")]
    NegativeCached,

    /// El origen respondio 404
    #[error("Upstream 404")]
    UpstreamNotFound,

    /// El origen respondio un status no exitoso
    #[error("Upstream error (status {status})")]
    UpstreamStatus { status: StatusCode },

    /// Fallo de transporte hacia el origen
    #[error("upstream error: {0}")]
    Upstream(#[from] UpstreamError),

    /// The fetched body or its metadata could not be written.
    #[error("failed to persist {key}: {message}")]
    Persist { key: String, message: String },

    /// A cached object could not be read back.
    #[error("cache read failed for {key}: {message}")]
    CacheRead { key: String, message: String },

    #[error(transparent)]
    Flight(#[from] FlightError),

    /// The request deadline expired.
    #[error("request timed out after {}s", .0.as_secs())]
    Timeout(Duration),
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    message: String,
}

impl ProxyError {
    pub fn persist(key: impl Into<String>, err: impl std::fmt::Display) -> Self {
        Self::Persist {
            key: key.into(),
            message: err.to_string(),
        }
    }

    pub fn cache_read(key: impl Into<String>, err: impl std::fmt::Display) -> Self {
        Self::CacheRead {
            key: key.into(),
            message: err.to_string(),
        }
    }

    /// Returns the HTTP status this error is answered with.
    pub fn status_code(&self) -> StatusCode {
        match self {
            ProxyError::BadPath(_) => StatusCode::BAD_REQUEST,
            ProxyError::MethodNotAllowed(_) => StatusCode::METHOD_NOT_ALLOWED,
            ProxyError::NegativeCached | ProxyError::UpstreamNotFound => StatusCode::NOT_FOUND,
            ProxyError::UpstreamStatus { status } => {
                if status.is_client_error() || status.is_server_error() {
                    *status
                } else {
                    StatusCode::BAD_GATEWAY
                }
            },
            ProxyError::Upstream(_) | ProxyError::Persist { .. } => StatusCode::BAD_GATEWAY,
            ProxyError::CacheRead { .. } | ProxyError::Flight(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            },
            ProxyError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
        }
    }

    /// Returns the `X-Cache` value for errors that come out of the cache
    /// protocol; client and internal errors carry none.
    pub fn cache_status(&self) -> Option<CacheStatus> {
        match self {
            ProxyError::NegativeCached => Some(CacheStatus::Negative),
            ProxyError::UpstreamNotFound
            | ProxyError::UpstreamStatus { .. }
            | ProxyError::Upstream(_)
            | ProxyError::Persist { .. } => Some(CacheStatus::Miss),
            _ => None,
        }
    }
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let error = status.canonical_reason().unwrap_or("Error").to_string();
        let cache_status = self.cache_status();

        let body = Json(ErrorResponse {
            error,
            message: self.to_string(),
        });

        let mut response = (status, body).into_response();
        if let Some(cache_status) = cache_status {
            response
                .headers_mut()
                .insert(X_CACHE.clone(), cache_status.header_value());
        }
        response
    }
}
