use std::time::Duration;

use axum::{Json, extract::State, http::StatusCode};
use serde::Serialize;
use tracing::warn;

use crate::state::AppState;

/// How long the store gets to answer a ping.
pub const HEALTH_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
}

impl HealthResponse {
    pub fn up() -> Self {
        Self {
            status: "up".to_string(),
        }
    }

    pub fn down() -> Self {
        Self {
            status: "down".to_string(),
        }
    }
}

/// Liveness probe: up only if the object store answers in time.
pub async fn health_check(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let store = state.store();

    match tokio::time::timeout(HEALTH_TIMEOUT, store.ping()).await {
        Ok(Ok(())) => (StatusCode::OK, Json(HealthResponse::up())),
        Ok(Err(e)) => {
            warn!(backend = store.name(), error = %e, "health check failed");
            (StatusCode::SERVICE_UNAVAILABLE, Json(HealthResponse::down()))
        },
        Err(_) => {
            warn!(backend = store.name(), "health check timed out");
            (StatusCode::SERVICE_UNAVAILABLE, Json(HealthResponse::down()))
        },
    }
}
