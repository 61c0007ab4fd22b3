mod helpers;

use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use helpers::{harness, test_policy};
use tower::ServiceExt;

#[tokio::test]
async fn health_check_returns_200_when_store_is_up() {
    let h = harness(test_policy());

    let response = h.client.get("/healthz").await;

    response.assert_status(StatusCode::OK);
    let json: serde_json::Value = response.json();
    assert_eq!(json["status"], "up");
}

#[tokio::test]
async fn health_check_returns_503_when_store_is_down() {
    let h = harness(test_policy());
    h.store.set_available(false);

    let response = h.client.get("/healthz").await;

    response.assert_status(StatusCode::SERVICE_UNAVAILABLE);
    let json: serde_json::Value = response.json();
    assert_eq!(json["status"], "down");
}

#[tokio::test]
async fn health_check_returns_json() {
    let h = harness(test_policy());

    let response = h.client.get("/healthz").await;

    let content_type = response.header("content-type").unwrap();
    assert!(content_type.contains("application/json"));
}

#[tokio::test]
async fn health_check_does_not_touch_upstream() {
    let h = harness(test_policy());

    h.client.get("/healthz").await;

    assert_eq!(h.upstream.calls(), 0);
}

#[tokio::test]
async fn health_check_via_raw_router() {
    let store = std::sync::Arc::new(rawcache_storage::MemoryStore::new());
    let upstream = std::sync::Arc::new(helpers::MockUpstream::new());
    let state = rawcache_server::AppState::from_parts(store, upstream, test_policy());
    let app = rawcache_server::create_router(state);

    let response = app
        .oneshot(
            Request::builder()
                .uri("/healthz")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
}

#[test]
fn health_response_serializes_correctly() {
    use rawcache_server::HealthResponse;

    let json = serde_json::to_string(&HealthResponse::up()).unwrap();
    assert_eq!(json, r#"{"status":"up"}"#);

    let json = serde_json::to_string(&HealthResponse::down()).unwrap();
    assert_eq!(json, r#"{"status":"down"}"#);
}
