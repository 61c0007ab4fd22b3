//! Custom assertions para tests.

use axum::http::StatusCode;
use rawcache_storage::MemoryStore;
use serde_json::Value;

use super::client::TestResponse;

/// Verifica que la respuesta sea un error JSON `{error, message}`.
pub fn assert_json_error(response: &TestResponse, status: StatusCode, message: &str) {
    response.assert_status(status);

    let json: Value = response.json();
    let obj = json.as_object().expect("Error body should be a JSON object");

    assert_eq!(
        obj.get("error").and_then(Value::as_str),
        status.canonical_reason(),
        "Unexpected 'error' field"
    );

    let actual = obj
        .get("message")
        .and_then(Value::as_str)
        .expect("Missing 'message' field");
    assert!(
        actual.contains(message),
        "Expected message containing '{}' but got '{}'",
        message,
        actual
    );
}

/// Verifica que no se haya escrito nada para una entrada.
pub fn assert_nothing_stored(store: &MemoryStore, object_key: &str, meta_key: &str) {
    assert!(
        !store.contains(object_key),
        "Unexpected object stored at {}",
        object_key
    );
    assert!(
        !store.contains(meta_key),
        "Unexpected metadata stored at {}",
        meta_key
    );
}
