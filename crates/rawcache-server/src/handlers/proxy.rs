use axum::{
    extract::State,
    http::{Method, Uri},
    response::Response,
};

use crate::state::AppState;

/// Fallback handler: every path that is not a built-in route is proxied.
///
/// The path is taken raw (still percent-encoded) so cache keys and the
/// upstream URL see exactly what the client sent.
pub async fn proxy(State(state): State<AppState>, method: Method, uri: Uri) -> Response {
    state
        .coordinator()
        .handle(&method, uri.path(), uri.query())
        .await
}
