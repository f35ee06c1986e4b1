use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;

use crate::bridge::ServerBridge;

/// Handler answering discovery requests with the server's public key
///
/// Responds 200 with `{ "key": <pem>, "format": <format> }` — the
/// bootstrap endpoint a client's discovery loop targets. Mount it
/// outside the gate so the handshake itself is never refused.
pub async fn publish_key(State(bridge): State<ServerBridge>) -> Response {
    match bridge.announcement() {
        Ok(announcement) => (StatusCode::OK, Json(announcement)).into_response(),
        Err(err) => {
            tracing::error!("failed to export public key: {err}");
            (StatusCode::INTERNAL_SERVER_ERROR, "key unavailable").into_response()
        }
    }
}
