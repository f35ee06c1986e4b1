use axum::body::{to_bytes, Body};
use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use http::{header, HeaderValue, StatusCode};

use common::codec::{transcode, TextEncoding};
use common::envelope::{Envelope, CLIENT_KEY_HEADER, REFUSAL_BODY, RESPONSE_SEAL_FAILED_BODY};

use crate::bridge::ServerBridge;

/// Request-intercepting middleware around downstream handlers
///
/// Contract:
/// 1. the caller's public key must be present on `x-client-key`
///    (base64-armored PEM); without it the request is refused with 400
///    no matter what — there is no key to seal a reply with
/// 2. an enveloped body is decrypted with the server's private key and
///    the plaintext substituted before the handler runs; a body that is
///    not an envelope (or does not decrypt) is refused with 400 unless
///    `allow_unencrypted_in` passes it through raw
/// 3. whatever the handler responds is sealed with the caller's key
///    into a fresh envelope; if that sealing fails the reply is a 500
///    with a fixed diagnostic and the handler's payload is discarded
///
/// Wire with `middleware::from_fn_with_state(bridge.clone(), gate)`.
/// The interception is composed here, once, at router-setup time;
/// handlers stay unaware of it.
pub async fn gate(State(bridge): State<ServerBridge>, request: Request, next: Next) -> Response {
    let (mut parts, body) = request.into_parts();

    let Some(armored_key) = parts
        .headers
        .get(CLIENT_KEY_HEADER)
        .and_then(|value| value.to_str().ok())
    else {
        tracing::debug!("request without caller key");
        return refuse();
    };
    let client_key = match transcode(armored_key, TextEncoding::Base64, TextEncoding::Utf8) {
        Ok(key) => key,
        Err(err) => {
            tracing::debug!("caller key is not base64-armored: {err}");
            return refuse();
        }
    };

    let bytes = match to_bytes(body, usize::MAX).await {
        Ok(bytes) => bytes,
        Err(err) => {
            tracing::warn!("failed reading request body: {err}");
            return refuse();
        }
    };

    let inbound = if bytes.is_empty() {
        Body::empty()
    } else {
        match serde_json::from_slice::<Envelope>(&bytes) {
            Ok(envelope) => match bridge.keys().decrypt(&envelope.sealed) {
                Ok(plaintext) => Body::from(plaintext),
                Err(err) => {
                    tracing::info!("payload sealed with an unknown key: {err}");
                    if bridge.allow_unencrypted_in() {
                        Body::from(bytes)
                    } else {
                        return refuse();
                    }
                }
            },
            Err(_) if bridge.allow_unencrypted_in() => Body::from(bytes),
            Err(err) => {
                tracing::debug!("body is not a sealed envelope: {err}");
                return refuse();
            }
        }
    };

    // handlers see plaintext with no trace of the bridge
    parts.headers.remove(CLIENT_KEY_HEADER);
    parts.headers.remove(header::CONTENT_LENGTH);
    let response = next.run(Request::from_parts(parts, inbound)).await;

    seal_response(&bridge, &client_key, response).await
}

/// Seal a downstream response for the caller
///
/// Replaces the response body with an envelope encrypted to the
/// caller's key, preserving the handler's status and remaining headers.
async fn seal_response(bridge: &ServerBridge, client_key: &str, response: Response) -> Response {
    let (mut parts, body) = response.into_parts();

    let bytes = match to_bytes(body, usize::MAX).await {
        Ok(bytes) => bytes,
        Err(err) => {
            tracing::error!("failed reading response body: {err}");
            return seal_failed();
        }
    };
    let plaintext = String::from_utf8_lossy(&bytes);

    let sealed = match bridge.keys().encrypt_with_key(client_key, &plaintext, None) {
        Ok(sealed) => sealed,
        Err(err) => {
            tracing::error!("error sealing response for caller: {err}");
            return seal_failed();
        }
    };
    let payload = match serde_json::to_vec(&Envelope::new(sealed)) {
        Ok(payload) => payload,
        Err(err) => {
            tracing::error!("error serializing response envelope: {err}");
            return seal_failed();
        }
    };

    parts.headers.remove(header::CONTENT_LENGTH);
    parts.headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("application/json"),
    );
    Response::from_parts(parts, Body::from(payload))
}

fn refuse() -> Response {
    (StatusCode::BAD_REQUEST, REFUSAL_BODY).into_response()
}

fn seal_failed() -> Response {
    (StatusCode::INTERNAL_SERVER_ERROR, RESPONSE_SEAL_FAILED_BODY).into_response()
}
