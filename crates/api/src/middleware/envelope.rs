//! Wrap framework-generated failures in the JSON envelope.
//!
//! Extractor rejections (bad JSON, bad path or query parameters), unknown
//! routes, wrong methods and rate-limit answers come out of axum and
//! `tower_governor` as plain text. Clients expect
//! `{ "success": false, "message": ... }` for every failure, and a body
//! that fails validation is a 400 whether serde or a handler caught it.

use axum::{
    body::to_bytes,
    http::{
        StatusCode,
        header::{CONTENT_LENGTH, CONTENT_TYPE},
    },
    response::Response,
};

use crate::response::error_body;

/// Largest plain-text body reused as the message.
const MAX_MESSAGE_BYTES: usize = 4096;

fn is_json(response: &Response) -> bool {
    response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.starts_with("application/json"))
}

/// Rewrite non-JSON error responses into the envelope, keeping status and
/// headers such as `retry-after` and `x-request-id`.
pub async fn envelope_rejections(response: Response) -> Response {
    let status = response.status();
    if !(status.is_client_error() || status.is_server_error()) || is_json(&response) {
        return response;
    }

    let (parts, body) = response.into_parts();
    let bytes = to_bytes(body, MAX_MESSAGE_BYTES).await.unwrap_or_default();
    let text = String::from_utf8_lossy(&bytes);
    let text = text.trim();
    let message = if text.is_empty() {
        status.canonical_reason().unwrap_or("Request failed")
    } else {
        text
    };

    let status = if status == StatusCode::UNPROCESSABLE_ENTITY {
        StatusCode::BAD_REQUEST
    } else {
        status
    };
    let mut wrapped = error_body(status, message);
    for (name, value) in &parts.headers {
        if name != CONTENT_TYPE && name != CONTENT_LENGTH {
            wrapped.headers_mut().insert(name.clone(), value.clone());
        }
    }
    wrapped
}
