//! Uniform JSON envelope for successful responses.
//!
//! Every endpoint answers with `{ "success": true, "message": "...", ...data }`.
//! Errors use the same shape with `success: false` (see [`crate::error`]).

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use serde_json::{Map, Value};

use bazaar_core::{PageMeta, Pagination};

use crate::error::{AppError, Result};

/// Successful API response builder.
///
/// ```rust,ignore
/// Ok(ApiResponse::created("Store created").with("store", &store)?)
/// ```
#[derive(Debug)]
pub struct ApiResponse {
    status: StatusCode,
    message: String,
    data: Map<String, Value>,
}

impl ApiResponse {
    /// 200 OK with a message.
    #[must_use]
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::OK,
            message: message.into(),
            data: Map::new(),
        }
    }

    /// 201 Created with a message.
    #[must_use]
    pub fn created(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::CREATED,
            ..Self::ok(message)
        }
    }

    /// Attach a top-level data key.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Internal` if `value` cannot be serialized.
    pub fn with<T: Serialize + ?Sized>(mut self, key: &str, value: &T) -> Result<Self> {
        let value = serde_json::to_value(value)
            .map_err(|e| AppError::Internal(format!("failed to serialize {key}: {e}")))?;
        self.data.insert(key.to_string(), value);
        Ok(self)
    }

    /// Attach a `pagination` block for `total` rows.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Internal` if serialization fails.
    pub fn with_page(self, pagination: &Pagination, total: i64) -> Result<Self> {
        let meta: PageMeta = pagination.meta(total);
        self.with("pagination", &meta)
    }

    /// Response status code.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        self.status
    }
}

impl IntoResponse for ApiResponse {
    fn into_response(self) -> Response {
        let mut body = Map::with_capacity(self.data.len() + 2);
        body.insert("success".to_string(), Value::Bool(true));
        body.insert("message".to_string(), Value::String(self.message));
        // Data keys never shadow the envelope fields.
        for (key, value) in self.data {
            if key != "success" && key != "message" {
                body.insert(key, value);
            }
        }
        (self.status, Json(Value::Object(body))).into_response()
    }
}

/// Build the failure envelope.
pub fn error_body(status: StatusCode, message: &str) -> Response {
    (
        status,
        Json(serde_json::json!({ "success": false, "message": message })),
    )
        .into_response()
}
