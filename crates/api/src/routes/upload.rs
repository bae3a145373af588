//! Presigned image uploads.

use axum::{Json, Router, extract::State, routing::post};
use serde::Deserialize;

use crate::error::Result;
use crate::middleware::AuthUser;
use crate::response::ApiResponse;
use crate::routes::required_text;
use crate::state::AppState;

/// Build the upload router.
pub fn router() -> Router<AppState> {
    Router::new().route("/presign", post(presign))
}

#[derive(Debug, Deserialize)]
struct PresignInput {
    file_name: String,
    content_type: String,
    folder: String,
}

/// Presign a `PUT` the client uses to upload straight to the bucket.
///
/// POST /api/v1/upload/presign
async fn presign(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Json(input): Json<PresignInput>,
) -> Result<ApiResponse> {
    let file_name = required_text(&input.file_name, "file_name", 255)?;
    let upload = state
        .storage()?
        .presign_upload(user.id, &input.folder, input.content_type.trim())?;

    tracing::debug!(key = %upload.key, file_name = %file_name, "Upload presigned");
    ApiResponse::ok("Upload URL created").with("upload", &upload)
}
