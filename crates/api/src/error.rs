//! Unified error handling with Sentry integration.
//!
//! Provides a unified `AppError` type that captures server-side errors to
//! Sentry before responding with the failure envelope
//! `{ "success": false, "message": "..." }`. All route handlers return
//! `Result<T, AppError>`.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use bazaar_core::TransitionError;

use crate::db::RepositoryError;
use crate::response::error_body;
use crate::services::auth::AuthError;
use crate::services::maps::MapsError;
use crate::services::razorpay::PaymentError;
use crate::services::storage::StorageError;

/// Application-level error type for the API.
#[derive(Debug, Error)]
pub enum AppError {
    /// Database operation failed.
    #[error("Database error: {0}")]
    Database(#[from] RepositoryError),

    /// Authentication operation failed.
    #[error("Auth error: {0}")]
    Auth(#[from] AuthError),

    /// Razorpay operation failed.
    #[error("Payment error: {0}")]
    Payment(#[from] PaymentError),

    /// Google Maps operation failed.
    #[error("Maps error: {0}")]
    Maps(#[from] MapsError),

    /// Upload presigning failed.
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// Illegal status change.
    #[error("{0}")]
    Transition(#[from] TransitionError),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Missing or invalid credentials.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Authenticated, but not allowed.
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Bad request from client.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Request conflicts with current state.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// An optional integration is not configured.
    #[error("{0} is not configured")]
    Unavailable(&'static str),

    /// Rate limited.
    #[error("Rate limited")]
    RateLimited,

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// HTTP status for this error.
    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Database(err) => match err {
                RepositoryError::NotFound => StatusCode::NOT_FOUND,
                RepositoryError::Conflict(_) => StatusCode::CONFLICT,
                RepositoryError::Invalid(_) => StatusCode::BAD_REQUEST,
                RepositoryError::Database(_) | RepositoryError::DataCorruption(_) => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            },
            Self::Auth(err) => match err {
                AuthError::InvalidCredentials
                | AuthError::InvalidToken
                | AuthError::AccountDisabled => StatusCode::UNAUTHORIZED,
                AuthError::UserAlreadyExists => StatusCode::CONFLICT,
                AuthError::WeakPassword(_) | AuthError::InvalidEmail(_) | AuthError::Invalid(_) => {
                    StatusCode::BAD_REQUEST
                }
                AuthError::Repository(_) | AuthError::PasswordHash | AuthError::TokenCreation => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            },
            Self::Payment(err) => match err {
                PaymentError::InvalidSignature | PaymentError::InvalidAmount(_) => {
                    StatusCode::BAD_REQUEST
                }
                PaymentError::Http(_) | PaymentError::Api { .. } => StatusCode::BAD_GATEWAY,
            },
            Self::Maps(err) => match err {
                MapsError::NoResults => StatusCode::NOT_FOUND,
                MapsError::InvalidLink(_) => StatusCode::BAD_REQUEST,
                MapsError::Http(_) | MapsError::Api(_) => StatusCode::BAD_GATEWAY,
            },
            Self::Storage(err) => match err {
                StorageError::UnsupportedContentType(_) | StorageError::InvalidFolder(_) => {
                    StatusCode::BAD_REQUEST
                }
                StorageError::Signing(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::Transition(_) | Self::Conflict(_) => StatusCode::CONFLICT,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Client-facing message. Server-side details are never exposed.
    #[must_use]
    pub fn client_message(&self) -> String {
        match self {
            Self::Database(RepositoryError::NotFound) => "Resource not found".to_string(),
            Self::Database(RepositoryError::Conflict(msg) | RepositoryError::Invalid(msg)) => {
                msg.clone()
            }
            Self::Database(_) | Self::Internal(_) => "Internal server error".to_string(),
            Self::Auth(err) => match err {
                AuthError::InvalidCredentials => "Invalid email or password".to_string(),
                AuthError::InvalidToken => "Invalid or expired token".to_string(),
                AuthError::AccountDisabled => "Account is disabled".to_string(),
                AuthError::UserAlreadyExists => {
                    "An account with this email already exists".to_string()
                }
                AuthError::WeakPassword(msg) | AuthError::Invalid(msg) => msg.clone(),
                AuthError::InvalidEmail(e) => format!("Invalid email address: {e}"),
                AuthError::Repository(_) | AuthError::PasswordHash | AuthError::TokenCreation => {
                    "Authentication error".to_string()
                }
            },
            Self::Payment(err) => match err {
                PaymentError::InvalidSignature => "Payment signature verification failed".to_string(),
                PaymentError::InvalidAmount(msg) => msg.clone(),
                PaymentError::Http(_) | PaymentError::Api { .. } => {
                    "Payment provider error".to_string()
                }
            },
            Self::Maps(err) => match err {
                MapsError::NoResults => "No results found".to_string(),
                MapsError::InvalidLink(msg) => msg.clone(),
                MapsError::Http(_) | MapsError::Api(_) => "Maps service error".to_string(),
            },
            Self::Storage(err) => match err {
                StorageError::Signing(_) => "Internal server error".to_string(),
                other => other.to_string(),
            },
            Self::Transition(err) => err.to_string(),
            Self::NotFound(msg)
            | Self::Unauthorized(msg)
            | Self::Forbidden(msg)
            | Self::BadRequest(msg)
            | Self::Conflict(msg) => msg.clone(),
            Self::Unavailable(_) | Self::RateLimited => self.to_string(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        // Capture server errors to Sentry
        if status.is_server_error() && status != StatusCode::SERVICE_UNAVAILABLE {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Request error"
            );
        } else {
            tracing::debug!(error = %self, status = %status, "Request rejected");
        }

        error_body(status, &self.client_message())
    }
}

/// Result type alias for `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;

/// Set the Sentry user context from an authenticated user.
pub fn set_sentry_user(user_id: &impl ToString, email: Option<&str>) {
    sentry::configure_scope(|scope| {
        scope.set_user(Some(sentry::User {
            id: Some(user_id.to_string()),
            email: email.map(String::from),
            ..Default::default()
        }));
    });
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    async fn message_of(err: AppError) -> (StatusCode, serde_json::Value) {
        let response = err.into_response();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[test]
    fn test_app_error_status_codes() {
        assert_eq!(
            AppError::NotFound("x".into()).status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            AppError::Forbidden("x".into()).status(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            AppError::Conflict("x".into()).status(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            AppError::Database(RepositoryError::NotFound).status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            AppError::Database(RepositoryError::Conflict("dup".into())).status(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            AppError::Database(RepositoryError::Invalid("cart is empty".into())).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AppError::Auth(AuthError::UserAlreadyExists).status(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            AppError::Payment(PaymentError::InvalidSignature).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AppError::Maps(MapsError::NoResults).status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            AppError::Unavailable("Razorpay").status(),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(AppError::RateLimited.status(), StatusCode::TOO_MANY_REQUESTS);
    }

    #[test]
    fn test_transition_errors_are_conflicts() {
        let err = bazaar_core::OrderStatus::Delivered
            .transition(
                bazaar_core::OrderStatus::Placed,
                bazaar_core::UserRole::Merchant,
            )
            .unwrap_err();
        let err = AppError::from(err);
        assert_eq!(err.status(), StatusCode::CONFLICT);
        assert_eq!(err.client_message(), "cannot move from delivered to placed");
    }

    #[tokio::test]
    async fn test_internal_details_are_hidden() {
        let (status, body) =
            message_of(AppError::Internal("db password is hunter2".into())).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["success"], false);
        assert_eq!(body["message"], "Internal server error");
    }

    #[tokio::test]
    async fn test_client_errors_keep_message() {
        let (status, body) = message_of(AppError::BadRequest("quantity must be positive".into())).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "quantity must be positive");
    }
}
