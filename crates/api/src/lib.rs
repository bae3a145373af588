//! Bazaar marketplace API.
//!
//! REST backend for a three-sided marketplace: customers order from local
//! stores, merchants run those stores, delivery partners carry the orders.
//! Exposed as a library so the binary, the CLI and the integration tests
//! build the same router.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod response;
pub mod routes;
pub mod services;
pub mod state;

use axum::{
    Router,
    extract::{Request, State},
    http::{HeaderValue, Method, StatusCode, header},
    response::{IntoResponse, Response},
    routing::get,
};
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    trace::TraceLayer,
};

use crate::error::AppError;
use crate::middleware::request_id::REQUEST_ID_HEADER;
use crate::middleware::{envelope_rejections, request_id_middleware};
use crate::response::{ApiResponse, error_body};
use crate::state::AppState;

/// Build the full application router with every layer applied.
///
/// Sentry layers are outermost so the hub covers the whole request.
pub fn app(state: AppState) -> Router {
    let timeout = state.config().request_timeout;
    let cors = cors_layer(state.config().cors_allowed_origins.as_deref());

    Router::new()
        .route("/health", get(health))
        .route("/health/ready", get(readiness))
        .merge(routes::routes(timeout))
        .fallback(not_found)
        .layer(axum::middleware::from_fn(request_id_middleware))
        .layer(TraceLayer::new_for_http().make_span_with(|request: &Request| {
            tracing::info_span!(
                "request",
                method = %request.method(),
                path = %request.uri().path(),
                request_id = tracing::field::Empty,
                user_id = tracing::field::Empty,
            )
        }))
        .layer(cors)
        .layer(axum::middleware::map_response(envelope_rejections))
        .with_state(state)
        .layer(sentry_tower::NewSentryLayer::new_from_top())
        .layer(sentry_tower::SentryHttpLayer::new().enable_transaction())
}

/// `None` allows any origin; otherwise only the listed ones.
fn cors_layer(origins: Option<&[String]>) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([
            header::AUTHORIZATION,
            header::CONTENT_TYPE,
            header::HeaderName::from_static(REQUEST_ID_HEADER),
        ])
        .expose_headers([header::HeaderName::from_static(REQUEST_ID_HEADER)]);

    match origins {
        None => layer.allow_origin(Any),
        Some(origins) => {
            let allowed: Vec<HeaderValue> = origins
                .iter()
                .filter_map(|origin| match HeaderValue::from_str(origin) {
                    Ok(value) => Some(value),
                    Err(_) => {
                        tracing::warn!(origin = %origin, "Ignoring invalid CORS origin");
                        None
                    }
                })
                .collect();
            layer.allow_origin(AllowOrigin::list(allowed))
        }
    }
}

/// Liveness. Does not touch dependencies.
async fn health() -> ApiResponse {
    ApiResponse::ok("ok")
}

/// Readiness: 503 when the database is unreachable.
async fn readiness(State(state): State<AppState>) -> Response {
    match sqlx::query("SELECT 1").fetch_one(state.pool()).await {
        Ok(_) => ApiResponse::ok("ready").into_response(),
        Err(e) => {
            tracing::warn!(error = %e, "Readiness check failed");
            error_body(StatusCode::SERVICE_UNAVAILABLE, "Database unavailable")
        }
    }
}

async fn not_found(request: Request) -> AppError {
    AppError::NotFound(format!("No route for {} {}", request.method(), request.uri().path()))
}
