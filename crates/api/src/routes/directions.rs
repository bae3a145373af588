//! Driving directions between two points.

use axum::{
    Router,
    extract::{Query, State},
    routing::get,
};
use serde::Deserialize;

use bazaar_core::Coordinates;

use crate::error::{AppError, Result};
use crate::middleware::AuthUser;
use crate::response::ApiResponse;
use crate::state::AppState;

/// Build the directions router.
pub fn router() -> Router<AppState> {
    Router::new().route("/", get(route))
}

#[derive(Debug, Deserialize)]
struct DirectionsQuery {
    origin: String,
    destination: String,
}

/// GET /api/v1/directions?origin=lat,lng&destination=lat,lng
async fn route(
    AuthUser(_user): AuthUser,
    State(state): State<AppState>,
    Query(query): Query<DirectionsQuery>,
) -> Result<ApiResponse> {
    let origin = parse_point(&query.origin, "origin")?;
    let destination = parse_point(&query.destination, "destination")?;

    let route = state.maps()?.directions(origin, destination).await?;
    ApiResponse::ok("Route found").with("route", &route)
}

fn parse_point(value: &str, field: &str) -> Result<Coordinates> {
    value
        .parse()
        .map_err(|e| AppError::BadRequest(format!("{field}: {e}")))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_point() {
        let at = parse_point("12.97, 77.59", "origin").unwrap();
        assert!((at.latitude - 12.97).abs() < 1e-9);

        let err = parse_point("12.97", "origin").unwrap_err();
        assert_eq!(err.client_message(), "origin: expected \"lat,lng\"");

        assert!(parse_point("91,0", "destination").is_err());
    }
}
