//! Address lookups and map-link parsing.

use axum::{
    Json, Router,
    extract::{Query, State},
    routing::{get, post},
};
use serde::Deserialize;

use bazaar_core::{Coordinates, extract_coordinates, is_short_map_link};

use crate::error::{AppError, Result};
use crate::middleware::AuthUser;
use crate::response::ApiResponse;
use crate::routes::required_text;
use crate::services::maps::MapsError;
use crate::state::AppState;

/// Build the geocode router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(forward))
        .route("/reverse", get(reverse))
        .route("/extract", post(extract))
}

#[derive(Debug, Deserialize)]
struct AddressQuery {
    #[serde(default)]
    address: String,
}

#[derive(Debug, Deserialize)]
struct ReverseQuery {
    lat: f64,
    lng: f64,
}

#[derive(Debug, Deserialize)]
struct ExtractInput {
    url: String,
}

/// GET /api/v1/geocode?address=
async fn forward(
    AuthUser(_user): AuthUser,
    State(state): State<AppState>,
    Query(query): Query<AddressQuery>,
) -> Result<ApiResponse> {
    let address = required_text(&query.address, "address", 500)?;
    let place = state.maps()?.geocode(&address).await?;
    ApiResponse::ok("Location found").with("location", &place)
}

/// GET /api/v1/geocode/reverse?lat=&lng=
async fn reverse(
    AuthUser(_user): AuthUser,
    State(state): State<AppState>,
    Query(query): Query<ReverseQuery>,
) -> Result<ApiResponse> {
    let at = Coordinates::new(query.lat, query.lng)
        .map_err(|e| AppError::BadRequest(e.to_string()))?;
    let address = state.maps()?.reverse_geocode(at).await?;
    ApiResponse::ok("Address found").with("address", &address)
}

/// Coordinates from a shared map link.
///
/// Plain links are parsed locally. Short links need Google Maps configured
/// so the redirect can be followed.
///
/// POST /api/v1/geocode/extract
async fn extract(
    AuthUser(_user): AuthUser,
    State(state): State<AppState>,
    Json(input): Json<ExtractInput>,
) -> Result<ApiResponse> {
    let url = required_text(&input.url, "url", 2048)?;

    let at = match extract_coordinates(&url) {
        Some(at) => at,
        None if is_short_map_link(&url) => state.maps()?.extract_from_link(&url).await?,
        None => {
            return Err(
                MapsError::InvalidLink("no coordinates found in link".to_string()).into(),
            );
        }
    };

    ApiResponse::ok("Coordinates extracted").with("location", &at)
}
