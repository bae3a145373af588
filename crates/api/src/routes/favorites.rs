//! Customer favorites.

use axum::{
    Router,
    extract::{Path, Query, State},
    routing::{get, post},
};

use bazaar_core::ProductId;

use crate::db::FavoriteRepository;
use crate::error::Result;
use crate::middleware::RequireCustomer;
use crate::models::PageQuery;
use crate::response::ApiResponse;
use crate::state::AppState;

/// Build the favorites router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list))
        .route("/{product_id}", post(add).delete(remove))
}

/// GET /api/v1/favorite
async fn list(
    RequireCustomer(user): RequireCustomer,
    State(state): State<AppState>,
    Query(page): Query<PageQuery>,
) -> Result<ApiResponse> {
    let page = page.pagination();
    let (favorites, total) = FavoriteRepository::new(state.pool())
        .list(user.id, &page)
        .await?;

    ApiResponse::ok("Favorites")
        .with("favorites", &favorites)?
        .with_page(&page, total)
}

/// Adding twice is fine.
///
/// POST /api/v1/favorite/{product_id}
async fn add(
    RequireCustomer(user): RequireCustomer,
    State(state): State<AppState>,
    Path(product_id): Path<ProductId>,
) -> Result<ApiResponse> {
    FavoriteRepository::new(state.pool())
        .add(user.id, product_id)
        .await?;
    ApiResponse::ok("Added to favorites").with("product_id", &product_id)
}

/// DELETE /api/v1/favorite/{product_id}
async fn remove(
    RequireCustomer(user): RequireCustomer,
    State(state): State<AppState>,
    Path(product_id): Path<ProductId>,
) -> Result<ApiResponse> {
    FavoriteRepository::new(state.pool())
        .remove(user.id, product_id)
        .await?;
    ApiResponse::ok("Removed from favorites").with("product_id", &product_id)
}
