//! Store routes: public browsing plus the merchant's own store.

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    routing::get,
};

use bazaar_core::{StoreId, UserId};

use crate::db::stores::StoreSearch;
use crate::db::{ProductRepository, StoreRepository};
use crate::error::{AppError, Result};
use crate::middleware::RequireMerchant;
use crate::models::PageQuery;
use crate::models::non_blank;
use crate::models::product::ProductFilter;
use crate::models::store::{CreateStoreInput, Store, StoreFilter, UpdateStoreInput};
use crate::response::ApiResponse;
use crate::routes::{check_length, required_text};
use crate::services::{merchant_store, optional_coordinates};
use crate::state::AppState;

/// Search radius when `lat`/`lng` are given without `radius_km`.
const DEFAULT_RADIUS_KM: f64 = 10.0;
const MAX_RADIUS_KM: f64 = 100.0;

/// Build the store router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list).post(create))
        .route("/mine", get(mine))
        .route("/{id}", get(show).put(update).delete(remove))
        .route("/{id}/products", get(products))
}

/// POST /api/v1/store
async fn create(
    RequireMerchant(user): RequireMerchant,
    State(state): State<AppState>,
    Json(input): Json<CreateStoreInput>,
) -> Result<ApiResponse> {
    let location = optional_coordinates(input.latitude, input.longitude)?;
    let input = CreateStoreInput {
        name: required_text(&input.name, "name", 100)?,
        address: required_text(&input.address, "address", 500)?,
        description: non_blank(input.description.as_deref()),
        category: non_blank(input.category.as_deref()),
        phone: non_blank(input.phone.as_deref()),
        image_url: non_blank(input.image_url.as_deref()),
        latitude: location.map(|c| c.latitude),
        longitude: location.map(|c| c.longitude),
    };
    check_length(input.description.as_deref(), "description", 2000)?;

    let store = StoreRepository::new(state.pool())
        .create(user.id, &input)
        .await?;
    tracing::info!(store_id = %store.id, owner_id = %user.id, "Store created");

    ApiResponse::created("Store created").with("store", &store)
}

/// GET /api/v1/store
async fn list(
    State(state): State<AppState>,
    Query(filter): Query<StoreFilter>,
) -> Result<ApiResponse> {
    let origin = optional_coordinates(filter.lat, filter.lng)?;
    let radius = filter.radius_km.unwrap_or(DEFAULT_RADIUS_KM);
    if !(radius > 0.0 && radius <= MAX_RADIUS_KM) {
        return Err(AppError::BadRequest(format!(
            "radius_km must be between 0 and {MAX_RADIUS_KM}"
        )));
    }

    let page = PageQuery {
        page: filter.page,
        limit: filter.limit,
    }
    .pagination();
    let search = StoreSearch {
        query: non_blank(filter.q.as_deref()),
        category: non_blank(filter.category.as_deref()),
        near: origin.map(|o| (o, radius)),
    };
    let (stores, total) = StoreRepository::new(state.pool())
        .search(&search, &page)
        .await?;

    ApiResponse::ok("Stores")
        .with("stores", &stores)?
        .with_page(&page, total)
}

/// GET /api/v1/store/mine
async fn mine(
    RequireMerchant(user): RequireMerchant,
    State(state): State<AppState>,
) -> Result<ApiResponse> {
    let store = merchant_store(state.pool(), user.id).await?;
    ApiResponse::ok("Your store").with("store", &store)
}

/// GET /api/v1/store/{id}
async fn show(State(state): State<AppState>, Path(id): Path<StoreId>) -> Result<ApiResponse> {
    let store = find_store(&state, id).await?;
    ApiResponse::ok("Store").with("store", &store)
}

/// PUT /api/v1/store/{id}
async fn update(
    RequireMerchant(user): RequireMerchant,
    State(state): State<AppState>,
    Path(id): Path<StoreId>,
    Json(input): Json<UpdateStoreInput>,
) -> Result<ApiResponse> {
    owned_store(&state, id, user.id).await?;

    let location = optional_coordinates(input.latitude, input.longitude)?;
    let input = UpdateStoreInput {
        name: input
            .name
            .as_deref()
            .map(|n| required_text(n, "name", 100))
            .transpose()?,
        address: input
            .address
            .as_deref()
            .map(|a| required_text(a, "address", 500))
            .transpose()?,
        description: non_blank(input.description.as_deref()),
        category: non_blank(input.category.as_deref()),
        phone: non_blank(input.phone.as_deref()),
        image_url: non_blank(input.image_url.as_deref()),
        latitude: location.map(|c| c.latitude),
        longitude: location.map(|c| c.longitude),
        is_open: input.is_open,
    };
    check_length(input.description.as_deref(), "description", 2000)?;

    let store = StoreRepository::new(state.pool()).update(id, &input).await?;
    ApiResponse::ok("Store updated").with("store", &store)
}

/// DELETE /api/v1/store/{id}
async fn remove(
    RequireMerchant(user): RequireMerchant,
    State(state): State<AppState>,
    Path(id): Path<StoreId>,
) -> Result<ApiResponse> {
    owned_store(&state, id, user.id).await?;
    StoreRepository::new(state.pool()).delete(id).await?;
    tracing::info!(store_id = %id, "Store deleted");
    Ok(ApiResponse::ok("Store deleted"))
}

/// GET /api/v1/store/{id}/products
async fn products(
    State(state): State<AppState>,
    Path(id): Path<StoreId>,
    Query(page): Query<PageQuery>,
) -> Result<ApiResponse> {
    find_store(&state, id).await?;

    let page = page.pagination();
    let filter = ProductFilter {
        store_id: Some(id),
        ..Default::default()
    };
    let (products, total) = ProductRepository::new(state.pool())
        .search(&filter, &page)
        .await?;

    ApiResponse::ok("Store products")
        .with("products", &products)?
        .with_page(&page, total)
}

async fn find_store(state: &AppState, id: StoreId) -> Result<Store> {
    StoreRepository::new(state.pool())
        .get(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Store {id} not found")))
}

/// The store, if `owner` owns it.
async fn owned_store(state: &AppState, id: StoreId, owner: UserId) -> Result<Store> {
    let store = find_store(state, id).await?;
    if store.owner_id != owner {
        return Err(AppError::Forbidden("You do not own this store".to_string()));
    }
    Ok(store)
}
