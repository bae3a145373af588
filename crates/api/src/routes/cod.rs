//! Cash-on-delivery collections.

use axum::{
    Router,
    extract::{Path, Query, State},
    routing::{get, post},
};

use bazaar_core::{OrderId, Pagination};

use crate::db::{CodRepository, OrderRepository};
use crate::error::{AppError, Result};
use crate::middleware::{RequireDelivery, RequireMerchant};
use crate::models::PageQuery;
use crate::models::cod::CodFilter;
use crate::response::ApiResponse;
use crate::services::merchant_store;
use crate::state::AppState;

/// Build the COD router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/mine", get(list_mine))
        .route("/store", get(list_for_store))
        .route("/{order_id}/confirm", post(confirm))
}

/// A partner's collections plus the cash still to hand over.
///
/// GET /api/v1/cod/mine
async fn list_mine(
    RequireDelivery(user): RequireDelivery,
    State(state): State<AppState>,
    Query(filter): Query<CodFilter>,
) -> Result<ApiResponse> {
    let page = page_of(&filter);
    let repo = CodRepository::new(state.pool());
    let (collections, total) = repo
        .list_for_partner(user.id, filter.status, &page)
        .await?;
    let outstanding = repo.outstanding_for_partner(user.id).await?;

    ApiResponse::ok("Cash collections")
        .with("collections", &collections)?
        .with("outstanding_amount", &outstanding)?
        .with_page(&page, total)
}

/// GET /api/v1/cod/store
async fn list_for_store(
    RequireMerchant(user): RequireMerchant,
    State(state): State<AppState>,
    Query(filter): Query<CodFilter>,
) -> Result<ApiResponse> {
    let store = merchant_store(state.pool(), user.id).await?;
    let page = page_of(&filter);
    let (collections, total) = CodRepository::new(state.pool())
        .list_for_store(store.id, filter.status, &page)
        .await?;

    ApiResponse::ok("Cash collections")
        .with("collections", &collections)?
        .with_page(&page, total)
}

/// Merchant received the cash from the partner.
///
/// POST /api/v1/cod/{order_id}/confirm
async fn confirm(
    RequireMerchant(user): RequireMerchant,
    State(state): State<AppState>,
    Path(order_id): Path<OrderId>,
) -> Result<ApiResponse> {
    let store = merchant_store(state.pool(), user.id).await?;
    let order = OrderRepository::new(state.pool())
        .get(order_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Order {order_id} not found")))?;
    if order.store_id != store.id {
        return Err(AppError::Forbidden(
            "This order belongs to another store".to_string(),
        ));
    }

    let collection = CodRepository::new(state.pool()).confirm(order_id).await?;
    tracing::info!(order_id = %order_id, amount = %collection.amount, "Cash collection confirmed");

    ApiResponse::ok("Cash collection confirmed").with("collection", &collection)
}

fn page_of(filter: &CodFilter) -> Pagination {
    PageQuery {
        page: filter.page,
        limit: filter.limit,
    }
    .pagination()
}
