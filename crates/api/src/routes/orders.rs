//! Order routes for customers and merchants.

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    routing::{get, post, put},
};

use bazaar_core::OrderId;

use crate::db::OrderRepository;
use crate::error::Result;
use crate::middleware::{AuthUser, RequireCustomer, RequireMerchant};
use crate::models::PageQuery;
use crate::models::order::{CheckoutInput, Order, OrderFilter, UpdateStatusInput};
use crate::response::ApiResponse;
use crate::services::merchant_store;
use crate::services::orders::OrderService;
use crate::state::AppState;

/// Build the order router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_mine))
        .route("/checkout", post(checkout))
        .route("/merchant", get(list_for_store))
        .route("/{id}", get(show))
        .route("/{id}/status", put(update_status))
        .route("/{id}/cancel", post(cancel))
}

/// POST /api/v1/order/checkout
async fn checkout(
    RequireCustomer(user): RequireCustomer,
    State(state): State<AppState>,
    Json(input): Json<CheckoutInput>,
) -> Result<ApiResponse> {
    let placed = OrderService::new(&state).checkout(user.id, &input).await?;

    let response = ApiResponse::created("Order placed")
        .with("order", &placed.order)?
        .with("items", &placed.items)?;
    match placed.payment {
        Some(ref payment) => response.with("payment", payment),
        None => Ok(response),
    }
}

/// GET /api/v1/order
async fn list_mine(
    RequireCustomer(user): RequireCustomer,
    State(state): State<AppState>,
    Query(filter): Query<OrderFilter>,
) -> Result<ApiResponse> {
    let page = page_of(&filter);
    let (orders, total) = OrderRepository::new(state.pool())
        .list_for_customer(user.id, filter.status, &page)
        .await?;

    ApiResponse::ok("Orders")
        .with("orders", &orders)?
        .with_page(&page, total)
}

/// GET /api/v1/order/merchant
async fn list_for_store(
    RequireMerchant(user): RequireMerchant,
    State(state): State<AppState>,
    Query(filter): Query<OrderFilter>,
) -> Result<ApiResponse> {
    let store = merchant_store(state.pool(), user.id).await?;
    let page = page_of(&filter);
    let (orders, total) = OrderRepository::new(state.pool())
        .list_for_store(store.id, filter.status, &page)
        .await?;
    let orders: Vec<Order> = orders.into_iter().map(Order::without_otp).collect();

    ApiResponse::ok("Store orders")
        .with("orders", &orders)?
        .with_page(&page, total)
}

/// GET /api/v1/order/{id}
async fn show(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path(id): Path<OrderId>,
) -> Result<ApiResponse> {
    let detail = OrderService::new(&state).detail(&user, id).await?;

    let response = ApiResponse::ok("Order")
        .with("order", &detail.order)?
        .with("items", &detail.items)?;
    match detail.delivery {
        Some(ref delivery) => response.with("delivery", delivery),
        None => Ok(response),
    }
}

/// PUT /api/v1/order/{id}/status
async fn update_status(
    RequireMerchant(user): RequireMerchant,
    State(state): State<AppState>,
    Path(id): Path<OrderId>,
    Json(input): Json<UpdateStatusInput>,
) -> Result<ApiResponse> {
    let order = OrderService::new(&state)
        .update_status(user.id, id, input.status)
        .await?;
    ApiResponse::ok(format!("Order {}", order.status)).with("order", &order)
}

/// POST /api/v1/order/{id}/cancel
async fn cancel(
    RequireCustomer(user): RequireCustomer,
    State(state): State<AppState>,
    Path(id): Path<OrderId>,
) -> Result<ApiResponse> {
    let order = OrderService::new(&state).cancel(user.id, id).await?;
    ApiResponse::ok("Order cancelled").with("order", &order)
}

fn page_of(filter: &OrderFilter) -> bazaar_core::Pagination {
    PageQuery {
        page: filter.page,
        limit: filter.limit,
    }
    .pagination()
}
