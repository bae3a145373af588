//! Delivery partner routes, plus the merchant's assignment trigger.

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    routing::{get, post, put},
};

use bazaar_core::{DeliveryId, OrderId};

use crate::db::{DeliveryRepository, UserRepository};
use crate::error::Result;
use crate::middleware::{AuthUser, RequireDelivery, RequireMerchant};
use crate::models::PageQuery;
use crate::models::delivery::{CompleteInput, DeliveryFilter};
use crate::models::user::AvailabilityInput;
use crate::response::ApiResponse;
use crate::services::delivery::DeliveryService;
use crate::services::optional_coordinates;
use crate::state::AppState;

/// Build the delivery router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/availability", put(set_availability))
        .route("/assign/{order_id}", post(assign))
        .route("/mine", get(list_mine))
        .route("/{id}", get(show))
        .route("/{id}/pickup", post(pickup))
        .route("/{id}/complete", post(complete))
        .route("/{id}/reject", post(reject))
}

/// PUT /api/v1/delivery/availability
async fn set_availability(
    RequireDelivery(user): RequireDelivery,
    State(state): State<AppState>,
    Json(input): Json<AvailabilityInput>,
) -> Result<ApiResponse> {
    let location = optional_coordinates(input.latitude, input.longitude)?;
    let partner = UserRepository::new(state.pool())
        .set_availability(user.id, input.is_available, location)
        .await?;
    tracing::info!(partner_id = %user.id, available = input.is_available, "Availability changed");

    let message = if partner.is_available {
        "You are now available for deliveries"
    } else {
        "You are now offline"
    };
    ApiResponse::ok(message).with("user", &partner)
}

/// POST /api/v1/delivery/assign/{order_id}
async fn assign(
    RequireMerchant(user): RequireMerchant,
    State(state): State<AppState>,
    Path(order_id): Path<OrderId>,
) -> Result<ApiResponse> {
    let delivery = DeliveryService::new(&state)
        .assign_for_merchant(user.id, order_id)
        .await?;
    ApiResponse::created("Delivery partner assigned").with("delivery", &delivery)
}

/// GET /api/v1/delivery/mine
async fn list_mine(
    RequireDelivery(user): RequireDelivery,
    State(state): State<AppState>,
    Query(filter): Query<DeliveryFilter>,
) -> Result<ApiResponse> {
    let page = PageQuery {
        page: filter.page,
        limit: filter.limit,
    }
    .pagination();
    let (deliveries, total) = DeliveryRepository::new(state.pool())
        .list_for_partner(user.id, filter.status, &page)
        .await?;

    ApiResponse::ok("Deliveries")
        .with("deliveries", &deliveries)?
        .with_page(&page, total)
}

/// GET /api/v1/delivery/{id}
async fn show(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path(id): Path<DeliveryId>,
) -> Result<ApiResponse> {
    let delivery = DeliveryService::new(&state)
        .get_for(user.id, user.role, id)
        .await?;
    ApiResponse::ok("Delivery").with("delivery", &delivery)
}

/// POST /api/v1/delivery/{id}/pickup
async fn pickup(
    RequireDelivery(user): RequireDelivery,
    State(state): State<AppState>,
    Path(id): Path<DeliveryId>,
) -> Result<ApiResponse> {
    let (delivery, order) = DeliveryService::new(&state).pickup(user.id, id).await?;
    ApiResponse::ok("Order picked up")
        .with("delivery", &delivery)?
        .with("order", &order)
}

/// POST /api/v1/delivery/{id}/complete
async fn complete(
    RequireDelivery(user): RequireDelivery,
    State(state): State<AppState>,
    Path(id): Path<DeliveryId>,
    Json(input): Json<CompleteInput>,
) -> Result<ApiResponse> {
    let (delivery, order) = DeliveryService::new(&state)
        .complete(user.id, id, &input)
        .await?;
    ApiResponse::ok("Order delivered")
        .with("delivery", &delivery)?
        .with("order", &order)
}

/// POST /api/v1/delivery/{id}/reject
async fn reject(
    RequireDelivery(user): RequireDelivery,
    State(state): State<AppState>,
    Path(id): Path<DeliveryId>,
) -> Result<ApiResponse> {
    let rejection = DeliveryService::new(&state).reject(user.id, id).await?;

    let message = if rejection.reassigned.is_some() {
        "Delivery rejected; another partner was assigned"
    } else {
        "Delivery rejected; no other partner is available yet"
    };
    ApiResponse::ok(message)
        .with("delivery", &rejection.delivery)?
        .with("reassigned", &rejection.reassigned.is_some())?
        .with("new_delivery", &rejection.reassigned)
}
