//! The customer's cart. Holds one store's products at a time.

use axum::{
    Json, Router,
    extract::{Path, State},
    routing::{get, post, put},
};

use bazaar_core::{ProductId, UserId};

use crate::db::CartRepository;
use crate::error::{AppError, Result};
use crate::middleware::RequireCustomer;
use crate::models::cart::{AddItemInput, Cart, UpdateItemInput};
use crate::response::ApiResponse;
use crate::state::AppState;

/// Largest quantity of one product per cart line.
const MAX_QUANTITY: i32 = 100;

/// Build the cart router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(show).delete(clear))
        .route("/items", post(add_item))
        .route("/items/{product_id}", put(update_item).delete(remove_item))
}

/// GET /api/v1/cart
async fn show(
    RequireCustomer(user): RequireCustomer,
    State(state): State<AppState>,
) -> Result<ApiResponse> {
    let cart = load_cart(&state, user.id).await?;
    ApiResponse::ok("Cart").with("cart", &cart)
}

/// POST /api/v1/cart/items
async fn add_item(
    RequireCustomer(user): RequireCustomer,
    State(state): State<AppState>,
    Json(input): Json<AddItemInput>,
) -> Result<ApiResponse> {
    if !(1..=MAX_QUANTITY).contains(&input.quantity) {
        return Err(AppError::BadRequest(format!(
            "quantity must be between 1 and {MAX_QUANTITY}"
        )));
    }

    CartRepository::new(state.pool())
        .add_item(user.id, input.product_id, input.quantity, input.replace)
        .await?;

    let cart = load_cart(&state, user.id).await?;
    ApiResponse::ok("Item added to cart").with("cart", &cart)
}

/// Quantity 0 removes the line.
///
/// PUT /api/v1/cart/items/{product_id}
async fn update_item(
    RequireCustomer(user): RequireCustomer,
    State(state): State<AppState>,
    Path(product_id): Path<ProductId>,
    Json(input): Json<UpdateItemInput>,
) -> Result<ApiResponse> {
    if !(0..=MAX_QUANTITY).contains(&input.quantity) {
        return Err(AppError::BadRequest(format!(
            "quantity must be between 0 and {MAX_QUANTITY}"
        )));
    }

    CartRepository::new(state.pool())
        .set_quantity(user.id, product_id, input.quantity)
        .await?;

    let cart = load_cart(&state, user.id).await?;
    ApiResponse::ok("Cart updated").with("cart", &cart)
}

/// DELETE /api/v1/cart/items/{product_id}
async fn remove_item(
    RequireCustomer(user): RequireCustomer,
    State(state): State<AppState>,
    Path(product_id): Path<ProductId>,
) -> Result<ApiResponse> {
    CartRepository::new(state.pool())
        .remove(user.id, product_id)
        .await?;

    let cart = load_cart(&state, user.id).await?;
    ApiResponse::ok("Item removed from cart").with("cart", &cart)
}

/// DELETE /api/v1/cart
async fn clear(
    RequireCustomer(user): RequireCustomer,
    State(state): State<AppState>,
) -> Result<ApiResponse> {
    CartRepository::new(state.pool()).clear(user.id).await?;
    let cart = load_cart(&state, user.id).await?;
    ApiResponse::ok("Cart cleared").with("cart", &cart)
}

async fn load_cart(state: &AppState, user_id: UserId) -> Result<Cart> {
    let items = CartRepository::new(state.pool()).items(user_id).await?;
    Ok(Cart::from_items(
        items,
        state.config().marketplace.delivery_fee,
    ))
}
