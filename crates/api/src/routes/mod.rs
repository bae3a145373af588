//! HTTP route handlers for the marketplace API.
//!
//! # Route Structure
//!
//! ```text
//! GET  /health                                 - Liveness
//! GET  /health/ready                           - Database reachable
//!
//! # Users
//! POST /api/v1/user/register                   - Create account, returns token
//! POST /api/v1/user/login                      - Exchange credentials for a token
//! GET  /api/v1/user/me                         - Current profile
//! PUT  /api/v1/user/me                         - Update profile
//!
//! # Stores
//! GET  /api/v1/store                           - Search / nearby stores
//! POST /api/v1/store                           - Create (merchant)
//! GET  /api/v1/store/mine                      - Own store (merchant)
//! GET  /api/v1/store/{id}                      - Store detail
//! PUT  /api/v1/store/{id}                      - Update (owner)
//! DELETE /api/v1/store/{id}                    - Close down (owner)
//! GET  /api/v1/store/{id}/products             - Store catalogue
//!
//! # Products
//! GET  /api/v1/product                         - Search products
//! POST /api/v1/product                         - Create (merchant)
//! GET  /api/v1/product/{id}                    - Product detail
//! PUT  /api/v1/product/{id}                    - Update (owner)
//! DELETE /api/v1/product/{id}                  - Deactivate (owner)
//!
//! # Cart (customer)
//! GET  /api/v1/cart                            - Cart with totals
//! DELETE /api/v1/cart                          - Empty the cart
//! POST /api/v1/cart/items                      - Add a product
//! PUT  /api/v1/cart/items/{product_id}         - Set quantity
//! DELETE /api/v1/cart/items/{product_id}       - Remove a product
//!
//! # Orders
//! POST /api/v1/order/checkout                  - Place order from cart (customer)
//! GET  /api/v1/order                           - Own orders (customer)
//! GET  /api/v1/order/merchant                  - Store orders (merchant)
//! GET  /api/v1/order/{id}                      - Order detail (participants)
//! PUT  /api/v1/order/{id}/status               - Advance status (merchant)
//! POST /api/v1/order/{id}/cancel               - Cancel (customer)
//!
//! # Delivery (delivery partner unless noted)
//! PUT  /api/v1/delivery/availability           - Go on/off duty
//! POST /api/v1/delivery/assign/{order_id}      - Auto-assign a partner (merchant)
//! GET  /api/v1/delivery/mine                   - Own deliveries
//! GET  /api/v1/delivery/{id}                   - Delivery detail
//! POST /api/v1/delivery/{id}/pickup            - Picked up at the store
//! POST /api/v1/delivery/{id}/complete          - Handed over (OTP)
//! POST /api/v1/delivery/{id}/reject            - Decline, triggers reassignment
//!
//! # Payments
//! POST /api/v1/payment/create-order            - Razorpay order for checkout
//! POST /api/v1/payment/verify                  - Verify checkout signature
//! POST /api/v1/payment/webhook/razorpay        - Razorpay webhook (no auth)
//! GET  /api/v1/payment/order/{order_id}        - Payments for an order
//!
//! # Cash on delivery
//! GET  /api/v1/cod/mine                        - Own collections (delivery)
//! GET  /api/v1/cod/store                       - Store collections (merchant)
//! POST /api/v1/cod/{order_id}/confirm          - Cash received (merchant)
//!
//! # Settlements (merchant)
//! POST /api/v1/settlement/generate             - Settle a period
//! GET  /api/v1/settlement                      - List
//! GET  /api/v1/settlement/{id}                 - Detail with orders
//!
//! # Favorites (customer)
//! GET  /api/v1/favorite                        - List
//! POST /api/v1/favorite/{product_id}           - Add
//! DELETE /api/v1/favorite/{product_id}         - Remove
//!
//! # Maps and uploads (any signed-in user)
//! POST /api/v1/upload/presign                  - Presigned image upload
//! GET  /api/v1/geocode?address=                - Forward geocode
//! GET  /api/v1/geocode/reverse?lat=&lng=       - Reverse geocode
//! POST /api/v1/geocode/extract                 - Coordinates from a map link
//! GET  /api/v1/directions?origin=&destination= - Driving route
//! ```

pub mod cart;
pub mod cod;
pub mod delivery;
pub mod directions;
pub mod favorites;
pub mod geocode;
pub mod orders;
pub mod payments;
pub mod products;
pub mod settlements;
pub mod stores;
pub mod upload;
pub mod user;

use std::time::Duration;

use axum::{Router, middleware};

use crate::error::AppError;
use crate::middleware::timeout_middleware;
use crate::state::AppState;

/// All `/api/v1` route groups, each bounded by `timeout`.
pub fn routes(timeout: Duration) -> Router<AppState> {
    let groups: [(&str, Router<AppState>); 13] = [
        ("/api/v1/user", user::router()),
        ("/api/v1/store", stores::router()),
        ("/api/v1/product", products::router()),
        ("/api/v1/cart", cart::router()),
        ("/api/v1/order", orders::router()),
        ("/api/v1/delivery", delivery::router()),
        ("/api/v1/payment", payments::router()),
        ("/api/v1/cod", cod::router()),
        ("/api/v1/settlement", settlements::router()),
        ("/api/v1/favorite", favorites::router()),
        ("/api/v1/upload", upload::router()),
        ("/api/v1/geocode", geocode::router()),
        ("/api/v1/directions", directions::router()),
    ];

    groups
        .into_iter()
        .fold(Router::new(), |router, (prefix, group)| {
            router.nest(
                prefix,
                group.layer(middleware::from_fn_with_state(timeout, timeout_middleware)),
            )
        })
}

/// Trim a required text field and enforce its length in characters.
pub(crate) fn required_text(value: &str, field: &str, max: usize) -> Result<String, AppError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(AppError::BadRequest(format!("{field} is required")));
    }
    check_length(Some(value), field, max)?;
    Ok(value.to_string())
}

/// Reject optional text longer than `max` characters.
pub(crate) fn check_length(value: Option<&str>, field: &str, max: usize) -> Result<(), AppError> {
    match value {
        Some(v) if v.chars().count() > max => Err(AppError::BadRequest(format!(
            "{field} must be at most {max} characters"
        ))),
        _ => Ok(()),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_required_text_trims() {
        assert_eq!(required_text("  Chai Point ", "name", 100).unwrap(), "Chai Point");
    }

    #[test]
    fn test_required_text_rejects_blank() {
        let err = required_text("   ", "name", 100).unwrap_err();
        assert_eq!(err.client_message(), "name is required");
    }

    #[test]
    fn test_length_counts_characters() {
        // Four characters, twelve bytes.
        assert!(check_length(Some("नमस्"), "name", 4).is_ok());
        assert!(check_length(Some("abcde"), "name", 4).is_err());
        assert!(check_length(None, "name", 0).is_ok());
    }
}
