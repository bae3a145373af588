//! Razorpay payment routes: order creation, checkout verification and the
//! webhook.

use axum::{
    Json, Router,
    body::Bytes,
    extract::{Path, State},
    http::HeaderMap,
    routing::{get, post},
};
use tracing::{info, warn};

use bazaar_core::{OrderId, OrderStatus, PaymentMethod, PaymentStatus, UserId};

use crate::db::{OrderRepository, PaymentRepository};
use crate::error::{AppError, Result};
use crate::middleware::RequireCustomer;
use crate::models::order::Order;
use crate::models::payment::{CreatePaymentInput, VerifyPaymentInput};
use crate::response::ApiResponse;
use crate::services::orders::OrderService;
use crate::services::razorpay::{PaymentError, WebhookEvent};
use crate::state::AppState;

/// Header carrying the webhook HMAC.
const SIGNATURE_HEADER: &str = "x-razorpay-signature";

/// Build the payment router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/create-order", post(create_order))
        .route("/verify", post(verify))
        .route("/webhook/razorpay", post(webhook))
        .route("/order/{order_id}", get(list_for_order))
}

/// POST /api/v1/payment/create-order
async fn create_order(
    RequireCustomer(user): RequireCustomer,
    State(state): State<AppState>,
    Json(input): Json<CreatePaymentInput>,
) -> Result<ApiResponse> {
    state.require_razorpay()?;
    let order = own_order(&state, user.id, input.order_id).await?;

    if order.payment_method != PaymentMethod::Online {
        return Err(AppError::BadRequest(
            "This order is paid by cash on delivery".to_string(),
        ));
    }
    if !matches!(
        order.payment_status,
        PaymentStatus::Pending | PaymentStatus::Failed
    ) {
        return Err(AppError::Conflict(format!(
            "Order payment is already {}",
            order.payment_status
        )));
    }
    if matches!(order.status, OrderStatus::Cancelled | OrderStatus::Rejected) {
        return Err(AppError::Conflict(format!("Order is {}", order.status)));
    }

    let payment = OrderService::new(&state).create_payment(&order).await?;
    ApiResponse::created("Payment order created").with("payment", &payment)
}

/// Check the signature Razorpay checkout handed back to the client.
///
/// POST /api/v1/payment/verify
async fn verify(
    RequireCustomer(user): RequireCustomer,
    State(state): State<AppState>,
    Json(input): Json<VerifyPaymentInput>,
) -> Result<ApiResponse> {
    let razorpay = state.require_razorpay()?;
    let payments = PaymentRepository::new(state.pool());

    let payment = payments
        .get_by_provider_order(&input.razorpay_order_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Payment not found".to_string()))?;
    own_order(&state, user.id, payment.order_id).await?;

    if let Err(e) = razorpay.verify_payment_signature(
        &input.razorpay_order_id,
        &input.razorpay_payment_id,
        &input.razorpay_signature,
    ) {
        warn!(order_id = %payment.order_id, "Payment signature mismatch");
        // The payment ID is unverified here, so it is not stored.
        payments
            .mark_failed(&input.razorpay_order_id, None, "checkout.signature_mismatch")
            .await?;
        return Err(e.into());
    }

    let payment = payments
        .mark_captured(
            &input.razorpay_order_id,
            &input.razorpay_payment_id,
            "checkout.verified",
        )
        .await?
        .ok_or_else(|| AppError::NotFound("Payment not found".to_string()))?;
    info!(order_id = %payment.order_id, "Payment verified");

    if OrderService::new(&state)
        .refund_if_closed(payment.order_id)
        .await?
    {
        let payment = payments
            .get_by_provider_order(&input.razorpay_order_id)
            .await?
            .unwrap_or(payment);
        return ApiResponse::ok("Payment verified and refunded, the order is closed")
            .with("payment", &payment);
    }

    ApiResponse::ok("Payment verified").with("payment", &payment)
}

/// Razorpay event callback. Authenticated by HMAC over the raw body only.
///
/// POST /api/v1/payment/webhook/razorpay
async fn webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<ApiResponse> {
    let razorpay = state.require_razorpay()?;
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or(PaymentError::InvalidSignature)?;
    razorpay.verify_webhook_signature(&body, signature)?;

    let event: WebhookEvent = serde_json::from_slice(&body)
        .map_err(|e| AppError::BadRequest(format!("Invalid webhook payload: {e}")))?;
    let payments = PaymentRepository::new(state.pool());

    let applied = match event.event.as_str() {
        "payment.captured" => match event.payload.payment.map(|w| w.entity) {
            Some(payment) => match payment.order_id {
                Some(ref order_id) => {
                    match payments
                        .mark_captured(order_id, &payment.id, &event.event)
                        .await?
                    {
                        Some(captured) => {
                            OrderService::new(&state)
                                .refund_if_closed(captured.order_id)
                                .await?;
                            true
                        }
                        None => false,
                    }
                }
                None => false,
            },
            None => false,
        },
        "payment.failed" => match event.payload.payment.map(|w| w.entity) {
            Some(payment) => match payment.order_id {
                Some(ref order_id) => payments
                    .mark_failed(order_id, Some(&payment.id), &event.event)
                    .await?
                    .is_some(),
                None => false,
            },
            None => false,
        },
        "refund.processed" => match event.payload.refund.map(|w| w.entity) {
            Some(refund) => payments
                .mark_refunded(&refund.payment_id, &event.event)
                .await?
                .is_some(),
            None => false,
        },
        other => {
            info!(event = %other, "Ignoring Razorpay event");
            return Ok(ApiResponse::ok("Event ignored"));
        }
    };

    if applied {
        info!(event = %event.event, "Razorpay webhook applied");
    } else {
        warn!(event = %event.event, "Razorpay webhook matched no payment");
    }
    Ok(ApiResponse::ok("Webhook processed"))
}

/// GET /api/v1/payment/order/{order_id}
async fn list_for_order(
    RequireCustomer(user): RequireCustomer,
    State(state): State<AppState>,
    Path(order_id): Path<OrderId>,
) -> Result<ApiResponse> {
    own_order(&state, user.id, order_id).await?;
    let payments = PaymentRepository::new(state.pool())
        .list_for_order(order_id)
        .await?;
    ApiResponse::ok("Payments").with("payments", &payments)
}

async fn own_order(state: &AppState, customer: UserId, id: OrderId) -> Result<Order> {
    let order = OrderRepository::new(state.pool())
        .get(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Order {id} not found")))?;
    if order.customer_id != customer {
        return Err(AppError::Forbidden(
            "This order belongs to another customer".to_string(),
        ));
    }
    Ok(order)
}
