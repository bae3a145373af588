//! Payment domain types.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use bazaar_core::{OrderId, PaymentId, ProviderPaymentStatus};

/// A Razorpay order created for one of our orders.
#[derive(Debug, Clone, Serialize)]
pub struct Payment {
    pub id: PaymentId,
    pub order_id: OrderId,
    pub provider_order_id: String,
    pub provider_payment_id: Option<String>,
    pub amount: Decimal,
    pub currency: String,
    pub status: ProviderPaymentStatus,
    pub last_event: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// What the client needs to open Razorpay checkout.
#[derive(Debug, Clone, Serialize)]
pub struct CheckoutPayment {
    pub razorpay_order_id: String,
    /// Amount in paise.
    pub amount: i64,
    pub currency: String,
    pub key_id: String,
}

/// `POST /payment/create-order` body.
#[derive(Debug, Deserialize)]
pub struct CreatePaymentInput {
    pub order_id: OrderId,
}

/// `POST /payment/verify` body, as returned by Razorpay checkout.
#[derive(Debug, Deserialize)]
pub struct VerifyPaymentInput {
    pub razorpay_order_id: String,
    pub razorpay_payment_id: String,
    pub razorpay_signature: String,
}
