//! Delivery domain types.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use bazaar_core::{DeliveryId, DeliveryStatus, OrderId, UserId};

/// A partner's assignment to an order.
#[derive(Debug, Clone, Serialize)]
pub struct Delivery {
    pub id: DeliveryId,
    pub order_id: OrderId,
    pub partner_id: UserId,
    pub status: DeliveryStatus,
    /// Partner to store distance when assigned.
    pub distance_km: Option<f64>,
    pub assigned_at: DateTime<Utc>,
    pub picked_up_at: Option<DateTime<Utc>>,
    pub delivered_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

/// `POST /delivery/{id}/complete` body.
#[derive(Debug, Deserialize)]
pub struct CompleteInput {
    pub otp: String,
    /// Required for cash-on-delivery orders; must equal the order total.
    pub cod_amount: Option<Decimal>,
}

/// `status` plus paging for a partner's deliveries.
#[derive(Debug, Default, Deserialize)]
pub struct DeliveryFilter {
    pub status: Option<DeliveryStatus>,
    pub page: Option<u32>,
    pub limit: Option<u32>,
}
