//! Order domain types.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use bazaar_core::{
    Coordinates, OrderId, OrderItemId, OrderStatus, PaymentMethod, PaymentStatus, ProductId,
    SettlementId, StoreId, UserId,
};

use super::delivery::Delivery;
use super::payment::CheckoutPayment;

/// An order placed against a single store.
#[derive(Debug, Clone, Serialize)]
pub struct Order {
    pub id: OrderId,
    pub customer_id: UserId,
    pub store_id: StoreId,
    pub status: OrderStatus,
    pub payment_method: PaymentMethod,
    pub payment_status: PaymentStatus,
    pub subtotal: Decimal,
    pub delivery_fee: Decimal,
    pub total: Decimal,
    pub delivery_address: String,
    pub delivery_latitude: Option<f64>,
    pub delivery_longitude: Option<f64>,
    pub notes: Option<String>,
    /// Shown to the customer only; the partner must ask for it at the door.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delivery_otp: Option<String>,
    pub settlement_id: Option<SettlementId>,
    pub delivered_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    /// Drop the delivery OTP before showing the order to anyone but its customer.
    #[must_use]
    pub fn without_otp(mut self) -> Self {
        self.delivery_otp = None;
        self
    }

    /// Drop-off point, if the customer supplied coordinates.
    #[must_use]
    pub fn drop_off(&self) -> Option<Coordinates> {
        Coordinates::from_parts(self.delivery_latitude, self.delivery_longitude)
    }

    /// Paid through Razorpay and not yet refunded.
    #[must_use]
    pub fn needs_refund(&self) -> bool {
        self.payment_method == PaymentMethod::Online && self.payment_status == PaymentStatus::Paid
    }

    /// Paid online although the order was already cancelled or rejected.
    #[must_use]
    pub fn captured_after_close(&self) -> bool {
        matches!(self.status, OrderStatus::Cancelled | OrderStatus::Rejected)
            && self.needs_refund()
    }
}

/// A line of an order, priced at checkout time.
#[derive(Debug, Clone, Serialize)]
pub struct OrderItem {
    pub id: OrderItemId,
    pub order_id: OrderId,
    pub product_id: ProductId,
    pub product_name: String,
    pub unit_price: Decimal,
    pub quantity: i32,
    pub line_total: Decimal,
}

/// `GET /order/{id}` payload.
#[derive(Debug, Serialize)]
pub struct OrderDetail {
    pub order: Order,
    pub items: Vec<OrderItem>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delivery: Option<Delivery>,
}

/// `POST /order/checkout` body.
#[derive(Debug, Deserialize)]
pub struct CheckoutInput {
    pub payment_method: PaymentMethod,
    pub delivery_address: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub notes: Option<String>,
}

/// Everything the checkout transaction needs besides the cart.
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub customer_id: UserId,
    pub payment_method: PaymentMethod,
    pub delivery_address: String,
    pub delivery_location: Option<Coordinates>,
    pub notes: Option<String>,
    pub delivery_fee: Decimal,
    pub delivery_otp: String,
}

/// Checkout result.
#[derive(Debug, Serialize)]
pub struct PlacedOrder {
    pub order: Order,
    pub items: Vec<OrderItem>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment: Option<CheckoutPayment>,
}

/// `PUT /order/{id}/status` body.
#[derive(Debug, Deserialize)]
pub struct UpdateStatusInput {
    pub status: OrderStatus,
}

/// `status` plus paging for order lists.
#[derive(Debug, Default, Deserialize)]
pub struct OrderFilter {
    pub status: Option<OrderStatus>,
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn order(status: OrderStatus, method: PaymentMethod, payment: PaymentStatus) -> Order {
        Order {
            id: OrderId::new(1),
            customer_id: UserId::new(2),
            store_id: StoreId::new(3),
            status,
            payment_method: method,
            payment_status: payment,
            subtotal: Decimal::new(20_000, 2),
            delivery_fee: Decimal::new(4_000, 2),
            total: Decimal::new(24_000, 2),
            delivery_address: "12 MG Road".to_string(),
            delivery_latitude: None,
            delivery_longitude: None,
            notes: None,
            delivery_otp: Some("0420".to_string()),
            settlement_id: None,
            delivered_at: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_capture_on_cancelled_or_rejected_order_is_refunded() {
        for status in [OrderStatus::Cancelled, OrderStatus::Rejected] {
            let o = order(status, PaymentMethod::Online, PaymentStatus::Paid);
            assert!(o.captured_after_close(), "{status}");
        }
    }

    #[test]
    fn test_capture_on_open_order_is_kept() {
        for status in [
            OrderStatus::Placed,
            OrderStatus::Accepted,
            OrderStatus::Delivered,
        ] {
            let o = order(status, PaymentMethod::Online, PaymentStatus::Paid);
            assert!(!o.captured_after_close(), "{status}");
        }
    }

    #[test]
    fn test_unpaid_or_refunded_closed_order_needs_nothing() {
        let closed = OrderStatus::Cancelled;
        for (method, payment) in [
            (PaymentMethod::Online, PaymentStatus::Pending),
            (PaymentMethod::Online, PaymentStatus::Refunded),
            (PaymentMethod::Cod, PaymentStatus::Paid),
        ] {
            assert!(!order(closed, method, payment).captured_after_close());
        }
    }

    #[test]
    fn test_without_otp_hides_the_code() {
        let o = order(OrderStatus::Placed, PaymentMethod::Cod, PaymentStatus::Pending);
        assert!(o.without_otp().delivery_otp.is_none());
    }
}
