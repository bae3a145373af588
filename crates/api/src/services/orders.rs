//! Order lifecycle: checkout, merchant status changes, customer
//! cancellation and the refunds they trigger.

use rand::Rng;
use tracing::{info, instrument, warn};

use bazaar_core::{OrderId, OrderStatus, PaymentMethod, UserId, UserRole, to_paise};

use crate::db::{
    CartRepository, DeliveryRepository, OrderRepository, PaymentRepository, StoreRepository,
};
use crate::error::AppError;
use crate::models::CurrentUser;
use crate::models::non_blank;
use crate::models::order::{CheckoutInput, NewOrder, Order, OrderDetail, PlacedOrder};
use crate::models::payment::CheckoutPayment;
use crate::services::optional_coordinates;
use crate::services::razorpay::PaymentError;
use crate::state::AppState;

const MAX_ADDRESS_LENGTH: usize = 500;
const MAX_NOTES_LENGTH: usize = 1000;

/// Order workflows.
pub struct OrderService<'a> {
    state: &'a AppState,
    orders: OrderRepository<'a>,
}

impl<'a> OrderService<'a> {
    #[must_use]
    pub fn new(state: &'a AppState) -> Self {
        Self {
            state,
            orders: OrderRepository::new(state.pool()),
        }
    }

    /// Turn the customer's cart into an order.
    ///
    /// Online orders also get a Razorpay order, created after the database
    /// commit. If that call fails the order stands and the client can retry
    /// through `POST /payment/create-order`.
    ///
    /// # Errors
    ///
    /// Returns 400 for invalid input or an empty cart, 503 for online
    /// payment without Razorpay, and 409 for closed stores or short stock.
    #[instrument(skip(self, input), fields(customer_id = %customer_id))]
    pub async fn checkout(
        &self,
        customer_id: UserId,
        input: &CheckoutInput,
    ) -> Result<PlacedOrder, AppError> {
        let delivery_address = non_blank(Some(&input.delivery_address))
            .ok_or_else(|| AppError::BadRequest("delivery_address is required".to_string()))?;
        if delivery_address.chars().count() > MAX_ADDRESS_LENGTH {
            return Err(AppError::BadRequest(
                "delivery_address is too long".to_string(),
            ));
        }
        let notes = non_blank(input.notes.as_deref());
        if notes
            .as_ref()
            .is_some_and(|n| n.chars().count() > MAX_NOTES_LENGTH)
        {
            return Err(AppError::BadRequest("notes are too long".to_string()));
        }
        let delivery_location = optional_coordinates(input.latitude, input.longitude)?;

        if input.payment_method == PaymentMethod::Online {
            self.state.require_razorpay()?;
        }

        if CartRepository::new(self.state.pool())
            .items(customer_id)
            .await?
            .is_empty()
        {
            return Err(AppError::BadRequest("Your cart is empty".to_string()));
        }

        let (order, items) = self
            .orders
            .checkout(&NewOrder {
                customer_id,
                payment_method: input.payment_method,
                delivery_address,
                delivery_location,
                notes,
                delivery_fee: self.state.config().marketplace.delivery_fee,
                delivery_otp: generate_otp(),
            })
            .await?;

        info!(
            order_id = %order.id,
            store_id = %order.store_id,
            total = %order.total,
            payment_method = %order.payment_method,
            "Order placed"
        );

        let payment = match order.payment_method {
            PaymentMethod::Cod => None,
            PaymentMethod::Online => match self.create_payment(&order).await {
                Ok(payment) => Some(payment),
                Err(e) => {
                    warn!(order_id = %order.id, error = %e, "Razorpay order creation failed after checkout");
                    None
                }
            },
        };

        Ok(PlacedOrder {
            order,
            items,
            payment,
        })
    }

    /// Create a Razorpay order for `order.total` and record it.
    ///
    /// # Errors
    ///
    /// Returns 503 without Razorpay, 502 when Razorpay fails.
    pub async fn create_payment(&self, order: &Order) -> Result<CheckoutPayment, AppError> {
        let razorpay = self.state.require_razorpay()?;
        let amount = to_paise(order.total).ok_or_else(|| {
            PaymentError::InvalidAmount(format!("order total {} is out of range", order.total))
        })?;

        let created = razorpay
            .create_order(amount, &format!("order_{}", order.id))
            .await?;
        PaymentRepository::new(self.state.pool())
            .create(order.id, &created.id, order.total, &created.currency)
            .await?;

        Ok(CheckoutPayment {
            razorpay_order_id: created.id,
            amount: created.amount,
            currency: created.currency,
            key_id: razorpay.key_id().to_string(),
        })
    }

    /// Load an order for `viewer`: its customer, the store owner or the
    /// partner delivering it. Only the customer sees the OTP.
    ///
    /// # Errors
    ///
    /// Returns 404 for unknown orders and 403 for anyone else.
    pub async fn detail(&self, viewer: &CurrentUser, id: OrderId) -> Result<OrderDetail, AppError> {
        let order = self.find(id).await?;
        let delivery = DeliveryRepository::new(self.state.pool())
            .latest_for_order(id)
            .await?;

        let allowed = match viewer.role {
            UserRole::Customer => order.customer_id == viewer.id,
            UserRole::Merchant => self.owns_store(viewer.id, &order).await?,
            UserRole::Delivery => delivery.as_ref().is_some_and(|d| d.partner_id == viewer.id),
        };
        if !allowed {
            return Err(AppError::Forbidden(
                "You do not have access to this order".to_string(),
            ));
        }

        let order = if viewer.role == UserRole::Customer {
            order
        } else {
            order.without_otp()
        };
        let items = self.orders.items(id).await?;

        Ok(OrderDetail {
            order,
            items,
            delivery,
        })
    }

    /// Merchant moves one of their store's orders along.
    ///
    /// # Errors
    ///
    /// Returns 403 when the order belongs to another store and 409 for
    /// transitions the merchant may not make.
    #[instrument(skip(self), fields(merchant_id = %merchant_id, order_id = %id))]
    pub async fn update_status(
        &self,
        merchant_id: UserId,
        id: OrderId,
        next: OrderStatus,
    ) -> Result<Order, AppError> {
        let order = self.find(id).await?;
        if !self.owns_store(merchant_id, &order).await? {
            return Err(AppError::Forbidden(
                "This order belongs to another store".to_string(),
            ));
        }

        order.status.transition(next, UserRole::Merchant)?;
        let updated = self.orders.transition(id, order.status, next).await?;
        info!(from = %order.status, to = %next, "Order status changed");

        if next == OrderStatus::Rejected && updated.needs_refund() {
            self.refund(&updated).await;
        }
        Ok(updated.without_otp())
    }

    /// Customer cancels before preparation starts.
    ///
    /// # Errors
    ///
    /// Returns 403 for someone else's order and 409 once it is past `accepted`.
    #[instrument(skip(self), fields(customer_id = %customer_id, order_id = %id))]
    pub async fn cancel(&self, customer_id: UserId, id: OrderId) -> Result<Order, AppError> {
        let order = self.find(id).await?;
        if order.customer_id != customer_id {
            return Err(AppError::Forbidden(
                "You can only cancel your own orders".to_string(),
            ));
        }

        order
            .status
            .transition(OrderStatus::Cancelled, UserRole::Customer)?;
        let updated = self
            .orders
            .transition(id, order.status, OrderStatus::Cancelled)
            .await?;
        info!(from = %order.status, "Order cancelled by customer");

        if updated.needs_refund() {
            self.refund(&updated).await;
        }
        Ok(updated)
    }

    /// Refund a payment captured after its order was cancelled or rejected.
    ///
    /// Called once a capture has been recorded. Returns whether a refund was
    /// attempted.
    ///
    /// # Errors
    ///
    /// Returns 404 for unknown orders.
    #[instrument(skip(self), fields(order_id = %id))]
    pub async fn refund_if_closed(&self, id: OrderId) -> Result<bool, AppError> {
        let order = self.find(id).await?;
        if !order.captured_after_close() {
            return Ok(false);
        }

        warn!(status = %order.status, "Payment captured on a closed order");
        self.refund(&order).await;
        Ok(true)
    }

    /// Refund the captured Razorpay payment of `order`.
    ///
    /// The status change that triggered this is already committed, so a
    /// failed refund is reported to Sentry for manual follow-up instead of
    /// failing the request.
    async fn refund(&self, order: &Order) {
        let Some(razorpay) = self.state.razorpay() else {
            warn!(order_id = %order.id, "Paid order needs a refund but Razorpay is not configured");
            return;
        };
        let payments = PaymentRepository::new(self.state.pool());

        let payment = match payments.captured_for_order(order.id).await {
            Ok(Some(payment)) => payment,
            Ok(None) => {
                warn!(order_id = %order.id, "No captured payment found to refund");
                return;
            }
            Err(e) => {
                sentry::capture_error(&e);
                warn!(order_id = %order.id, error = %e, "Failed to load payment for refund");
                return;
            }
        };
        let Some(payment_id) = payment.provider_payment_id.as_deref() else {
            return;
        };

        match razorpay.refund(payment_id, None).await {
            Ok(refund) => {
                info!(order_id = %order.id, refund_id = %refund.id, "Refund issued");
                if let Err(e) = payments.mark_refunded(payment_id, "refund.created").await {
                    sentry::capture_error(&e);
                    warn!(order_id = %order.id, error = %e, "Failed to record refund");
                }
            }
            Err(e) => {
                sentry::capture_error(&e);
                warn!(order_id = %order.id, error = %e, "Refund failed");
            }
        }
    }

    async fn find(&self, id: OrderId) -> Result<Order, AppError> {
        self.orders
            .get(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Order {id} not found")))
    }

    async fn owns_store(&self, merchant_id: UserId, order: &Order) -> Result<bool, AppError> {
        let store = StoreRepository::new(self.state.pool())
            .get(order.store_id)
            .await?;
        Ok(store.is_some_and(|s| s.owner_id == merchant_id))
    }
}

/// Four-digit code the customer reads out to the delivery partner.
fn generate_otp() -> String {
    format!("{:04}", rand::rng().random_range(0..10_000))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_otp_is_four_digits() {
        for _ in 0..200 {
            let otp = generate_otp();
            assert_eq!(otp.len(), 4);
            assert!(otp.chars().all(|c| c.is_ascii_digit()));
        }
    }
}
