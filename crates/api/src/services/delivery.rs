//! Delivery workflows: auto-assignment and the partner's pickup,
//! completion and rejection steps.

use rust_decimal::Decimal;
use serde::Serialize;
use tracing::{info, instrument, warn};

use bazaar_core::assignment::rank_partners;
use bazaar_core::{
    DeliveryId, DeliveryStatus, OrderId, OrderStatus, PaymentMethod, UserId, UserRole,
};

use crate::db::{DeliveryRepository, OrderRepository, RepositoryError, StoreRepository, UserRepository};
use crate::error::AppError;
use crate::models::delivery::{CompleteInput, Delivery};
use crate::models::order::Order;
use crate::services::razorpay::constant_time_compare;
use crate::state::AppState;

/// Partners tried before giving up when others keep claiming them first.
const MAX_ASSIGN_ATTEMPTS: usize = 3;

/// Outcome of a rejection.
#[derive(Debug, Serialize)]
pub struct Rejection {
    pub delivery: Delivery,
    /// The replacement assignment, when another partner was found.
    pub reassigned: Option<Delivery>,
}

/// Delivery workflows.
pub struct DeliveryService<'a> {
    state: &'a AppState,
    deliveries: DeliveryRepository<'a>,
    orders: OrderRepository<'a>,
}

impl<'a> DeliveryService<'a> {
    #[must_use]
    pub fn new(state: &'a AppState) -> Self {
        Self {
            state,
            deliveries: DeliveryRepository::new(state.pool()),
            orders: OrderRepository::new(state.pool()),
        }
    }

    /// Store owner asks for a partner.
    ///
    /// # Errors
    ///
    /// Returns 403 for another store's order and 409 when the order cannot
    /// be assigned or nobody is available.
    #[instrument(skip(self), fields(merchant_id = %merchant_id, order_id = %order_id))]
    pub async fn assign_for_merchant(
        &self,
        merchant_id: UserId,
        order_id: OrderId,
    ) -> Result<Delivery, AppError> {
        let order = self.find_order(order_id).await?;
        let store = StoreRepository::new(self.state.pool())
            .get(order.store_id)
            .await?;
        if !store.is_some_and(|s| s.owner_id == merchant_id) {
            return Err(AppError::Forbidden(
                "This order belongs to another store".to_string(),
            ));
        }

        if !matches!(
            order.status,
            OrderStatus::Preparing | OrderStatus::ReadyForPickup
        ) {
            return Err(AppError::Conflict(format!(
                "Order is {} and cannot be assigned yet",
                order.status
            )));
        }
        if let Some(current) = self.deliveries.latest_for_order(order_id).await?
            && current.status.is_active()
        {
            return Err(AppError::Conflict(
                "Order already has an active delivery".to_string(),
            ));
        }

        self.auto_assign(&order).await?.ok_or_else(|| {
            AppError::Conflict("No delivery partner is available nearby".to_string())
        })
    }

    /// Claim the nearest available partner for `order`.
    ///
    /// Partners who already rejected the order are skipped. Returns `None`
    /// when nobody qualifies.
    ///
    /// # Errors
    ///
    /// Returns 409 when the store has no location.
    pub async fn auto_assign(&self, order: &Order) -> Result<Option<Delivery>, AppError> {
        let store = StoreRepository::new(self.state.pool())
            .get(order.store_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Store not found".to_string()))?;
        let origin = store.location().ok_or_else(|| {
            AppError::Conflict("Store location is not set; cannot find partners".to_string())
        })?;

        let excluded = self.deliveries.rejected_partners(order.id).await?;
        let candidates = UserRepository::new(self.state.pool())
            .available_partners()
            .await?;
        let radius = self.state.config().marketplace.delivery_radius_km;
        let ranked = rank_partners(&origin, &candidates, radius, &excluded);

        for candidate in ranked.into_iter().take(MAX_ASSIGN_ATTEMPTS) {
            match self
                .deliveries
                .assign(order.id, candidate.partner_id, candidate.distance_km)
                .await
            {
                Ok(delivery) => {
                    info!(
                        order_id = %order.id,
                        partner_id = %candidate.partner_id,
                        distance_km = candidate.distance_km,
                        "Delivery partner assigned"
                    );
                    return Ok(Some(delivery));
                }
                // Someone else claimed this partner first; try the next one.
                Err(RepositoryError::Conflict(reason)) => {
                    warn!(partner_id = %candidate.partner_id, %reason, "Assignment attempt lost");
                }
                Err(e) => return Err(e.into()),
            }
        }

        Ok(None)
    }

    /// Partner collected the parcel from the store.
    ///
    /// # Errors
    ///
    /// Returns 403 for someone else's delivery, 409 if the delivery is not
    /// `assigned` or the order is not `ready_for_pickup`.
    #[instrument(skip(self), fields(partner_id = %partner_id, delivery_id = %id))]
    pub async fn pickup(&self, partner_id: UserId, id: DeliveryId) -> Result<(Delivery, Order), AppError> {
        let delivery = self.find_own(partner_id, id).await?;
        delivery.status.transition(DeliveryStatus::PickedUp)?;

        let order = self.find_order(delivery.order_id).await?;
        order
            .status
            .transition(OrderStatus::OutForDelivery, UserRole::Delivery)?;

        let (delivery, order) = self.deliveries.pickup(id, order.id).await?;
        info!(order_id = %order.id, "Order picked up");
        Ok((delivery, order.without_otp()))
    }

    /// Partner handed the order over.
    ///
    /// # Errors
    ///
    /// Returns 400 for a wrong OTP or a missing/incorrect cash amount on COD
    /// orders, 403 for someone else's delivery, 409 out of sequence.
    #[instrument(skip(self, input), fields(partner_id = %partner_id, delivery_id = %id))]
    pub async fn complete(
        &self,
        partner_id: UserId,
        id: DeliveryId,
        input: &CompleteInput,
    ) -> Result<(Delivery, Order), AppError> {
        let delivery = self.find_own(partner_id, id).await?;
        delivery.status.transition(DeliveryStatus::Delivered)?;

        let order = self.find_order(delivery.order_id).await?;
        order
            .status
            .transition(OrderStatus::Delivered, UserRole::Delivery)?;

        if !otp_matches(&order, &input.otp) {
            return Err(AppError::BadRequest("Invalid delivery OTP".to_string()));
        }
        let cod_amount = cod_amount_for(&order, input.cod_amount)?;

        let (delivery, order) = self
            .deliveries
            .complete(id, order.id, partner_id, cod_amount)
            .await?;
        info!(order_id = %order.id, cod = cod_amount.is_some(), "Order delivered");
        Ok((delivery, order.without_otp()))
    }

    /// Partner declines before pickup; another partner is sought right away.
    ///
    /// # Errors
    ///
    /// Returns 403 for someone else's delivery and 409 once picked up.
    #[instrument(skip(self), fields(partner_id = %partner_id, delivery_id = %id))]
    pub async fn reject(&self, partner_id: UserId, id: DeliveryId) -> Result<Rejection, AppError> {
        let delivery = self.find_own(partner_id, id).await?;
        delivery.status.transition(DeliveryStatus::Rejected)?;

        let delivery = self.deliveries.reject(id, partner_id).await?;
        info!(order_id = %delivery.order_id, "Delivery rejected by partner");

        let order = self.find_order(delivery.order_id).await?;
        let reassigned = match self.auto_assign(&order).await {
            Ok(found) => found,
            Err(e) => {
                warn!(order_id = %order.id, error = %e, "Reassignment failed");
                None
            }
        };

        Ok(Rejection {
            delivery,
            reassigned,
        })
    }

    /// Load a delivery visible to `viewer`: its partner or the store owner.
    ///
    /// # Errors
    ///
    /// Returns 404 for unknown deliveries and 403 for anyone else.
    pub async fn get_for(
        &self,
        viewer: UserId,
        role: UserRole,
        id: DeliveryId,
    ) -> Result<Delivery, AppError> {
        let delivery = self.find(id).await?;
        let allowed = match role {
            UserRole::Delivery => delivery.partner_id == viewer,
            UserRole::Merchant => {
                let order = self.find_order(delivery.order_id).await?;
                StoreRepository::new(self.state.pool())
                    .get(order.store_id)
                    .await?
                    .is_some_and(|s| s.owner_id == viewer)
            }
            UserRole::Customer => false,
        };
        if allowed {
            Ok(delivery)
        } else {
            Err(AppError::Forbidden(
                "You do not have access to this delivery".to_string(),
            ))
        }
    }

    async fn find(&self, id: DeliveryId) -> Result<Delivery, AppError> {
        self.deliveries
            .get(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Delivery {id} not found")))
    }

    async fn find_own(&self, partner_id: UserId, id: DeliveryId) -> Result<Delivery, AppError> {
        let delivery = self.find(id).await?;
        if delivery.partner_id != partner_id {
            return Err(AppError::Forbidden(
                "This delivery is assigned to another partner".to_string(),
            ));
        }
        Ok(delivery)
    }

    async fn find_order(&self, id: OrderId) -> Result<Order, AppError> {
        self.orders
            .get(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Order {id} not found")))
    }
}

/// Compare the code read out at the door without leaking how much of it matched.
fn otp_matches(order: &Order, given: &str) -> bool {
    order
        .delivery_otp
        .as_deref()
        .is_some_and(|otp| constant_time_compare(otp, given.trim()))
}

/// Cash to record on completion: required and exact for COD, ignored otherwise.
fn cod_amount_for(order: &Order, given: Option<Decimal>) -> Result<Option<Decimal>, AppError> {
    if order.payment_method != PaymentMethod::Cod {
        return Ok(None);
    }
    match given {
        Some(amount) if amount == order.total => Ok(Some(order.total)),
        Some(amount) => Err(AppError::BadRequest(format!(
            "Collected amount {amount} does not match the order total {}",
            order.total
        ))),
        None => Err(AppError::BadRequest(
            "cod_amount is required for cash-on-delivery orders".to_string(),
        )),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::str::FromStr;

    use chrono::Utc;

    use bazaar_core::{PaymentStatus, StoreId};

    use super::*;

    fn order(method: PaymentMethod, total: &str) -> Order {
        Order {
            id: OrderId::new(1),
            customer_id: UserId::new(2),
            store_id: StoreId::new(3),
            status: OrderStatus::OutForDelivery,
            payment_method: method,
            payment_status: PaymentStatus::Pending,
            subtotal: Decimal::from_str(total).unwrap(),
            delivery_fee: Decimal::ZERO,
            total: Decimal::from_str(total).unwrap(),
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
    fn test_cod_amount_must_match_total() {
        let cod = order(PaymentMethod::Cod, "250.00");
        assert_eq!(
            cod_amount_for(&cod, Some(Decimal::from_str("250").unwrap())).unwrap(),
            Some(Decimal::from_str("250.00").unwrap())
        );
        assert!(matches!(
            cod_amount_for(&cod, Some(Decimal::from_str("200").unwrap())),
            Err(AppError::BadRequest(_))
        ));
        assert!(matches!(
            cod_amount_for(&cod, None),
            Err(AppError::BadRequest(_))
        ));
    }

    #[test]
    fn test_online_orders_record_no_cash() {
        let online = order(PaymentMethod::Online, "250.00");
        assert_eq!(
            cod_amount_for(&online, Some(Decimal::ONE)).unwrap(),
            None
        );
    }

    #[test]
    fn test_otp_must_match_exactly() {
        let mut o = order(PaymentMethod::Cod, "250.00");
        assert!(otp_matches(&o, "0420"));
        assert!(otp_matches(&o, " 0420\n"));
        assert!(!otp_matches(&o, "0421"));
        assert!(!otp_matches(&o, "042"));
        assert!(!otp_matches(&o, ""));

        o.delivery_otp = None;
        assert!(!otp_matches(&o, "0420"));
    }
}
