//! Delivery repository.
//!
//! Every multi-row step (claiming a partner, pickup, completion, rejection)
//! runs in one transaction so the delivery, the order and the partner's
//! availability never disagree.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{PgConnection, PgPool};

use bazaar_core::{DeliveryId, DeliveryStatus, OrderId, OrderStatus, Pagination, UserId};

use super::RepositoryError;
use super::orders::set_status;
use super::users::ACTIVE_DELIVERY;
use crate::models::delivery::Delivery;
use crate::models::order::Order;

const DELIVERY_COLUMNS: &str = "id, order_id, partner_id, status, distance_km, assigned_at, \
                                picked_up_at, delivered_at, updated_at";

/// Internal row type for delivery queries.
#[derive(Debug, sqlx::FromRow)]
struct DeliveryRow {
    id: DeliveryId,
    order_id: OrderId,
    partner_id: UserId,
    status: DeliveryStatus,
    distance_km: Option<f64>,
    assigned_at: DateTime<Utc>,
    picked_up_at: Option<DateTime<Utc>>,
    delivered_at: Option<DateTime<Utc>>,
    updated_at: DateTime<Utc>,
}

impl From<DeliveryRow> for Delivery {
    fn from(row: DeliveryRow) -> Self {
        Self {
            id: row.id,
            order_id: row.order_id,
            partner_id: row.partner_id,
            status: row.status,
            distance_km: row.distance_km,
            assigned_at: row.assigned_at,
            picked_up_at: row.picked_up_at,
            delivered_at: row.delivered_at,
            updated_at: row.updated_at,
        }
    }
}

/// Repository for delivery database operations.
pub struct DeliveryRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> DeliveryRepository<'a> {
    /// Create a new delivery repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Get a delivery by ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(&self, id: DeliveryId) -> Result<Option<Delivery>, RepositoryError> {
        let row = sqlx::query_as::<_, DeliveryRow>(&format!(
            "SELECT {DELIVERY_COLUMNS} FROM bazaar.deliveries WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(Into::into))
    }

    /// The order's live (assigned or picked up) delivery, else its latest one.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn latest_for_order(
        &self,
        order_id: OrderId,
    ) -> Result<Option<Delivery>, RepositoryError> {
        let row = sqlx::query_as::<_, DeliveryRow>(&format!(
            "SELECT {DELIVERY_COLUMNS} FROM bazaar.deliveries WHERE order_id = $1 \
             ORDER BY (status IN ('assigned', 'picked_up')) DESC, assigned_at DESC, id DESC \
             LIMIT 1"
        ))
        .bind(order_id)
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(Into::into))
    }

    /// Partners who already turned this order down.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn rejected_partners(&self, order_id: OrderId) -> Result<Vec<UserId>, RepositoryError> {
        let rows: Vec<(UserId,)> = sqlx::query_as(
            "SELECT DISTINCT partner_id FROM bazaar.deliveries \
             WHERE order_id = $1 AND status = 'rejected'",
        )
        .bind(order_id)
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(|(id,)| id).collect())
    }

    /// A partner's deliveries, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_for_partner(
        &self,
        partner_id: UserId,
        status: Option<DeliveryStatus>,
        page: &Pagination,
    ) -> Result<(Vec<Delivery>, i64), RepositoryError> {
        const FILTER: &str =
            "partner_id = $1 AND ($2::bazaar.delivery_status IS NULL OR status = $2)";

        let rows = sqlx::query_as::<_, DeliveryRow>(&format!(
            "SELECT {DELIVERY_COLUMNS} FROM bazaar.deliveries WHERE {FILTER} \
             ORDER BY assigned_at DESC, id DESC LIMIT $3 OFFSET $4"
        ))
        .bind(partner_id)
        .bind(status)
        .bind(page.sql_limit())
        .bind(page.sql_offset())
        .fetch_all(self.pool)
        .await?;

        let (total,): (i64,) =
            sqlx::query_as(&format!("SELECT COUNT(*) FROM bazaar.deliveries WHERE {FILTER}"))
                .bind(partner_id)
                .bind(status)
                .fetch_one(self.pool)
                .await?;

        Ok((rows.into_iter().map(Into::into).collect(), total))
    }

    /// Claim an available partner and create the delivery.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the partner was claimed in the
    /// meantime, the order left the assignable states, or the order already
    /// has a live delivery.
    pub async fn assign(
        &self,
        order_id: OrderId,
        partner_id: UserId,
        distance_km: f64,
    ) -> Result<Delivery, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let status: Option<(OrderStatus,)> =
            sqlx::query_as("SELECT status FROM bazaar.orders WHERE id = $1 FOR SHARE")
                .bind(order_id)
                .fetch_optional(&mut *tx)
                .await?;
        match status {
            Some((OrderStatus::Preparing | OrderStatus::ReadyForPickup,)) => {}
            Some((other,)) => {
                return Err(RepositoryError::Conflict(format!(
                    "order is {other} and cannot be assigned"
                )));
            }
            None => return Err(RepositoryError::NotFound),
        }

        let claimed = sqlx::query(&format!(
            "UPDATE bazaar.users u SET is_available = FALSE \
             WHERE id = $1 AND role = 'delivery' AND is_available \
               AND NOT EXISTS ({ACTIVE_DELIVERY})"
        ))
        .bind(partner_id)
        .execute(&mut *tx)
        .await?;
        if claimed.rows_affected() == 0 {
            return Err(RepositoryError::Conflict(format!(
                "partner {partner_id} is no longer available"
            )));
        }

        let row = sqlx::query_as::<_, DeliveryRow>(&format!(
            "INSERT INTO bazaar.deliveries (order_id, partner_id, distance_km) \
             VALUES ($1, $2, $3) \
             RETURNING {DELIVERY_COLUMNS}"
        ))
        .bind(order_id)
        .bind(partner_id)
        .bind(distance_km)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| RepositoryError::unique_or(e, "order already has an active delivery"))?;

        tx.commit().await?;
        Ok(row.into())
    }

    /// Partner collected the parcel: delivery `picked_up`, order `out_for_delivery`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if either record moved on already.
    pub async fn pickup(
        &self,
        id: DeliveryId,
        order_id: OrderId,
    ) -> Result<(Delivery, Order), RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let delivery = move_delivery(
            &mut tx,
            id,
            DeliveryStatus::Assigned,
            DeliveryStatus::PickedUp,
            "picked_up_at = NOW()",
        )
        .await?;
        let order = set_status(
            &mut tx,
            order_id,
            OrderStatus::ReadyForPickup,
            OrderStatus::OutForDelivery,
        )
        .await?;

        tx.commit().await?;
        Ok((delivery, order))
    }

    /// Hand-over done: delivery and order `delivered`, partner free again and,
    /// for cash orders, the collected amount recorded.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if either record moved on already.
    pub async fn complete(
        &self,
        id: DeliveryId,
        order_id: OrderId,
        partner_id: UserId,
        cod_amount: Option<Decimal>,
    ) -> Result<(Delivery, Order), RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let delivery = move_delivery(
            &mut tx,
            id,
            DeliveryStatus::PickedUp,
            DeliveryStatus::Delivered,
            "delivered_at = NOW()",
        )
        .await?;
        let order = set_status(
            &mut tx,
            order_id,
            OrderStatus::OutForDelivery,
            OrderStatus::Delivered,
        )
        .await?;
        release_partner(&mut tx, partner_id).await?;

        if let Some(amount) = cod_amount {
            sqlx::query(
                "INSERT INTO bazaar.cod_collections (order_id, partner_id, amount) \
                 VALUES ($1, $2, $3)",
            )
            .bind(order_id)
            .bind(partner_id)
            .bind(amount)
            .execute(&mut *tx)
            .await
            .map_err(|e| RepositoryError::unique_or(e, "cash already recorded for this order"))?;
        }

        tx.commit().await?;
        Ok((delivery, order))
    }

    /// Partner turned the job down before pickup.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the delivery is no longer assigned.
    pub async fn reject(&self, id: DeliveryId, partner_id: UserId) -> Result<Delivery, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let delivery = move_delivery(
            &mut tx,
            id,
            DeliveryStatus::Assigned,
            DeliveryStatus::Rejected,
            "updated_at = NOW()",
        )
        .await?;
        release_partner(&mut tx, partner_id).await?;

        tx.commit().await?;
        Ok(delivery)
    }
}

/// Compare-and-set a delivery status, applying `stamp` in the same update.
async fn move_delivery(
    conn: &mut PgConnection,
    id: DeliveryId,
    from: DeliveryStatus,
    to: DeliveryStatus,
    stamp: &str,
) -> Result<Delivery, RepositoryError> {
    let row = sqlx::query_as::<_, DeliveryRow>(&format!(
        "UPDATE bazaar.deliveries SET status = $3, {stamp} \
         WHERE id = $1 AND status = $2 \
         RETURNING {DELIVERY_COLUMNS}"
    ))
    .bind(id)
    .bind(from)
    .bind(to)
    .fetch_optional(&mut *conn)
    .await?;

    row.map(Into::into).ok_or_else(|| {
        RepositoryError::Conflict(format!("delivery {id} is no longer {from}"))
    })
}

async fn release_partner(conn: &mut PgConnection, partner_id: UserId) -> Result<(), RepositoryError> {
    sqlx::query("UPDATE bazaar.users SET is_available = TRUE WHERE id = $1")
        .bind(partner_id)
        .execute(&mut *conn)
        .await?;
    Ok(())
}
