//! Payment repository.
//!
//! Status updates only ever move forward (`created → captured → refunded`,
//! `created → failed → captured`), so replaying a webhook leaves the row
//! unchanged.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;

use bazaar_core::{OrderId, PaymentId, ProviderPaymentStatus};

use super::RepositoryError;
use crate::models::payment::Payment;

const PAYMENT_COLUMNS: &str = "id, order_id, provider_order_id, provider_payment_id, amount, \
                               currency, status, last_event, created_at, updated_at";

/// Internal row type for payment queries.
#[derive(Debug, sqlx::FromRow)]
struct PaymentRow {
    id: PaymentId,
    order_id: OrderId,
    provider_order_id: String,
    provider_payment_id: Option<String>,
    amount: Decimal,
    currency: String,
    status: ProviderPaymentStatus,
    last_event: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<PaymentRow> for Payment {
    fn from(row: PaymentRow) -> Self {
        Self {
            id: row.id,
            order_id: row.order_id,
            provider_order_id: row.provider_order_id,
            provider_payment_id: row.provider_payment_id,
            amount: row.amount,
            currency: row.currency,
            status: row.status,
            last_event: row.last_event,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// Repository for payment database operations.
pub struct PaymentRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> PaymentRepository<'a> {
    /// Create a new payment repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Record a freshly created Razorpay order.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the provider order is already recorded.
    pub async fn create(
        &self,
        order_id: OrderId,
        provider_order_id: &str,
        amount: Decimal,
        currency: &str,
    ) -> Result<Payment, RepositoryError> {
        let row = sqlx::query_as::<_, PaymentRow>(&format!(
            "INSERT INTO bazaar.payments (order_id, provider_order_id, amount, currency) \
             VALUES ($1, $2, $3, $4) \
             RETURNING {PAYMENT_COLUMNS}"
        ))
        .bind(order_id)
        .bind(provider_order_id)
        .bind(amount)
        .bind(currency)
        .fetch_one(self.pool)
        .await
        .map_err(|e| RepositoryError::unique_or(e, "payment already recorded"))?;

        Ok(row.into())
    }

    /// Find a payment by its Razorpay order ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_provider_order(
        &self,
        provider_order_id: &str,
    ) -> Result<Option<Payment>, RepositoryError> {
        let row = sqlx::query_as::<_, PaymentRow>(&format!(
            "SELECT {PAYMENT_COLUMNS} FROM bazaar.payments WHERE provider_order_id = $1"
        ))
        .bind(provider_order_id)
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(Into::into))
    }

    /// All payment attempts for an order, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_for_order(&self, order_id: OrderId) -> Result<Vec<Payment>, RepositoryError> {
        let rows = sqlx::query_as::<_, PaymentRow>(&format!(
            "SELECT {PAYMENT_COLUMNS} FROM bazaar.payments WHERE order_id = $1 \
             ORDER BY created_at DESC, id DESC"
        ))
        .bind(order_id)
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// The captured payment of an order, if any. This is what gets refunded.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn captured_for_order(
        &self,
        order_id: OrderId,
    ) -> Result<Option<Payment>, RepositoryError> {
        let row = sqlx::query_as::<_, PaymentRow>(&format!(
            "SELECT {PAYMENT_COLUMNS} FROM bazaar.payments \
             WHERE order_id = $1 AND status = 'captured' AND provider_payment_id IS NOT NULL \
             ORDER BY updated_at DESC LIMIT 1"
        ))
        .bind(order_id)
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(Into::into))
    }

    /// Mark the payment captured and its order paid.
    ///
    /// Records the captured attempt's ID over any earlier failed attempt.
    /// Returns `None` when no payment matches `provider_order_id`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if an update fails.
    pub async fn mark_captured(
        &self,
        provider_order_id: &str,
        provider_payment_id: &str,
        event: &str,
    ) -> Result<Option<Payment>, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query_as::<_, PaymentRow>(&format!(
            "UPDATE bazaar.payments SET \
                 status = CASE WHEN status = 'refunded' THEN status ELSE 'captured' END, \
                 provider_payment_id = CASE WHEN status = 'refunded' \
                     THEN provider_payment_id ELSE $2 END, \
                 last_event = $3 \
             WHERE provider_order_id = $1 \
             RETURNING {PAYMENT_COLUMNS}"
        ))
        .bind(provider_order_id)
        .bind(provider_payment_id)
        .bind(event)
        .fetch_optional(&mut *tx)
        .await?;

        if let Some(ref payment) = row {
            sqlx::query(
                "UPDATE bazaar.orders SET payment_status = 'paid' \
                 WHERE id = $1 AND payment_status IN ('pending', 'failed')",
            )
            .bind(payment.order_id)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(row.map(Into::into))
    }

    /// Mark a not-yet-captured payment failed, and the order with it.
    ///
    /// Captured and refunded rows are left alone, payment ID included.
    /// Returns `None` when no payment matches `provider_order_id`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if an update fails.
    pub async fn mark_failed(
        &self,
        provider_order_id: &str,
        provider_payment_id: Option<&str>,
        event: &str,
    ) -> Result<Option<Payment>, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query_as::<_, PaymentRow>(&format!(
            "UPDATE bazaar.payments SET \
                 status = CASE WHEN status = 'created' THEN 'failed' ELSE status END, \
                 provider_payment_id = CASE WHEN status IN ('created', 'failed') \
                     THEN COALESCE($2, provider_payment_id) ELSE provider_payment_id END, \
                 last_event = CASE WHEN status IN ('created', 'failed') \
                     THEN $3 ELSE last_event END \
             WHERE provider_order_id = $1 \
             RETURNING {PAYMENT_COLUMNS}"
        ))
        .bind(provider_order_id)
        .bind(provider_payment_id)
        .bind(event)
        .fetch_optional(&mut *tx)
        .await?;

        if let Some(ref payment) = row
            && payment.status == ProviderPaymentStatus::Failed
        {
            sqlx::query(
                "UPDATE bazaar.orders SET payment_status = 'failed' \
                 WHERE id = $1 AND payment_status = 'pending'",
            )
            .bind(payment.order_id)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(row.map(Into::into))
    }

    /// Mark a captured payment refunded, and the order with it.
    ///
    /// Returns `None` when no payment carries `provider_payment_id`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if an update fails.
    pub async fn mark_refunded(
        &self,
        provider_payment_id: &str,
        event: &str,
    ) -> Result<Option<Payment>, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query_as::<_, PaymentRow>(&format!(
            "UPDATE bazaar.payments SET status = 'refunded', last_event = $2 \
             WHERE provider_payment_id = $1 \
             RETURNING {PAYMENT_COLUMNS}"
        ))
        .bind(provider_payment_id)
        .bind(event)
        .fetch_optional(&mut *tx)
        .await?;

        if let Some(ref payment) = row {
            sqlx::query("UPDATE bazaar.orders SET payment_status = 'refunded' WHERE id = $1")
                .bind(payment.order_id)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(row.map(Into::into))
    }
}
