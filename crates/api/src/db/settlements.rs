//! Settlement repository.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;

use bazaar_core::settlement::{SettlementLine, compute};
use bazaar_core::{OrderId, Pagination, SettlementId, SettlementStatus, StoreId};

use super::RepositoryError;
use super::orders::{ORDER_COLUMNS, OrderRow};
use crate::models::order::Order;
use crate::models::settlement::{Settlement, SettlementPeriod};

const SETTLEMENT_COLUMNS: &str = "id, store_id, period_start, period_end, order_count, \
     gross_amount, commission_percent, commission_amount, net_amount, status, \
     payout_reference, paid_at, created_at";

/// Internal row type for settlement queries.
#[derive(Debug, sqlx::FromRow)]
struct SettlementRow {
    id: SettlementId,
    store_id: StoreId,
    period_start: NaiveDate,
    period_end: NaiveDate,
    order_count: i64,
    gross_amount: Decimal,
    commission_percent: Decimal,
    commission_amount: Decimal,
    net_amount: Decimal,
    status: SettlementStatus,
    payout_reference: Option<String>,
    paid_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
}

impl From<SettlementRow> for Settlement {
    fn from(row: SettlementRow) -> Self {
        Self {
            id: row.id,
            store_id: row.store_id,
            period_start: row.period_start,
            period_end: row.period_end,
            order_count: row.order_count,
            gross_amount: row.gross_amount,
            commission_percent: row.commission_percent,
            commission_amount: row.commission_amount,
            net_amount: row.net_amount,
            status: row.status,
            payout_reference: row.payout_reference,
            paid_at: row.paid_at,
            created_at: row.created_at,
        }
    }
}

/// Repository for settlement database operations.
pub struct SettlementRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> SettlementRepository<'a> {
    /// Create a new settlement repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Settle the store's delivered, paid and unsettled orders in `period`.
    ///
    /// Days are UTC calendar days, both ends inclusive.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if no order qualifies.
    pub async fn generate(
        &self,
        store_id: StoreId,
        period: &SettlementPeriod,
        commission_percent: Decimal,
    ) -> Result<Settlement, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let rows: Vec<(OrderId, Decimal)> = sqlx::query_as(
            "SELECT id, subtotal FROM bazaar.orders \
             WHERE store_id = $1 AND status = 'delivered' AND payment_status = 'paid' \
               AND settlement_id IS NULL AND delivered_at IS NOT NULL \
               AND (delivered_at AT TIME ZONE 'UTC')::date BETWEEN $2 AND $3 \
             ORDER BY id \
             FOR UPDATE",
        )
        .bind(store_id)
        .bind(period.period_start)
        .bind(period.period_end)
        .fetch_all(&mut *tx)
        .await?;

        if rows.is_empty() {
            return Err(RepositoryError::Conflict(
                "no eligible orders in this period".to_owned(),
            ));
        }

        let lines: Vec<SettlementLine> = rows
            .iter()
            .map(|&(order_id, subtotal)| SettlementLine { order_id, subtotal })
            .collect();
        let totals = compute(&lines, commission_percent);

        let row = sqlx::query_as::<_, SettlementRow>(&format!(
            "INSERT INTO bazaar.settlements \
                 (store_id, period_start, period_end, order_count, gross_amount, \
                  commission_percent, commission_amount, net_amount) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8) \
             RETURNING {SETTLEMENT_COLUMNS}"
        ))
        .bind(store_id)
        .bind(period.period_start)
        .bind(period.period_end)
        .bind(totals.order_count)
        .bind(totals.gross_amount)
        .bind(commission_percent)
        .bind(totals.commission_amount)
        .bind(totals.net_amount)
        .fetch_one(&mut *tx)
        .await?;

        let order_ids: Vec<OrderId> = lines.iter().map(|l| l.order_id).collect();
        sqlx::query("UPDATE bazaar.orders SET settlement_id = $1 WHERE id = ANY($2)")
            .bind(row.id)
            .bind(&order_ids)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(row.into())
    }

    /// Get a settlement by ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(&self, id: SettlementId) -> Result<Option<Settlement>, RepositoryError> {
        let row = sqlx::query_as::<_, SettlementRow>(&format!(
            "SELECT {SETTLEMENT_COLUMNS} FROM bazaar.settlements WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(Into::into))
    }

    /// A store's settlements, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_for_store(
        &self,
        store_id: StoreId,
        page: &Pagination,
    ) -> Result<(Vec<Settlement>, i64), RepositoryError> {
        let rows = sqlx::query_as::<_, SettlementRow>(&format!(
            "SELECT {SETTLEMENT_COLUMNS} FROM bazaar.settlements WHERE store_id = $1 \
             ORDER BY created_at DESC, id DESC LIMIT $2 OFFSET $3"
        ))
        .bind(store_id)
        .bind(page.sql_limit())
        .bind(page.sql_offset())
        .fetch_all(self.pool)
        .await?;

        let (total,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM bazaar.settlements WHERE store_id = $1")
                .bind(store_id)
                .fetch_one(self.pool)
                .await?;

        Ok((rows.into_iter().map(Into::into).collect(), total))
    }

    /// Orders covered by a settlement. Delivery OTPs are stripped.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn orders(&self, id: SettlementId) -> Result<Vec<Order>, RepositoryError> {
        let rows = sqlx::query_as::<_, OrderRow>(&format!(
            "SELECT {ORDER_COLUMNS} FROM bazaar.orders o WHERE o.settlement_id = $1 ORDER BY o.id"
        ))
        .bind(id)
        .fetch_all(self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|r| Order::from(r).without_otp())
            .collect())
    }

    /// Record the payout: `pending → paid`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the settlement does not exist.
    /// Returns `RepositoryError::Conflict` if it was already paid.
    pub async fn mark_paid(
        &self,
        id: SettlementId,
        reference: &str,
    ) -> Result<Settlement, RepositoryError> {
        let row = sqlx::query_as::<_, SettlementRow>(&format!(
            "UPDATE bazaar.settlements \
             SET status = 'paid', payout_reference = $2, paid_at = NOW() \
             WHERE id = $1 AND status = 'pending' \
             RETURNING {SETTLEMENT_COLUMNS}"
        ))
        .bind(id)
        .bind(reference)
        .fetch_optional(self.pool)
        .await?;

        match row {
            Some(row) => Ok(row.into()),
            None => match self.get(id).await? {
                Some(_) => Err(RepositoryError::Conflict(format!(
                    "settlement {id} is already paid"
                ))),
                None => Err(RepositoryError::NotFound),
            },
        }
    }
}
