//! Cash-on-delivery collection repository.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;

use bazaar_core::{CodCollectionId, CodStatus, OrderId, Pagination, StoreId, UserId};

use super::RepositoryError;
use crate::models::cod::CodCollection;

const COD_COLUMNS: &str = "c.id, c.order_id, o.store_id, c.partner_id, c.amount, c.status, \
                           c.collected_at, c.confirmed_at";

/// Internal row type for collection queries.
#[derive(Debug, sqlx::FromRow)]
struct CodRow {
    id: CodCollectionId,
    order_id: OrderId,
    store_id: StoreId,
    partner_id: UserId,
    amount: Decimal,
    status: CodStatus,
    collected_at: DateTime<Utc>,
    confirmed_at: Option<DateTime<Utc>>,
}

impl From<CodRow> for CodCollection {
    fn from(row: CodRow) -> Self {
        Self {
            id: row.id,
            order_id: row.order_id,
            store_id: row.store_id,
            partner_id: row.partner_id,
            amount: row.amount,
            status: row.status,
            collected_at: row.collected_at,
            confirmed_at: row.confirmed_at,
        }
    }
}

/// Repository for COD collection database operations.
pub struct CodRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> CodRepository<'a> {
    /// Create a new COD repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// A partner's collections, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_for_partner(
        &self,
        partner_id: UserId,
        status: Option<CodStatus>,
        page: &Pagination,
    ) -> Result<(Vec<CodCollection>, i64), RepositoryError> {
        self.list_where("c.partner_id = $1", partner_id.as_i64(), status, page)
            .await
    }

    /// Collections for a store's orders, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_for_store(
        &self,
        store_id: StoreId,
        status: Option<CodStatus>,
        page: &Pagination,
    ) -> Result<(Vec<CodCollection>, i64), RepositoryError> {
        self.list_where("o.store_id = $1", store_id.as_i64(), status, page)
            .await
    }

    async fn list_where(
        &self,
        owner_clause: &str,
        owner_id: i64,
        status: Option<CodStatus>,
        page: &Pagination,
    ) -> Result<(Vec<CodCollection>, i64), RepositoryError> {
        let filter =
            format!("{owner_clause} AND ($2::bazaar.cod_status IS NULL OR c.status = $2)");

        let rows = sqlx::query_as::<_, CodRow>(&format!(
            "SELECT {COD_COLUMNS} FROM bazaar.cod_collections c \
             JOIN bazaar.orders o ON o.id = c.order_id \
             WHERE {filter} \
             ORDER BY c.collected_at DESC, c.id DESC LIMIT $3 OFFSET $4"
        ))
        .bind(owner_id)
        .bind(status)
        .bind(page.sql_limit())
        .bind(page.sql_offset())
        .fetch_all(self.pool)
        .await?;

        let (total,): (i64,) = sqlx::query_as(&format!(
            "SELECT COUNT(*) FROM bazaar.cod_collections c \
             JOIN bazaar.orders o ON o.id = c.order_id \
             WHERE {filter}"
        ))
        .bind(owner_id)
        .bind(status)
        .fetch_one(self.pool)
        .await?;

        Ok((rows.into_iter().map(Into::into).collect(), total))
    }

    /// Cash a partner holds that the merchant has not confirmed yet.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn outstanding_for_partner(&self, partner_id: UserId) -> Result<Decimal, RepositoryError> {
        let (total,): (Decimal,) = sqlx::query_as(
            "SELECT COALESCE(SUM(amount), 0) FROM bazaar.cod_collections \
             WHERE partner_id = $1 AND status = 'collected'",
        )
        .bind(partner_id)
        .fetch_one(self.pool)
        .await?;

        Ok(total)
    }

    /// Get the collection recorded for an order.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_order(&self, order_id: OrderId) -> Result<Option<CodCollection>, RepositoryError> {
        let row = sqlx::query_as::<_, CodRow>(&format!(
            "SELECT {COD_COLUMNS} FROM bazaar.cod_collections c \
             JOIN bazaar.orders o ON o.id = c.order_id \
             WHERE c.order_id = $1"
        ))
        .bind(order_id)
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(Into::into))
    }

    /// Merchant received the cash: collection `confirmed`, order `paid`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if no cash was recorded for the order.
    /// Returns `RepositoryError::Conflict` if it was already confirmed.
    pub async fn confirm(&self, order_id: OrderId) -> Result<CodCollection, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query_as::<_, CodRow>(&format!(
            "UPDATE bazaar.cod_collections c SET status = 'confirmed', confirmed_at = NOW() \
             FROM bazaar.orders o \
             WHERE o.id = c.order_id AND c.order_id = $1 AND c.status = 'collected' \
             RETURNING {COD_COLUMNS}"
        ))
        .bind(order_id)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(row) = row else {
            let exists: Option<(CodCollectionId,)> =
                sqlx::query_as("SELECT id FROM bazaar.cod_collections WHERE order_id = $1")
                    .bind(order_id)
                    .fetch_optional(&mut *tx)
                    .await?;
            return Err(match exists {
                Some(_) => RepositoryError::Conflict("cash already confirmed".to_owned()),
                None => RepositoryError::NotFound,
            });
        };

        sqlx::query("UPDATE bazaar.orders SET payment_status = 'paid' WHERE id = $1")
            .bind(order_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(row.into())
    }
}
