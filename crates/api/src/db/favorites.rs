//! Favorite products repository.

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use bazaar_core::{Pagination, ProductId, UserId};

use super::RepositoryError;
use super::products::{PRODUCT_COLUMNS, ProductRow};
use crate::models::favorite::Favorite;

#[derive(Debug, sqlx::FromRow)]
struct FavoriteRow {
    #[sqlx(flatten)]
    product: ProductRow,
    favorited_at: DateTime<Utc>,
}

/// Repository for favorite database operations.
pub struct FavoriteRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> FavoriteRepository<'a> {
    /// Create a new favorite repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// The user's favorites, most recent first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(
        &self,
        user_id: UserId,
        page: &Pagination,
    ) -> Result<(Vec<Favorite>, i64), RepositoryError> {
        let rows = sqlx::query_as::<_, FavoriteRow>(&format!(
            "SELECT {PRODUCT_COLUMNS}, f.created_at AS favorited_at \
             FROM bazaar.favorites f JOIN bazaar.products p ON p.id = f.product_id \
             WHERE f.user_id = $1 \
             ORDER BY f.created_at DESC, p.id DESC LIMIT $2 OFFSET $3"
        ))
        .bind(user_id)
        .bind(page.sql_limit())
        .bind(page.sql_offset())
        .fetch_all(self.pool)
        .await?;

        let (total,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM bazaar.favorites WHERE user_id = $1")
                .bind(user_id)
                .fetch_one(self.pool)
                .await?;

        let favorites = rows
            .into_iter()
            .map(|r| Favorite {
                product: r.product.into(),
                favorited_at: r.favorited_at,
            })
            .collect();
        Ok((favorites, total))
    }

    /// Add a favorite. Adding it twice is a no-op.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the product does not exist.
    pub async fn add(&self, user_id: UserId, product_id: ProductId) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO bazaar.favorites (user_id, product_id) VALUES ($1, $2) \
             ON CONFLICT (user_id, product_id) DO NOTHING",
        )
        .bind(user_id)
        .bind(product_id)
        .execute(self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db_err) if db_err.is_foreign_key_violation() => {
                RepositoryError::NotFound
            }
            other => RepositoryError::Database(other),
        })?;
        Ok(())
    }

    /// Remove a favorite.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if it was not a favorite.
    pub async fn remove(&self, user_id: UserId, product_id: ProductId) -> Result<(), RepositoryError> {
        let result =
            sqlx::query("DELETE FROM bazaar.favorites WHERE user_id = $1 AND product_id = $2")
                .bind(user_id)
                .bind(product_id)
                .execute(self.pool)
                .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }
}
