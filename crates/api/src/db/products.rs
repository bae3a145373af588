//! Product repository.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;

use bazaar_core::{Pagination, ProductId, StoreId};

use super::{RepositoryError, contains_pattern};
use crate::models::product::{CreateProductInput, Product, ProductFilter, UpdateProductInput};

pub(crate) const PRODUCT_COLUMNS: &str = "p.id, p.store_id, p.name, p.description, p.category, \
     p.price, p.stock, p.image_url, p.is_active, p.created_at, p.updated_at";

/// Internal row type for product queries.
#[derive(Debug, sqlx::FromRow)]
pub(crate) struct ProductRow {
    id: ProductId,
    store_id: StoreId,
    name: String,
    description: Option<String>,
    category: Option<String>,
    price: Decimal,
    stock: i32,
    image_url: Option<String>,
    is_active: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<ProductRow> for Product {
    fn from(row: ProductRow) -> Self {
        Self {
            id: row.id,
            store_id: row.store_id,
            name: row.name,
            description: row.description,
            category: row.category,
            price: row.price,
            stock: row.stock,
            image_url: row.image_url,
            is_active: row.is_active,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// Repository for product database operations.
pub struct ProductRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> ProductRepository<'a> {
    /// Create a new product repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Create a product in `store_id`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the insert fails.
    pub async fn create(
        &self,
        store_id: StoreId,
        input: &CreateProductInput,
    ) -> Result<Product, RepositoryError> {
        let row = sqlx::query_as::<_, ProductRow>(&format!(
            "INSERT INTO bazaar.products AS p \
                 (store_id, name, description, category, price, stock, image_url) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) \
             RETURNING {PRODUCT_COLUMNS}"
        ))
        .bind(store_id)
        .bind(input.name.trim())
        .bind(input.description.as_deref())
        .bind(input.category.as_deref())
        .bind(input.price)
        .bind(input.stock)
        .bind(input.image_url.as_deref())
        .fetch_one(self.pool)
        .await?;

        Ok(row.into())
    }

    /// Get a product by ID, active or not.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(&self, id: ProductId) -> Result<Option<Product>, RepositoryError> {
        let row = sqlx::query_as::<_, ProductRow>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM bazaar.products p WHERE p.id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(Into::into))
    }

    /// Search active products.
    ///
    /// Without a `store_id`, products of closed stores are hidden.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn search(
        &self,
        filter: &ProductFilter,
        page: &Pagination,
    ) -> Result<(Vec<Product>, i64), RepositoryError> {
        const FILTER: &str = "p.is_active AND s.deleted_at IS NULL \
             AND ($1::text IS NULL OR p.name ILIKE $1 OR p.description ILIKE $1 OR p.category ILIKE $1) \
             AND ($2::bigint IS NULL OR p.store_id = $2) \
             AND ($2::bigint IS NOT NULL OR s.is_open) \
             AND ($3::text IS NULL OR p.category ILIKE $3) \
             AND ($4::numeric IS NULL OR p.price >= $4) \
             AND ($5::numeric IS NULL OR p.price <= $5)";

        let pattern = filter.q.as_deref().map(contains_pattern);

        let rows = sqlx::query_as::<_, ProductRow>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM bazaar.products p \
             JOIN bazaar.stores s ON s.id = p.store_id \
             WHERE {FILTER} \
             ORDER BY p.created_at DESC, p.id DESC \
             LIMIT $6 OFFSET $7"
        ))
        .bind(pattern.as_deref())
        .bind(filter.store_id)
        .bind(filter.category.as_deref())
        .bind(filter.min_price)
        .bind(filter.max_price)
        .bind(page.sql_limit())
        .bind(page.sql_offset())
        .fetch_all(self.pool)
        .await?;

        let (total,): (i64,) = sqlx::query_as(&format!(
            "SELECT COUNT(*) FROM bazaar.products p \
             JOIN bazaar.stores s ON s.id = p.store_id \
             WHERE {FILTER}"
        ))
        .bind(pattern.as_deref())
        .bind(filter.store_id)
        .bind(filter.category.as_deref())
        .bind(filter.min_price)
        .bind(filter.max_price)
        .fetch_one(self.pool)
        .await?;

        Ok((rows.into_iter().map(Into::into).collect(), total))
    }

    /// Apply a partial update.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the product does not exist.
    pub async fn update(
        &self,
        id: ProductId,
        input: &UpdateProductInput,
    ) -> Result<Product, RepositoryError> {
        let row = sqlx::query_as::<_, ProductRow>(&format!(
            "UPDATE bazaar.products AS p SET \
                 name = COALESCE($2, name), \
                 description = COALESCE($3, description), \
                 category = COALESCE($4, category), \
                 price = COALESCE($5, price), \
                 stock = COALESCE($6, stock), \
                 image_url = COALESCE($7, image_url), \
                 is_active = COALESCE($8, is_active) \
             WHERE p.id = $1 \
             RETURNING {PRODUCT_COLUMNS}"
        ))
        .bind(id)
        .bind(input.name.as_deref().map(str::trim))
        .bind(input.description.as_deref())
        .bind(input.category.as_deref())
        .bind(input.price)
        .bind(input.stock)
        .bind(input.image_url.as_deref())
        .bind(input.is_active)
        .fetch_optional(self.pool)
        .await?
        .ok_or(RepositoryError::NotFound)?;

        Ok(row.into())
    }

    /// Take a product off sale. Order history keeps referencing it.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the product does not exist.
    pub async fn deactivate(&self, id: ProductId) -> Result<(), RepositoryError> {
        let result = sqlx::query("UPDATE bazaar.products SET is_active = FALSE WHERE id = $1")
            .bind(id)
            .execute(self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        // Nobody can buy it any more.
        sqlx::query("DELETE FROM bazaar.cart_items WHERE product_id = $1")
            .bind(id)
            .execute(self.pool)
            .await?;
        Ok(())
    }
}
