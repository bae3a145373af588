//! Store repository.
//!
//! Deleting a store only stamps `deleted_at`; orders keep pointing at it.

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use bazaar_core::{Coordinates, Pagination, StoreId, UserId};

use super::{RepositoryError, contains_pattern};
use crate::models::store::{CreateStoreInput, Store, UpdateStoreInput};

const STORE_COLUMNS: &str = "id, owner_id, name, description, category, address, latitude, \
                             longitude, phone, image_url, is_open, created_at, updated_at";

/// Great-circle distance from ($3, $4) in km.
const DISTANCE_SQL: &str = "6371.0 * acos(LEAST(1.0, GREATEST(-1.0, \
    cos(radians($3::float8)) * cos(radians(latitude)) * cos(radians(longitude) - radians($4::float8)) \
    + sin(radians($3::float8)) * sin(radians(latitude)))))";

/// Internal row type for store queries.
#[derive(Debug, sqlx::FromRow)]
struct StoreRow {
    id: StoreId,
    owner_id: UserId,
    name: String,
    description: Option<String>,
    category: Option<String>,
    address: String,
    latitude: Option<f64>,
    longitude: Option<f64>,
    phone: Option<String>,
    image_url: Option<String>,
    is_open: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    #[sqlx(default)]
    distance_km: Option<f64>,
}

impl From<StoreRow> for Store {
    fn from(row: StoreRow) -> Self {
        Self {
            id: row.id,
            owner_id: row.owner_id,
            name: row.name,
            description: row.description,
            category: row.category,
            address: row.address,
            latitude: row.latitude,
            longitude: row.longitude,
            phone: row.phone,
            image_url: row.image_url,
            is_open: row.is_open,
            created_at: row.created_at,
            updated_at: row.updated_at,
            distance_km: row.distance_km,
        }
    }
}

/// Search criteria for the public store list.
#[derive(Debug, Clone, Default)]
pub struct StoreSearch {
    pub query: Option<String>,
    pub category: Option<String>,
    pub near: Option<(Coordinates, f64)>,
}

/// Repository for store database operations.
pub struct StoreRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> StoreRepository<'a> {
    /// Create a new store repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Create a store owned by `owner_id`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the merchant already has a store.
    pub async fn create(
        &self,
        owner_id: UserId,
        input: &CreateStoreInput,
    ) -> Result<Store, RepositoryError> {
        let row = sqlx::query_as::<_, StoreRow>(&format!(
            "INSERT INTO bazaar.stores \
                 (owner_id, name, description, category, address, latitude, longitude, phone, image_url) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) \
             RETURNING {STORE_COLUMNS}"
        ))
        .bind(owner_id)
        .bind(input.name.trim())
        .bind(input.description.as_deref())
        .bind(input.category.as_deref())
        .bind(input.address.trim())
        .bind(input.latitude)
        .bind(input.longitude)
        .bind(input.phone.as_deref())
        .bind(input.image_url.as_deref())
        .fetch_one(self.pool)
        .await
        .map_err(|e| RepositoryError::unique_or(e, "merchant already has a store"))?;

        Ok(row.into())
    }

    /// Get a live store by ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(&self, id: StoreId) -> Result<Option<Store>, RepositoryError> {
        let row = sqlx::query_as::<_, StoreRow>(&format!(
            "SELECT {STORE_COLUMNS} FROM bazaar.stores WHERE id = $1 AND deleted_at IS NULL"
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(Into::into))
    }

    /// Get the merchant's live store.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_owner(&self, owner_id: UserId) -> Result<Option<Store>, RepositoryError> {
        let row = sqlx::query_as::<_, StoreRow>(&format!(
            "SELECT {STORE_COLUMNS} FROM bazaar.stores \
             WHERE owner_id = $1 AND deleted_at IS NULL"
        ))
        .bind(owner_id)
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(Into::into))
    }

    /// Search stores. Proximity searches sort nearest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn search(
        &self,
        search: &StoreSearch,
        page: &Pagination,
    ) -> Result<(Vec<Store>, i64), RepositoryError> {
        let filter = format!(
            "deleted_at IS NULL \
             AND ($1::text IS NULL OR name ILIKE $1 OR category ILIKE $1) \
             AND ($2::text IS NULL OR category ILIKE $2) \
             AND ($3::float8 IS NULL OR $4::float8 IS NULL OR \
                  (latitude IS NOT NULL AND longitude IS NOT NULL AND {DISTANCE_SQL} <= $5::float8))"
        );
        let pattern = search.query.as_deref().map(contains_pattern);
        let (lat, lng, radius) = match search.near {
            Some((origin, radius)) => (Some(origin.latitude), Some(origin.longitude), Some(radius)),
            None => (None, None, None),
        };

        let rows = sqlx::query_as::<_, StoreRow>(&format!(
            "SELECT {STORE_COLUMNS}, \
                 CASE WHEN $3::float8 IS NULL OR $4::float8 IS NULL THEN NULL \
                      ELSE {DISTANCE_SQL} END AS distance_km \
             FROM bazaar.stores WHERE {filter} \
             ORDER BY distance_km ASC NULLS LAST, created_at DESC \
             LIMIT $6 OFFSET $7"
        ))
        .bind(pattern.as_deref())
        .bind(search.category.as_deref())
        .bind(lat)
        .bind(lng)
        .bind(radius)
        .bind(page.sql_limit())
        .bind(page.sql_offset())
        .fetch_all(self.pool)
        .await?;

        let (total,): (i64,) =
            sqlx::query_as(&format!("SELECT COUNT(*) FROM bazaar.stores WHERE {filter}"))
                .bind(pattern.as_deref())
                .bind(search.category.as_deref())
                .bind(lat)
                .bind(lng)
                .bind(radius)
                .fetch_one(self.pool)
                .await?;

        Ok((rows.into_iter().map(Into::into).collect(), total))
    }

    /// Apply a partial update.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the store does not exist.
    pub async fn update(
        &self,
        id: StoreId,
        input: &UpdateStoreInput,
    ) -> Result<Store, RepositoryError> {
        let row = sqlx::query_as::<_, StoreRow>(&format!(
            "UPDATE bazaar.stores SET \
                 name = COALESCE($2, name), \
                 description = COALESCE($3, description), \
                 category = COALESCE($4, category), \
                 address = COALESCE($5, address), \
                 latitude = COALESCE($6, latitude), \
                 longitude = COALESCE($7, longitude), \
                 phone = COALESCE($8, phone), \
                 image_url = COALESCE($9, image_url), \
                 is_open = COALESCE($10, is_open) \
             WHERE id = $1 AND deleted_at IS NULL \
             RETURNING {STORE_COLUMNS}"
        ))
        .bind(id)
        .bind(input.name.as_deref().map(str::trim))
        .bind(input.description.as_deref())
        .bind(input.category.as_deref())
        .bind(input.address.as_deref().map(str::trim))
        .bind(input.latitude)
        .bind(input.longitude)
        .bind(input.phone.as_deref())
        .bind(input.image_url.as_deref())
        .bind(input.is_open)
        .fetch_optional(self.pool)
        .await?
        .ok_or(RepositoryError::NotFound)?;

        Ok(row.into())
    }

    /// Delete a store and take its products off sale.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` while the store has unfinished orders.
    /// Returns `RepositoryError::NotFound` if the store does not exist.
    pub async fn delete(&self, id: StoreId) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await?;

        // Lock the store so no checkout can slip in between the check and the delete.
        let locked: Option<(StoreId,)> = sqlx::query_as(
            "SELECT id FROM bazaar.stores WHERE id = $1 AND deleted_at IS NULL FOR UPDATE",
        )
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?;
        if locked.is_none() {
            return Err(RepositoryError::NotFound);
        }

        let (open_orders,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM bazaar.orders \
             WHERE store_id = $1 AND status NOT IN ('delivered', 'rejected', 'cancelled')",
        )
        .bind(id)
        .fetch_one(&mut *tx)
        .await?;
        if open_orders > 0 {
            return Err(RepositoryError::Conflict(format!(
                "store has {open_orders} unfinished order(s)"
            )));
        }

        sqlx::query(
            "UPDATE bazaar.stores SET deleted_at = NOW(), is_open = FALSE WHERE id = $1",
        )
        .bind(id)
        .execute(&mut *tx)
        .await?;
        sqlx::query("UPDATE bazaar.products SET is_active = FALSE WHERE store_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }

    /// Every store, deleted ones included, for operator tooling.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_ids(&self) -> Result<Vec<StoreId>, RepositoryError> {
        let rows: Vec<(StoreId,)> =
            sqlx::query_as("SELECT id FROM bazaar.stores ORDER BY id")
                .fetch_all(self.pool)
                .await?;
        Ok(rows.into_iter().map(|(id,)| id).collect())
    }
}
