//! Cart repository.
//!
//! A cart only ever holds products of one store. Adding a product from a
//! different store is refused unless the caller asks to replace the cart.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;

use bazaar_core::{ProductId, StoreId, UserId};

use super::RepositoryError;
use crate::models::cart::CartItem;

/// Internal row type for cart lines joined with their product.
#[derive(Debug, sqlx::FromRow)]
struct CartItemRow {
    product_id: ProductId,
    store_id: StoreId,
    name: String,
    image_url: Option<String>,
    price: Decimal,
    stock: i32,
    is_active: bool,
    quantity: i32,
    added_at: DateTime<Utc>,
}

impl From<CartItemRow> for CartItem {
    fn from(row: CartItemRow) -> Self {
        Self {
            product_id: row.product_id,
            store_id: row.store_id,
            name: row.name,
            image_url: row.image_url,
            price: row.price,
            stock: row.stock,
            is_active: row.is_active,
            quantity: row.quantity,
            line_total: row.price * Decimal::from(row.quantity),
            added_at: row.added_at,
        }
    }
}

/// Product facts checked before it goes into a cart.
#[derive(Debug, sqlx::FromRow)]
struct Purchasable {
    store_id: StoreId,
    stock: i32,
    is_active: bool,
    store_open: bool,
}

/// Repository for cart database operations.
pub struct CartRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> CartRepository<'a> {
    /// Create a new cart repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// All lines of the user's cart, oldest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn items(&self, user_id: UserId) -> Result<Vec<CartItem>, RepositoryError> {
        let rows = sqlx::query_as::<_, CartItemRow>(
            "SELECT c.product_id, p.store_id, p.name, p.image_url, p.price, p.stock, \
                    p.is_active, c.quantity, c.added_at \
             FROM bazaar.cart_items c \
             JOIN bazaar.products p ON p.id = c.product_id \
             WHERE c.user_id = $1 \
             ORDER BY c.added_at, c.product_id",
        )
        .bind(user_id)
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// Add `quantity` of a product, merging with an existing line.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the product is missing or inactive.
    /// Returns `RepositoryError::Conflict` if the store is closed, the stock is
    /// short, or the cart belongs to another store and `replace` is false.
    pub async fn add_item(
        &self,
        user_id: UserId,
        product_id: ProductId,
        quantity: i32,
        replace: bool,
    ) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let product = sqlx::query_as::<_, Purchasable>(
            "SELECT p.store_id, p.stock, p.is_active, s.is_open AS store_open \
             FROM bazaar.products p JOIN bazaar.stores s ON s.id = p.store_id \
             WHERE p.id = $1",
        )
        .bind(product_id)
        .fetch_optional(&mut *tx)
        .await?
        .filter(|p| p.is_active)
        .ok_or(RepositoryError::NotFound)?;

        if !product.store_open {
            return Err(RepositoryError::Conflict("store is closed".to_owned()));
        }

        let other_store: Option<(StoreId,)> = sqlx::query_as(
            "SELECT p.store_id FROM bazaar.cart_items c \
             JOIN bazaar.products p ON p.id = c.product_id \
             WHERE c.user_id = $1 AND p.store_id <> $2 \
             LIMIT 1",
        )
        .bind(user_id)
        .bind(product.store_id)
        .fetch_optional(&mut *tx)
        .await?;

        if other_store.is_some() {
            if !replace {
                return Err(RepositoryError::Conflict(
                    "cart contains items from another store".to_owned(),
                ));
            }
            sqlx::query("DELETE FROM bazaar.cart_items WHERE user_id = $1")
                .bind(user_id)
                .execute(&mut *tx)
                .await?;
        }

        let (new_quantity,): (i32,) = sqlx::query_as(
            "INSERT INTO bazaar.cart_items (user_id, product_id, quantity) \
             VALUES ($1, $2, $3) \
             ON CONFLICT (user_id, product_id) \
             DO UPDATE SET quantity = bazaar.cart_items.quantity + EXCLUDED.quantity \
             RETURNING quantity",
        )
        .bind(user_id)
        .bind(product_id)
        .bind(quantity)
        .fetch_one(&mut *tx)
        .await?;

        if new_quantity > product.stock {
            return Err(RepositoryError::Conflict(format!(
                "only {} in stock",
                product.stock
            )));
        }

        tx.commit().await?;
        Ok(())
    }

    /// Set the quantity of a line. Zero removes it.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the product is not in the cart.
    /// Returns `RepositoryError::Conflict` if the stock is short.
    pub async fn set_quantity(
        &self,
        user_id: UserId,
        product_id: ProductId,
        quantity: i32,
    ) -> Result<(), RepositoryError> {
        if quantity == 0 {
            return self.remove(user_id, product_id).await;
        }

        let stock: Option<(i32,)> = sqlx::query_as(
            "SELECT p.stock FROM bazaar.cart_items c \
             JOIN bazaar.products p ON p.id = c.product_id \
             WHERE c.user_id = $1 AND c.product_id = $2",
        )
        .bind(user_id)
        .bind(product_id)
        .fetch_optional(self.pool)
        .await?;
        let (stock,) = stock.ok_or(RepositoryError::NotFound)?;

        if quantity > stock {
            return Err(RepositoryError::Conflict(format!("only {stock} in stock")));
        }

        sqlx::query(
            "UPDATE bazaar.cart_items SET quantity = $3 WHERE user_id = $1 AND product_id = $2",
        )
        .bind(user_id)
        .bind(product_id)
        .bind(quantity)
        .execute(self.pool)
        .await?;
        Ok(())
    }

    /// Remove a line.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the product is not in the cart.
    pub async fn remove(&self, user_id: UserId, product_id: ProductId) -> Result<(), RepositoryError> {
        let result =
            sqlx::query("DELETE FROM bazaar.cart_items WHERE user_id = $1 AND product_id = $2")
                .bind(user_id)
                .bind(product_id)
                .execute(self.pool)
                .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    /// Empty the cart.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the delete fails.
    pub async fn clear(&self, user_id: UserId) -> Result<(), RepositoryError> {
        sqlx::query("DELETE FROM bazaar.cart_items WHERE user_id = $1")
            .bind(user_id)
            .execute(self.pool)
            .await?;
        Ok(())
    }
}
