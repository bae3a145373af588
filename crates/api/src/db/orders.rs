//! Order repository.
//!
//! Status changes are compare-and-set on the current status: an update that
//! finds the order in a different state than the caller read affects no rows
//! and is reported as a conflict.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{PgConnection, PgPool};

use bazaar_core::{
    OrderId, OrderItemId, OrderStatus, Pagination, PaymentMethod, PaymentStatus, ProductId,
    SettlementId, StoreId, UserId, round_money,
};

use super::RepositoryError;
use crate::models::order::{NewOrder, Order, OrderItem};

pub(crate) const ORDER_COLUMNS: &str = "o.id, o.customer_id, o.store_id, o.status, \
     o.payment_method, o.payment_status, o.subtotal, o.delivery_fee, o.total, \
     o.delivery_address, o.delivery_latitude, o.delivery_longitude, o.notes, \
     o.delivery_otp, o.settlement_id, o.delivered_at, o.created_at, o.updated_at";

/// Internal row type for order queries.
#[derive(Debug, sqlx::FromRow)]
pub(crate) struct OrderRow {
    id: OrderId,
    customer_id: UserId,
    store_id: StoreId,
    status: OrderStatus,
    payment_method: PaymentMethod,
    payment_status: PaymentStatus,
    subtotal: Decimal,
    delivery_fee: Decimal,
    total: Decimal,
    delivery_address: String,
    delivery_latitude: Option<f64>,
    delivery_longitude: Option<f64>,
    notes: Option<String>,
    delivery_otp: String,
    settlement_id: Option<SettlementId>,
    delivered_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<OrderRow> for Order {
    fn from(row: OrderRow) -> Self {
        Self {
            id: row.id,
            customer_id: row.customer_id,
            store_id: row.store_id,
            status: row.status,
            payment_method: row.payment_method,
            payment_status: row.payment_status,
            subtotal: row.subtotal,
            delivery_fee: row.delivery_fee,
            total: row.total,
            delivery_address: row.delivery_address,
            delivery_latitude: row.delivery_latitude,
            delivery_longitude: row.delivery_longitude,
            notes: row.notes,
            delivery_otp: Some(row.delivery_otp),
            settlement_id: row.settlement_id,
            delivered_at: row.delivered_at,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// Internal row type for order items.
#[derive(Debug, sqlx::FromRow)]
struct OrderItemRow {
    id: OrderItemId,
    order_id: OrderId,
    product_id: ProductId,
    product_name: String,
    unit_price: Decimal,
    quantity: i32,
    line_total: Decimal,
}

impl From<OrderItemRow> for OrderItem {
    fn from(row: OrderItemRow) -> Self {
        Self {
            id: row.id,
            order_id: row.order_id,
            product_id: row.product_id,
            product_name: row.product_name,
            unit_price: row.unit_price,
            quantity: row.quantity,
            line_total: row.line_total,
        }
    }
}

/// A cart line with its product locked for checkout.
#[derive(Debug, sqlx::FromRow)]
struct LockedLine {
    product_id: ProductId,
    store_id: StoreId,
    name: String,
    price: Decimal,
    stock: i32,
    is_active: bool,
    quantity: i32,
}

/// Repository for order database operations.
pub struct OrderRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> OrderRepository<'a> {
    /// Create a new order repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Turn the customer's cart into an order.
    ///
    /// Locks the products, checks availability, takes the stock, snapshots
    /// prices and empties the cart, all in one transaction.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Invalid` for an empty cart, and
    /// `RepositoryError::Conflict` for a closed store, an unavailable product
    /// or short stock.
    pub async fn checkout(&self, new: &NewOrder) -> Result<(Order, Vec<OrderItem>), RepositoryError> {
        let mut tx = self.pool.begin().await?;

        // Lock in id order so concurrent checkouts cannot deadlock.
        let lines = sqlx::query_as::<_, LockedLine>(
            "SELECT c.product_id, p.store_id, p.name, p.price, p.stock, p.is_active, c.quantity \
             FROM bazaar.cart_items c \
             JOIN bazaar.products p ON p.id = c.product_id \
             WHERE c.user_id = $1 \
             ORDER BY p.id \
             FOR UPDATE OF p",
        )
        .bind(new.customer_id)
        .fetch_all(&mut *tx)
        .await?;

        let Some(store_id) = lines.first().map(|l| l.store_id) else {
            return Err(RepositoryError::Invalid("Your cart is empty".to_owned()));
        };
        if lines.iter().any(|l| l.store_id != store_id) {
            return Err(RepositoryError::DataCorruption(format!(
                "cart of user {} spans several stores",
                new.customer_id
            )));
        }

        let store_open: Option<(bool,)> = sqlx::query_as(
            "SELECT is_open FROM bazaar.stores \
             WHERE id = $1 AND deleted_at IS NULL FOR SHARE",
        )
        .bind(store_id)
        .fetch_optional(&mut *tx)
        .await?;
        if !matches!(store_open, Some((true,))) {
            return Err(RepositoryError::Conflict("store is closed".to_owned()));
        }

        let mut subtotal = Decimal::ZERO;
        for line in &lines {
            if !line.is_active {
                return Err(RepositoryError::Conflict(format!(
                    "{} is no longer available",
                    line.name
                )));
            }
            if line.stock < line.quantity {
                return Err(RepositoryError::Conflict(format!(
                    "insufficient stock for {} ({} left)",
                    line.name, line.stock
                )));
            }
            subtotal += round_money(line.price * Decimal::from(line.quantity));

            sqlx::query("UPDATE bazaar.products SET stock = stock - $2 WHERE id = $1")
                .bind(line.product_id)
                .bind(line.quantity)
                .execute(&mut *tx)
                .await?;
        }

        let order = sqlx::query_as::<_, OrderRow>(&format!(
            "INSERT INTO bazaar.orders AS o \
                 (customer_id, store_id, payment_method, subtotal, delivery_fee, total, \
                  delivery_address, delivery_latitude, delivery_longitude, notes, delivery_otp) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11) \
             RETURNING {ORDER_COLUMNS}"
        ))
        .bind(new.customer_id)
        .bind(store_id)
        .bind(new.payment_method)
        .bind(subtotal)
        .bind(new.delivery_fee)
        .bind(subtotal + new.delivery_fee)
        .bind(&new.delivery_address)
        .bind(new.delivery_location.map(|c| c.latitude))
        .bind(new.delivery_location.map(|c| c.longitude))
        .bind(new.notes.as_deref())
        .bind(&new.delivery_otp)
        .fetch_one(&mut *tx)
        .await?;

        let mut items = Vec::with_capacity(lines.len());
        for line in &lines {
            let item = sqlx::query_as::<_, OrderItemRow>(
                "INSERT INTO bazaar.order_items \
                     (order_id, product_id, product_name, unit_price, quantity, line_total) \
                 VALUES ($1, $2, $3, $4, $5, $6) \
                 RETURNING id, order_id, product_id, product_name, unit_price, quantity, line_total",
            )
            .bind(order.id)
            .bind(line.product_id)
            .bind(&line.name)
            .bind(line.price)
            .bind(line.quantity)
            .bind(round_money(line.price * Decimal::from(line.quantity)))
            .fetch_one(&mut *tx)
            .await?;
            items.push(item.into());
        }

        sqlx::query("DELETE FROM bazaar.cart_items WHERE user_id = $1")
            .bind(new.customer_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok((order.into(), items))
    }

    /// Get an order by ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(&self, id: OrderId) -> Result<Option<Order>, RepositoryError> {
        let row = sqlx::query_as::<_, OrderRow>(&format!(
            "SELECT {ORDER_COLUMNS} FROM bazaar.orders o WHERE o.id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(Into::into))
    }

    /// Items of an order.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn items(&self, order_id: OrderId) -> Result<Vec<OrderItem>, RepositoryError> {
        let rows = sqlx::query_as::<_, OrderItemRow>(
            "SELECT id, order_id, product_id, product_name, unit_price, quantity, line_total \
             FROM bazaar.order_items WHERE order_id = $1 ORDER BY id",
        )
        .bind(order_id)
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// A customer's orders, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_for_customer(
        &self,
        customer_id: UserId,
        status: Option<OrderStatus>,
        page: &Pagination,
    ) -> Result<(Vec<Order>, i64), RepositoryError> {
        self.list_where("o.customer_id = $1", customer_id.as_i64(), status, page)
            .await
    }

    /// A store's orders, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_for_store(
        &self,
        store_id: StoreId,
        status: Option<OrderStatus>,
        page: &Pagination,
    ) -> Result<(Vec<Order>, i64), RepositoryError> {
        self.list_where("o.store_id = $1", store_id.as_i64(), status, page)
            .await
    }

    async fn list_where(
        &self,
        owner_clause: &str,
        owner_id: i64,
        status: Option<OrderStatus>,
        page: &Pagination,
    ) -> Result<(Vec<Order>, i64), RepositoryError> {
        let filter = format!(
            "{owner_clause} AND ($2::bazaar.order_status IS NULL OR o.status = $2)"
        );

        let rows = sqlx::query_as::<_, OrderRow>(&format!(
            "SELECT {ORDER_COLUMNS} FROM bazaar.orders o WHERE {filter} \
             ORDER BY o.created_at DESC, o.id DESC LIMIT $3 OFFSET $4"
        ))
        .bind(owner_id)
        .bind(status)
        .bind(page.sql_limit())
        .bind(page.sql_offset())
        .fetch_all(self.pool)
        .await?;

        let (total,): (i64,) =
            sqlx::query_as(&format!("SELECT COUNT(*) FROM bazaar.orders o WHERE {filter}"))
                .bind(owner_id)
                .bind(status)
                .fetch_one(self.pool)
                .await?;

        Ok((rows.into_iter().map(Into::into).collect(), total))
    }

    /// Move an order from `from` to `to`, returning stock when `to` releases it.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the order is no longer in `from`.
    pub async fn transition(
        &self,
        id: OrderId,
        from: OrderStatus,
        to: OrderStatus,
    ) -> Result<Order, RepositoryError> {
        let mut tx = self.pool.begin().await?;
        let order = set_status(&mut tx, id, from, to).await?;

        if to.releases_stock() {
            restore_stock(&mut tx, id).await?;
        }

        tx.commit().await?;
        Ok(order)
    }

    /// Overwrite the order's payment status.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the order does not exist.
    pub async fn set_payment_status(
        &self,
        id: OrderId,
        status: PaymentStatus,
    ) -> Result<(), RepositoryError> {
        let result = sqlx::query("UPDATE bazaar.orders SET payment_status = $2 WHERE id = $1")
            .bind(id)
            .bind(status)
            .execute(self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }
}

/// Compare-and-set the order status inside a transaction.
pub(crate) async fn set_status(
    conn: &mut PgConnection,
    id: OrderId,
    from: OrderStatus,
    to: OrderStatus,
) -> Result<Order, RepositoryError> {
    let row = sqlx::query_as::<_, OrderRow>(&format!(
        "UPDATE bazaar.orders o SET status = $3, \
             delivered_at = CASE WHEN $3 = 'delivered'::bazaar.order_status THEN NOW() ELSE o.delivered_at END \
         WHERE o.id = $1 AND o.status = $2 \
         RETURNING {ORDER_COLUMNS}"
    ))
    .bind(id)
    .bind(from)
    .bind(to)
    .fetch_optional(&mut *conn)
    .await?;

    row.map(Into::into).ok_or_else(|| {
        RepositoryError::Conflict(format!("order {id} is no longer {from}"))
    })
}

/// Put an order's quantities back on the shelf.
async fn restore_stock(conn: &mut PgConnection, id: OrderId) -> Result<(), RepositoryError> {
    sqlx::query(
        "UPDATE bazaar.products p SET stock = p.stock + i.quantity \
         FROM bazaar.order_items i \
         WHERE i.order_id = $1 AND p.id = i.product_id",
    )
    .bind(id)
    .execute(&mut *conn)
    .await?;
    Ok(())
}
