//! Cart domain types.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use bazaar_core::{ProductId, StoreId, round_money};

/// One cart line joined with the current product data.
#[derive(Debug, Clone, Serialize)]
pub struct CartItem {
    pub product_id: ProductId,
    pub store_id: StoreId,
    pub name: String,
    pub image_url: Option<String>,
    pub price: Decimal,
    pub stock: i32,
    pub is_active: bool,
    pub quantity: i32,
    pub line_total: Decimal,
    pub added_at: DateTime<Utc>,
}

/// The whole cart with totals.
#[derive(Debug, Clone, Serialize)]
pub struct Cart {
    pub store_id: Option<StoreId>,
    pub items: Vec<CartItem>,
    pub subtotal: Decimal,
    pub delivery_fee: Decimal,
    pub total: Decimal,
}

impl Cart {
    /// Total up `items`. An empty cart carries no delivery fee.
    #[must_use]
    pub fn from_items(items: Vec<CartItem>, delivery_fee: Decimal) -> Self {
        let subtotal = round_money(items.iter().map(|i| i.line_total).sum());
        let delivery_fee = if items.is_empty() {
            Decimal::ZERO
        } else {
            delivery_fee
        };
        Self {
            store_id: items.first().map(|i| i.store_id),
            items,
            subtotal,
            delivery_fee,
            total: subtotal + delivery_fee,
        }
    }
}

/// `POST /cart/items` body.
#[derive(Debug, Deserialize)]
pub struct AddItemInput {
    pub product_id: ProductId,
    pub quantity: i32,
    /// Empty a cart holding another store's products first.
    #[serde(default)]
    pub replace: bool,
}

/// `PUT /cart/items/{product_id}` body.
#[derive(Debug, Deserialize)]
pub struct UpdateItemInput {
    pub quantity: i32,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::str::FromStr;

    use super::*;

    fn item(price: &str, quantity: i32) -> CartItem {
        let price = Decimal::from_str(price).unwrap();
        CartItem {
            product_id: ProductId::new(1),
            store_id: StoreId::new(9),
            name: "Chai".to_string(),
            image_url: None,
            price,
            stock: 10,
            is_active: true,
            quantity,
            line_total: price * Decimal::from(quantity),
            added_at: Utc::now(),
        }
    }

    #[test]
    fn test_cart_totals() {
        let cart = Cart::from_items(
            vec![item("12.50", 2), item("3.25", 1)],
            Decimal::from(40),
        );
        assert_eq!(cart.store_id, Some(StoreId::new(9)));
        assert_eq!(cart.subtotal, Decimal::from_str("28.25").unwrap());
        assert_eq!(cart.total, Decimal::from_str("68.25").unwrap());
    }

    #[test]
    fn test_empty_cart_has_no_fee() {
        let cart = Cart::from_items(Vec::new(), Decimal::from(40));
        assert_eq!(cart.store_id, None);
        assert_eq!(cart.total, Decimal::ZERO);
    }
}
