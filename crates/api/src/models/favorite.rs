//! Favorite product types.

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::product::Product;

/// A favorited product with the time it was saved.
#[derive(Debug, Clone, Serialize)]
pub struct Favorite {
    pub product: Product,
    pub favorited_at: DateTime<Utc>,
}
