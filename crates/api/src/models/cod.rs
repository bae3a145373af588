//! Cash-on-delivery collection types.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use bazaar_core::{CodCollectionId, CodStatus, OrderId, StoreId, UserId};

/// Cash a partner took at the door.
#[derive(Debug, Clone, Serialize)]
pub struct CodCollection {
    pub id: CodCollectionId,
    pub order_id: OrderId,
    pub store_id: StoreId,
    pub partner_id: UserId,
    pub amount: Decimal,
    pub status: CodStatus,
    pub collected_at: DateTime<Utc>,
    pub confirmed_at: Option<DateTime<Utc>>,
}

/// `status` plus paging for collection lists.
#[derive(Debug, Default, Deserialize)]
pub struct CodFilter {
    pub status: Option<CodStatus>,
    pub page: Option<u32>,
    pub limit: Option<u32>,
}
