//! Settlement domain types.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use bazaar_core::{SettlementId, SettlementStatus, StoreId};

/// A merchant payout for a period.
#[derive(Debug, Clone, Serialize)]
pub struct Settlement {
    pub id: SettlementId,
    pub store_id: StoreId,
    pub period_start: NaiveDate,
    pub period_end: NaiveDate,
    pub order_count: i64,
    pub gross_amount: Decimal,
    pub commission_percent: Decimal,
    pub commission_amount: Decimal,
    pub net_amount: Decimal,
    pub status: SettlementStatus,
    pub payout_reference: Option<String>,
    pub paid_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// `POST /settlement/generate` body. Both dates are inclusive.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct SettlementPeriod {
    pub period_start: NaiveDate,
    pub period_end: NaiveDate,
}

impl SettlementPeriod {
    /// Start must not be after end.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.period_start <= self.period_end
    }
}
