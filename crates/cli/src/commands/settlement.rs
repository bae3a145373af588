//! Settlement commands.
//!
//! Settlements are operator-triggered: `run` settles every store for a
//! closed period, `mark-paid` records the payout once money has moved.

use chrono::NaiveDate;
use thiserror::Error;

use bazaar_api::config::MarketplaceConfig;
use bazaar_api::db::{RepositoryError, SettlementRepository, StoreRepository};
use bazaar_api::models::settlement::SettlementPeriod;
use bazaar_core::SettlementId;

use super::{ConnectError, connect};

/// Errors that can occur during settlement operations.
#[derive(Debug, Error)]
pub enum SettlementError {
    #[error(transparent)]
    Connect(#[from] ConnectError),

    #[error("Invalid period: {0} is after {1}")]
    InvalidPeriod(NaiveDate, NaiveDate),

    #[error("Configuration error: {0}")]
    Config(#[from] bazaar_api::config::ConfigError),

    #[error("Settlement {0} not found")]
    NotFound(SettlementId),

    #[error("Database error: {0}")]
    Repository(#[from] RepositoryError),
}

/// Generate settlements for every store with eligible orders.
///
/// Stores with nothing to settle are skipped; a failure on one store aborts
/// the run, leaving earlier stores settled.
pub async fn run(from: NaiveDate, to: NaiveDate) -> Result<(), SettlementError> {
    let period = SettlementPeriod {
        period_start: from,
        period_end: to,
    };
    if !period.is_valid() {
        return Err(SettlementError::InvalidPeriod(from, to));
    }

    let pool = connect().await?;
    let commission = MarketplaceConfig::from_env()?.commission_percent;
    let stores = StoreRepository::new(&pool).list_ids().await?;
    let settlements = SettlementRepository::new(&pool);

    tracing::info!(stores = stores.len(), %from, %to, %commission, "Running settlements");
    let mut generated = 0usize;
    for store_id in stores {
        match settlements.generate(store_id, &period, commission).await {
            Ok(settlement) => {
                generated += 1;
                tracing::info!(
                    settlement_id = %settlement.id,
                    store_id = %store_id,
                    orders = settlement.order_count,
                    net = %settlement.net_amount,
                    "Settlement generated"
                );
            }
            Err(RepositoryError::Conflict(_)) => {
                tracing::debug!(store_id = %store_id, "Nothing to settle");
            }
            Err(e) => return Err(e.into()),
        }
    }

    tracing::info!(generated, "Settlement run complete");
    Ok(())
}

/// Mark a pending settlement as paid.
pub async fn mark_paid(id: i64, reference: &str) -> Result<(), SettlementError> {
    let id = SettlementId::new(id);
    let pool = connect().await?;

    let settlement = SettlementRepository::new(&pool)
        .mark_paid(id, reference.trim())
        .await
        .map_err(|e| match e {
            RepositoryError::NotFound => SettlementError::NotFound(id),
            other => other.into(),
        })?;

    tracing::info!(
        settlement_id = %settlement.id,
        net = %settlement.net_amount,
        reference = settlement.payout_reference.as_deref().unwrap_or_default(),
        "Settlement marked paid"
    );
    Ok(())
}
