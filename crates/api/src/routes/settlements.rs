//! Merchant settlements.

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    routing::{get, post},
};

use bazaar_core::SettlementId;

use crate::db::SettlementRepository;
use crate::error::{AppError, Result};
use crate::middleware::RequireMerchant;
use crate::models::PageQuery;
use crate::models::settlement::SettlementPeriod;
use crate::response::ApiResponse;
use crate::services::merchant_store;
use crate::state::AppState;

/// Build the settlement router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list))
        .route("/generate", post(generate))
        .route("/{id}", get(show))
}

/// POST /api/v1/settlement/generate
async fn generate(
    RequireMerchant(user): RequireMerchant,
    State(state): State<AppState>,
    Json(period): Json<SettlementPeriod>,
) -> Result<ApiResponse> {
    if !period.is_valid() {
        return Err(AppError::BadRequest(
            "period_start must not be after period_end".to_string(),
        ));
    }
    let store = merchant_store(state.pool(), user.id).await?;

    let settlement = SettlementRepository::new(state.pool())
        .generate(
            store.id,
            &period,
            state.config().marketplace.commission_percent,
        )
        .await?;
    tracing::info!(
        settlement_id = %settlement.id,
        store_id = %store.id,
        orders = settlement.order_count,
        net = %settlement.net_amount,
        "Settlement generated"
    );

    ApiResponse::created("Settlement generated").with("settlement", &settlement)
}

/// GET /api/v1/settlement
async fn list(
    RequireMerchant(user): RequireMerchant,
    State(state): State<AppState>,
    Query(page): Query<PageQuery>,
) -> Result<ApiResponse> {
    let store = merchant_store(state.pool(), user.id).await?;
    let page = page.pagination();
    let (settlements, total) = SettlementRepository::new(state.pool())
        .list_for_store(store.id, &page)
        .await?;

    ApiResponse::ok("Settlements")
        .with("settlements", &settlements)?
        .with_page(&page, total)
}

/// GET /api/v1/settlement/{id}
async fn show(
    RequireMerchant(user): RequireMerchant,
    State(state): State<AppState>,
    Path(id): Path<SettlementId>,
) -> Result<ApiResponse> {
    let store = merchant_store(state.pool(), user.id).await?;
    let repo = SettlementRepository::new(state.pool());
    let settlement = repo
        .get(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Settlement {id} not found")))?;
    if settlement.store_id != store.id {
        return Err(AppError::Forbidden(
            "This settlement belongs to another store".to_string(),
        ));
    }
    let orders = repo.orders(id).await?;

    ApiResponse::ok("Settlement")
        .with("settlement", &settlement)?
        .with("orders", &orders)
}
