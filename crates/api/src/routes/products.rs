//! Product catalog routes.

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    routing::get,
};
use rust_decimal::Decimal;

use bazaar_core::{ProductId, UserId, round_money};

use crate::db::{ProductRepository, StoreRepository};
use crate::error::{AppError, Result};
use crate::middleware::RequireMerchant;
use crate::models::non_blank;
use crate::models::product::{CreateProductInput, Product, ProductFilter, UpdateProductInput};
use crate::models::PageQuery;
use crate::response::ApiResponse;
use crate::routes::{check_length, required_text};
use crate::services::merchant_store;
use crate::state::AppState;

/// Build the product router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list).post(create))
        .route("/{id}", get(show).put(update).delete(remove))
}

/// POST /api/v1/product
async fn create(
    RequireMerchant(user): RequireMerchant,
    State(state): State<AppState>,
    Json(input): Json<CreateProductInput>,
) -> Result<ApiResponse> {
    let store = merchant_store(state.pool(), user.id).await?;

    let input = CreateProductInput {
        name: required_text(&input.name, "name", 200)?,
        description: non_blank(input.description.as_deref()),
        category: non_blank(input.category.as_deref()),
        price: valid_price(input.price)?,
        stock: valid_stock(input.stock)?,
        image_url: non_blank(input.image_url.as_deref()),
    };
    check_length(input.description.as_deref(), "description", 5000)?;

    let product = ProductRepository::new(state.pool())
        .create(store.id, &input)
        .await?;
    tracing::info!(product_id = %product.id, store_id = %store.id, "Product created");

    ApiResponse::created("Product created").with("product", &product)
}

/// GET /api/v1/product
async fn list(
    State(state): State<AppState>,
    Query(filter): Query<ProductFilter>,
) -> Result<ApiResponse> {
    if let (Some(min), Some(max)) = (filter.min_price, filter.max_price)
        && min > max
    {
        return Err(AppError::BadRequest(
            "min_price cannot exceed max_price".to_string(),
        ));
    }

    let page = PageQuery {
        page: filter.page,
        limit: filter.limit,
    }
    .pagination();
    let filter = ProductFilter {
        q: non_blank(filter.q.as_deref()),
        category: non_blank(filter.category.as_deref()),
        ..filter
    };
    let (products, total) = ProductRepository::new(state.pool())
        .search(&filter, &page)
        .await?;

    ApiResponse::ok("Products")
        .with("products", &products)?
        .with_page(&page, total)
}

/// GET /api/v1/product/{id}
async fn show(State(state): State<AppState>, Path(id): Path<ProductId>) -> Result<ApiResponse> {
    let product = find_product(&state, id).await?;
    if !product.is_active {
        return Err(AppError::NotFound(format!("Product {id} not found")));
    }
    ApiResponse::ok("Product").with("product", &product)
}

/// PUT /api/v1/product/{id}
async fn update(
    RequireMerchant(user): RequireMerchant,
    State(state): State<AppState>,
    Path(id): Path<ProductId>,
    Json(input): Json<UpdateProductInput>,
) -> Result<ApiResponse> {
    owned_product(&state, id, user.id).await?;

    let input = UpdateProductInput {
        name: input
            .name
            .as_deref()
            .map(|n| required_text(n, "name", 200))
            .transpose()?,
        description: non_blank(input.description.as_deref()),
        category: non_blank(input.category.as_deref()),
        price: input.price.map(valid_price).transpose()?,
        stock: input.stock.map(valid_stock).transpose()?,
        image_url: non_blank(input.image_url.as_deref()),
        is_active: input.is_active,
    };
    check_length(input.description.as_deref(), "description", 5000)?;

    let product = ProductRepository::new(state.pool())
        .update(id, &input)
        .await?;
    ApiResponse::ok("Product updated").with("product", &product)
}

/// Soft delete: order history keeps the reference.
///
/// DELETE /api/v1/product/{id}
async fn remove(
    RequireMerchant(user): RequireMerchant,
    State(state): State<AppState>,
    Path(id): Path<ProductId>,
) -> Result<ApiResponse> {
    owned_product(&state, id, user.id).await?;
    ProductRepository::new(state.pool()).deactivate(id).await?;
    Ok(ApiResponse::ok("Product deleted"))
}

fn valid_price(price: Decimal) -> Result<Decimal> {
    if price.is_sign_negative() {
        return Err(AppError::BadRequest("price cannot be negative".to_string()));
    }
    if price.scale() > 2 && round_money(price) != price {
        return Err(AppError::BadRequest(
            "price can have at most two decimal places".to_string(),
        ));
    }
    Ok(round_money(price))
}

fn valid_stock(stock: i32) -> Result<i32> {
    if stock < 0 {
        return Err(AppError::BadRequest("stock cannot be negative".to_string()));
    }
    Ok(stock)
}

async fn find_product(state: &AppState, id: ProductId) -> Result<Product> {
    ProductRepository::new(state.pool())
        .get(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Product {id} not found")))
}

/// The product, if it belongs to a store `owner` owns.
async fn owned_product(state: &AppState, id: ProductId, owner: UserId) -> Result<Product> {
    let product = find_product(state, id).await?;
    let owns = StoreRepository::new(state.pool())
        .get(product.store_id)
        .await?
        .is_some_and(|s| s.owner_id == owner);
    if !owns {
        return Err(AppError::Forbidden(
            "This product belongs to another store".to_string(),
        ));
    }
    Ok(product)
}
