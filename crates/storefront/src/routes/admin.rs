//! Back-office route handlers (admin only).
//!
//! Catalog writes invalidate the catalog cache so the storefront sees them
//! immediately.

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use serde::Deserialize;
use tracing::{info, instrument};

use fournil_core::{CategoryId, OrderId, OrderStatus, ProductId, PromoCodeId};

use crate::error::{AppError, Result};
use crate::middleware::RequireAdmin;
use crate::models::{
    Category, CategoryInput, Order, OrderFilter, Product, ProductFilter, ProductInput, PromoCode,
    PromoCodeInput,
};
use crate::services::orders;
use crate::state::AppState;

// =============================================================================
// Request Types
// =============================================================================

/// `POST /api/admin/products/{id}/stock` body.
#[derive(Debug, Deserialize)]
pub struct StockAdjustment {
    /// Units to add, negative to remove.
    pub delta: i32,
}

/// `PUT /api/admin/orders/{id}/status` body.
#[derive(Debug, Deserialize)]
pub struct StatusChange {
    pub status: OrderStatus,
}

/// `PATCH /api/admin/promo-codes/{id}` body.
#[derive(Debug, Deserialize)]
pub struct PromoActivation {
    pub active: bool,
}

// =============================================================================
// Categories
// =============================================================================

/// `GET /api/admin/categories`
#[instrument(skip_all)]
pub async fn list_categories(
    State(state): State<AppState>,
    RequireAdmin(_): RequireAdmin,
) -> Result<Json<Vec<Category>>> {
    Ok(Json(state.store().list_categories().await?))
}

/// `POST /api/admin/categories`
#[instrument(skip(state, admin), fields(admin = %admin.email))]
pub async fn create_category(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Json(input): Json<CategoryInput>,
) -> Result<(StatusCode, Json<Category>)> {
    let category = state.store().create_category(&input.validate()?).await?;
    state.catalog().invalidate().await;
    info!(category = %category.slug, "Category created");
    Ok((StatusCode::CREATED, Json(category)))
}

/// `PUT /api/admin/categories/{id}`
#[instrument(skip(state, admin), fields(admin = %admin.email))]
pub async fn update_category(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Path(id): Path<CategoryId>,
    Json(input): Json<CategoryInput>,
) -> Result<Json<Category>> {
    let category = state
        .store()
        .update_category(id, &input.validate()?)
        .await?;
    state.catalog().invalidate().await;
    Ok(Json(category))
}

/// `DELETE /api/admin/categories/{id}`
#[instrument(skip(state, admin), fields(admin = %admin.email))]
pub async fn delete_category(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Path(id): Path<CategoryId>,
) -> Result<StatusCode> {
    state.store().delete_category(id).await?;
    state.catalog().invalidate().await;
    info!(category_id = %id, "Category deleted");
    Ok(StatusCode::NO_CONTENT)
}

// =============================================================================
// Products
// =============================================================================

/// `GET /api/admin/products`, including unavailable ones.
#[instrument(skip_all)]
pub async fn list_products(
    State(state): State<AppState>,
    RequireAdmin(_): RequireAdmin,
) -> Result<Json<Vec<Product>>> {
    Ok(Json(
        state
            .store()
            .list_products(&ProductFilter::default())
            .await?,
    ))
}

/// `POST /api/admin/products`
#[instrument(skip(state, admin), fields(admin = %admin.email))]
pub async fn create_product(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Json(input): Json<ProductInput>,
) -> Result<(StatusCode, Json<Product>)> {
    let product = state.store().create_product(&input.validate()?).await?;
    state.catalog().invalidate().await;
    info!(product_id = %product.id, name = %product.name, "Product created");
    Ok((StatusCode::CREATED, Json(product)))
}

/// `GET /api/admin/products/{id}`
#[instrument(skip_all, fields(product_id = %id))]
pub async fn get_product(
    State(state): State<AppState>,
    RequireAdmin(_): RequireAdmin,
    Path(id): Path<ProductId>,
) -> Result<Json<Product>> {
    state
        .store()
        .get_product(id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("product {id}")))
}

/// `PUT /api/admin/products/{id}`
#[instrument(skip(state, admin), fields(admin = %admin.email))]
pub async fn update_product(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Path(id): Path<ProductId>,
    Json(input): Json<ProductInput>,
) -> Result<Json<Product>> {
    let product = state.store().update_product(id, &input.validate()?).await?;
    state.catalog().invalidate().await;
    Ok(Json(product))
}

/// `DELETE /api/admin/products/{id}`
#[instrument(skip(state, admin), fields(admin = %admin.email))]
pub async fn delete_product(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Path(id): Path<ProductId>,
) -> Result<StatusCode> {
    state.store().delete_product(id).await?;
    state.catalog().invalidate().await;
    info!(product_id = %id, "Product deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// `POST /api/admin/products/{id}/stock`; 409 if stock would go below zero.
#[instrument(skip(state, admin), fields(admin = %admin.email))]
pub async fn adjust_stock(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Path(id): Path<ProductId>,
    Json(body): Json<StockAdjustment>,
) -> Result<Json<Product>> {
    let product = state.store().adjust_stock(id, body.delta).await?;
    state.catalog().invalidate().await;
    info!(product_id = %id, delta = body.delta, stock = product.stock, "Stock adjusted");
    Ok(Json(product))
}

// =============================================================================
// Orders
// =============================================================================

/// `GET /api/admin/orders?status=&from=&to=`
#[instrument(skip(state, _admin))]
pub async fn list_orders(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
    Query(mut filter): Query<OrderFilter>,
) -> Result<Json<Vec<Order>>> {
    filter.utc_offset_minutes = state.config().slots.utc_offset_minutes;
    Ok(Json(state.store().list_orders(&filter).await?))
}

/// `GET /api/admin/orders/{id}`
#[instrument(skip_all, fields(order_id = %id))]
pub async fn get_order(
    State(state): State<AppState>,
    RequireAdmin(_): RequireAdmin,
    Path(id): Path<OrderId>,
) -> Result<Json<Order>> {
    state
        .store()
        .get_order(id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("order {id}")))
}

/// `PUT /api/admin/orders/{id}/status`; 409 for a move the lifecycle forbids.
#[instrument(skip(state, admin), fields(admin = %admin.email))]
pub async fn update_order_status(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Path(id): Path<OrderId>,
    Json(body): Json<StatusChange>,
) -> Result<Json<Order>> {
    let order = orders::transition_order(state.store(), id, body.status).await?;
    if order.status == OrderStatus::Cancelled {
        state.catalog().invalidate().await;
    }
    Ok(Json(order))
}

// =============================================================================
// Promo codes
// =============================================================================

/// `GET /api/admin/promo-codes`
#[instrument(skip_all)]
pub async fn list_promo_codes(
    State(state): State<AppState>,
    RequireAdmin(_): RequireAdmin,
) -> Result<Json<Vec<PromoCode>>> {
    Ok(Json(state.store().list_promo_codes().await?))
}

/// `POST /api/admin/promo-codes`
#[instrument(skip(state, admin), fields(admin = %admin.email))]
pub async fn create_promo_code(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Json(input): Json<PromoCodeInput>,
) -> Result<(StatusCode, Json<PromoCode>)> {
    let promo = state.store().create_promo_code(&input.validate()?).await?;
    info!(code = %promo.code, "Promo code created");
    Ok((StatusCode::CREATED, Json(promo)))
}

/// `PATCH /api/admin/promo-codes/{id}`: enable or disable a code.
#[instrument(skip(state, admin), fields(admin = %admin.email))]
pub async fn set_promo_code_active(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Path(id): Path<PromoCodeId>,
    Json(body): Json<PromoActivation>,
) -> Result<Json<PromoCode>> {
    Ok(Json(
        state
            .store()
            .set_promo_code_active(id, body.active)
            .await?,
    ))
}
