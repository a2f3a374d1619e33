//! Sales analytics endpoints (admin only).

use axum::{
    Json,
    extract::{Query, State},
};
use chrono::NaiveDate;
use serde::Deserialize;
use tracing::instrument;

use crate::error::Result;
use crate::middleware::RequireAdmin;
use crate::models::{Order, OrderFilter, ProductFilter};
use crate::services::analytics::{
    self, Period, ProductRating, ProductSales, RevenuePoint, SlotCount, Summary,
};
use crate::state::AppState;

/// Default number of products in the top list.
const DEFAULT_TOP_LIMIT: usize = 10;

/// Date range on the shop-local order creation day, inclusive.
#[derive(Debug, Default, Deserialize)]
pub struct RangeQuery {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

#[derive(Debug, Default, Deserialize)]
pub struct RevenueQuery {
    #[serde(default)]
    pub period: Period,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

#[derive(Debug, Default, Deserialize)]
pub struct TopProductsQuery {
    pub limit: Option<usize>,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

async fn orders(
    state: &AppState,
    from: Option<NaiveDate>,
    to: Option<NaiveDate>,
) -> Result<Vec<Order>> {
    let filter = OrderFilter {
        from,
        to,
        utc_offset_minutes: state.config().slots.utc_offset_minutes,
        ..OrderFilter::default()
    };
    Ok(state.store().list_orders(&filter).await?)
}

/// `GET /api/analytics/revenue?period=day|week|month&from=&to=`
#[instrument(skip(state, _admin))]
pub async fn revenue(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
    Query(query): Query<RevenueQuery>,
) -> Result<Json<Vec<RevenuePoint>>> {
    let orders = orders(&state, query.from, query.to).await?;
    let offset = state.config().slots.utc_offset_minutes;
    Ok(Json(analytics::revenue(&orders, query.period, offset)))
}

/// `GET /api/analytics/top-products?limit=`
#[instrument(skip(state, _admin))]
pub async fn top_products(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
    Query(query): Query<TopProductsQuery>,
) -> Result<Json<Vec<ProductSales>>> {
    let orders = orders(&state, query.from, query.to).await?;
    let limit = query.limit.unwrap_or(DEFAULT_TOP_LIMIT);
    Ok(Json(analytics::top_products(&orders, limit)))
}

/// `GET /api/analytics/slots`
#[instrument(skip(state, _admin))]
pub async fn slots(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
    Query(range): Query<RangeQuery>,
) -> Result<Json<Vec<SlotCount>>> {
    let orders = orders(&state, range.from, range.to).await?;
    Ok(Json(analytics::slot_histogram(&orders)))
}

/// `GET /api/analytics/summary`
#[instrument(skip(state, _admin))]
pub async fn summary(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
    Query(range): Query<RangeQuery>,
) -> Result<Json<Summary>> {
    let orders = orders(&state, range.from, range.to).await?;
    let reviews = state.store().list_reviews(None).await?;
    Ok(Json(analytics::summary(&orders, &reviews)))
}

/// `GET /api/analytics/ratings`
#[instrument(skip_all)]
pub async fn ratings(
    State(state): State<AppState>,
    RequireAdmin(_): RequireAdmin,
) -> Result<Json<Vec<ProductRating>>> {
    let reviews = state.store().list_reviews(None).await?;
    let products = state
        .store()
        .list_products(&ProductFilter::default())
        .await?;
    Ok(Json(analytics::product_ratings(&reviews, &products)))
}
