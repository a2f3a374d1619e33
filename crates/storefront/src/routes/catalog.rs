//! Public catalog: categories and products.

use axum::{
    Json,
    extract::{Path, Query, State},
};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use fournil_core::ProductId;

use crate::error::{AppError, Result};
use crate::models::{Category, Product, ProductFilter};
use crate::state::AppState;

/// Query parameters of the product listing.
#[derive(Debug, Default, Deserialize)]
pub struct ProductQuery {
    /// Category slug.
    pub category: Option<String>,
    /// Text searched in names and descriptions.
    pub q: Option<String>,
    /// Only products that can be ordered.
    #[serde(default)]
    pub available: bool,
}

/// A category with its products.
#[derive(Debug, Serialize)]
pub struct CategoryDetail {
    #[serde(flatten)]
    pub category: Category,
    pub products: Vec<Product>,
}

/// `GET /api/categories`
#[instrument(skip(state))]
pub async fn list_categories(State(state): State<AppState>) -> Result<Json<Vec<Category>>> {
    let categories = state.catalog().categories().await?;
    Ok(Json(categories.as_ref().clone()))
}

/// `GET /api/categories/{slug}`
#[instrument(skip(state))]
pub async fn get_category(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> Result<Json<CategoryDetail>> {
    let category = state
        .catalog()
        .category_by_slug(&slug)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("category {slug}")))?;
    let products = state
        .catalog()
        .products(&ProductFilter {
            category_id: Some(category.id),
            ..ProductFilter::default()
        })
        .await?;
    Ok(Json(CategoryDetail {
        category,
        products: products.as_ref().clone(),
    }))
}

/// `GET /api/products?category=&q=&available=`
#[instrument(skip(state))]
pub async fn list_products(
    State(state): State<AppState>,
    Query(query): Query<ProductQuery>,
) -> Result<Json<Vec<Product>>> {
    let category_id = match query.category.as_deref().filter(|s| !s.is_empty()) {
        Some(slug) => Some(
            state
                .catalog()
                .category_by_slug(slug)
                .await?
                .ok_or_else(|| AppError::NotFound(format!("category {slug}")))?
                .id,
        ),
        None => None,
    };
    let filter = ProductFilter {
        category_id,
        query: query
            .q
            .map(|q| q.trim().to_owned())
            .filter(|q| !q.is_empty()),
        available_only: query.available,
    };
    let products = state.catalog().products(&filter).await?;
    Ok(Json(products.as_ref().clone()))
}

/// `GET /api/products/{id}`
#[instrument(skip(state))]
pub async fn get_product(
    State(state): State<AppState>,
    Path(id): Path<ProductId>,
) -> Result<Json<Product>> {
    state
        .catalog()
        .product(id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("product {id}")))
}
