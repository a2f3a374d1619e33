//! Product reviews.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use tracing::{info, instrument};

use fournil_core::ProductId;

use crate::error::{AppError, Result};
use crate::middleware::RequireAuth;
use crate::models::{Review, ReviewInput};
use crate::state::AppState;

async fn ensure_product(state: &AppState, id: ProductId) -> Result<()> {
    state
        .catalog()
        .product(id)
        .await?
        .map(|_| ())
        .ok_or_else(|| AppError::NotFound(format!("product {id}")))
}

/// `GET /api/products/{id}/reviews`, newest first.
#[instrument(skip(state))]
pub async fn list(
    State(state): State<AppState>,
    Path(id): Path<ProductId>,
) -> Result<Json<Vec<Review>>> {
    ensure_product(&state, id).await?;
    Ok(Json(state.store().list_reviews(Some(id)).await?))
}

/// `POST /api/products/{id}/reviews`
#[instrument(skip(state, user, input), fields(user_id = %user.id))]
pub async fn create(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(id): Path<ProductId>,
    Json(input): Json<ReviewInput>,
) -> Result<(StatusCode, Json<Review>)> {
    ensure_product(&state, id).await?;
    let review = input.validate(id, user.id, &user.name)?;
    let review = state.store().create_review(&review).await?;
    info!(review_id = %review.id, rating = review.rating, "Review posted");
    Ok((StatusCode::CREATED, Json(review)))
}
