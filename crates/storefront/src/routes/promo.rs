//! Promo code check, outside of any checkout.

use axum::{Json, extract::State};
use chrono::Utc;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use fournil_core::Price;

use crate::error::Result;
use crate::models::PromoKind;
use crate::services::promo;
use crate::state::AppState;

/// `POST /api/promo-codes/validate` body.
#[derive(Debug, Deserialize)]
pub struct ValidatePromo {
    pub code: String,
    pub subtotal: Price,
}

/// An accepted code and what it takes off `subtotal`.
#[derive(Debug, Serialize)]
pub struct PromoQuote {
    pub code: String,
    pub kind: PromoKind,
    pub value: Decimal,
    pub reduction: Price,
    pub total: Price,
}

/// `POST /api/promo-codes/validate`
#[instrument(skip(state))]
pub async fn validate(
    State(state): State<AppState>,
    Json(body): Json<ValidatePromo>,
) -> Result<Json<PromoQuote>> {
    let (promo, reduction) =
        promo::evaluate(state.store(), &body.code, body.subtotal, Utc::now()).await?;
    Ok(Json(PromoQuote {
        code: promo.code,
        kind: promo.kind,
        value: promo.value,
        reduction,
        total: body.subtotal.saturating_sub(reduction),
    }))
}
