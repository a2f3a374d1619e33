//! Promo code lookup and evaluation.

use chrono::{DateTime, Utc};
use tracing::instrument;

use fournil_core::Price;

use crate::db::{RepositoryError, Store};
use crate::models::{PromoCode, PromoError};

/// A promo code could not be applied.
#[derive(Debug, thiserror::Error)]
pub enum PromoCheckError {
    #[error(transparent)]
    Rejected(#[from] PromoError),

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// Look up `code` (case-insensitive) and check it against `subtotal` at `now`.
///
/// Returns the stored code and the reduction it grants.
///
/// # Errors
///
/// Returns `PromoError::Unknown` if no such code exists, the first failed
/// check otherwise, or a repository error.
#[instrument(skip(store))]
pub async fn evaluate(
    store: &dyn Store,
    code: &str,
    subtotal: Price,
    now: DateTime<Utc>,
) -> Result<(PromoCode, Price), PromoCheckError> {
    let code = code.trim();
    if code.is_empty() {
        return Err(PromoError::Unknown.into());
    }
    let promo = store
        .get_promo_code_by_code(code)
        .await?
        .ok_or(PromoError::Unknown)?;
    let reduction = promo.check(subtotal, now)?;
    Ok((promo, reduction))
}
