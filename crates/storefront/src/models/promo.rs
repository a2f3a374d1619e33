//! Promotional codes.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use fournil_core::{Price, PromoCodeId};

use super::ValidationError;
use super::product::MAX_PRICE;

/// How a promo code reduces the subtotal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PromoKind {
    /// `value` percent off.
    Percent,
    /// `value` euros off.
    Fixed,
}

impl PromoKind {
    /// Stable text form.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Percent => "percent",
            Self::Fixed => "fixed",
        }
    }
}

impl std::str::FromStr for PromoKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "percent" => Ok(Self::Percent),
            "fixed" => Ok(Self::Fixed),
            other => Err(format!("invalid promo kind: {other}")),
        }
    }
}

/// Why a promo code cannot be applied.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PromoError {
    #[error("unknown promo code")]
    Unknown,
    #[error("this promo code is no longer active")]
    Inactive,
    #[error("this promo code is not valid yet")]
    NotYetValid,
    #[error("this promo code has expired")]
    Expired,
    #[error("this promo code has reached its usage limit")]
    UsageLimitReached,
    #[error("a minimum order of {} is required for this code", minimum.display())]
    MinimumNotMet { minimum: Price },
}

/// A promo code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromoCode {
    pub id: PromoCodeId,
    /// Always stored uppercase.
    pub code: String,
    pub kind: PromoKind,
    /// Percentage for `Percent`, euros for `Fixed`.
    pub value: Decimal,
    pub minimum_amount: Price,
    pub valid_from: Option<DateTime<Utc>>,
    pub valid_until: Option<DateTime<Utc>>,
    pub max_uses: Option<u32>,
    pub uses: u32,
    pub active: bool,
}

impl PromoCode {
    /// Check the code against `subtotal` at `now` and compute the reduction.
    ///
    /// Checks run in order: active, validity window, usage cap, minimum.
    ///
    /// # Errors
    ///
    /// Returns the first `PromoError` that applies.
    pub fn check(&self, subtotal: Price, now: DateTime<Utc>) -> Result<Price, PromoError> {
        if !self.active {
            return Err(PromoError::Inactive);
        }
        if self.valid_from.is_some_and(|from| now < from) {
            return Err(PromoError::NotYetValid);
        }
        if self.valid_until.is_some_and(|until| now > until) {
            return Err(PromoError::Expired);
        }
        if self.max_uses.is_some_and(|max| self.uses >= max) {
            return Err(PromoError::UsageLimitReached);
        }
        if subtotal < self.minimum_amount {
            return Err(PromoError::MinimumNotMet {
                minimum: self.minimum_amount,
            });
        }
        Ok(self.reduction(subtotal))
    }

    /// Reduction on `subtotal`, never more than the subtotal itself.
    #[must_use]
    pub fn reduction(&self, subtotal: Price) -> Price {
        let raw = match self.kind {
            PromoKind::Percent => subtotal.percent(self.value),
            PromoKind::Fixed => Price::new(self.value).round(),
        };
        raw.min(subtotal)
    }
}

/// Create payload for a promo code.
#[derive(Debug, Clone, Deserialize)]
pub struct PromoCodeInput {
    pub code: String,
    pub kind: PromoKind,
    pub value: Decimal,
    #[serde(default)]
    pub minimum_amount: Price,
    #[serde(default)]
    pub valid_from: Option<DateTime<Utc>>,
    #[serde(default)]
    pub valid_until: Option<DateTime<Utc>>,
    #[serde(default)]
    pub max_uses: Option<u32>,
    #[serde(default = "default_active")]
    pub active: bool,
}

const fn default_active() -> bool {
    true
}

impl PromoCodeInput {
    /// Validate and normalize (code uppercased).
    ///
    /// # Errors
    ///
    /// Returns a `ValidationError` for a malformed code, a non-positive
    /// value, a percentage over 100, a negative minimum or an inverted window.
    pub fn validate(&self) -> Result<Self, ValidationError> {
        let code = self.code.trim().to_uppercase();
        if code.is_empty()
            || code.len() > 32
            || !code.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            return Err(ValidationError::new(
                "code",
                "must be 1 to 32 letters, digits, dashes or underscores",
            ));
        }
        if self.value <= Decimal::ZERO {
            return Err(ValidationError::new("value", "must be positive"));
        }
        if self.kind == PromoKind::Percent && self.value > Decimal::ONE_HUNDRED {
            return Err(ValidationError::new("value", "cannot exceed 100 percent"));
        }
        if self.kind == PromoKind::Fixed && self.value > MAX_PRICE.amount() {
            return Err(ValidationError::new("value", "amount is too large"));
        }
        if self.minimum_amount.is_negative() {
            return Err(ValidationError::new("minimum_amount", "cannot be negative"));
        }
        if self.minimum_amount > MAX_PRICE {
            return Err(ValidationError::new("minimum_amount", "amount is too large"));
        }
        if let (Some(from), Some(until)) = (self.valid_from, self.valid_until)
            && from > until
        {
            return Err(ValidationError::new(
                "valid_until",
                "must be after valid_from",
            ));
        }
        Ok(Self {
            code,
            ..self.clone()
        })
    }
}
