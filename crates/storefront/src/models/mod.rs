//! Domain models for the storefront.
//!
//! These types are independent of storage: repositories convert their rows
//! into them, routes serialize them (or a view of them) to JSON.

pub mod cart;
pub mod checkout;
pub mod order;
pub mod payment;
pub mod product;
pub mod promo;
pub mod review;
pub mod session;
pub mod slot;
pub mod user;

pub use cart::{Cart, CartError, CartItem};
pub use checkout::{AppliedPromo, CheckoutError, CheckoutProcess};
pub use order::{
    CustomerInfo, CustomerInfoInput, NewOrder, Order, OrderFilter, OrderLine, OrderTotals,
    StatusTransitionError,
};
pub use payment::{Invoice, NewInvoice, NewPayment, Payment, PaymentReceipt, PaymentRequest};
pub use product::{Category, CategoryInput, Product, ProductFilter, ProductInput};
pub use promo::{PromoCode, PromoCodeInput, PromoError, PromoKind};
pub use review::{NewReview, Review, ReviewInput};
pub use session::{CurrentUser, keys as session_keys};
pub use slot::PickupSlot;
pub use user::{NewUser, User};

/// A field that failed validation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{field}: {message}")]
pub struct ValidationError {
    /// Name of the offending field.
    pub field: &'static str,
    /// What is wrong with it.
    pub message: String,
}

impl ValidationError {
    /// Create a validation error for `field`.
    #[must_use]
    pub fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

/// Trim a required text field, rejecting it if blank or longer than `max` chars.
///
/// # Errors
///
/// Returns a `ValidationError` naming `field` if the value is empty or too long.
pub fn required_text(field: &'static str, value: &str, max: usize) -> Result<String, ValidationError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::new(field, "is required"));
    }
    if trimmed.chars().count() > max {
        return Err(ValidationError::new(
            field,
            format!("must be at most {max} characters"),
        ));
    }
    Ok(trimmed.to_owned())
}

#[cfg(test)]
pub(crate) mod test_support {
    use chrono::Utc;
    use fournil_core::{CategoryId, Price, ProductId};

    use super::Product;

    /// A listed product in category 1.
    pub fn product(id: i32, name: &str, cents: i64, stock: u32) -> Product {
        Product {
            id: ProductId::new(id),
            name: name.to_owned(),
            description: String::new(),
            price: Price::from_cents(cents),
            images: vec![],
            category_id: Some(CategoryId::new(1)),
            stock,
            available: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }
}
