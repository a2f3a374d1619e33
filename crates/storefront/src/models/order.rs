//! Orders placed through the checkout.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use rand::seq::IndexedRandom;
use serde::{Deserialize, Serialize};

use fournil_core::{Email, OrderId, OrderStatus, Phone, Price, ProductId, UserId};

use super::slot::shop_local;
use super::{CartItem, ValidationError, required_text};

/// A line of an order, frozen when checkout starts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLine {
    pub product_id: ProductId,
    pub name: String,
    pub unit_price: Price,
    pub quantity: u32,
    pub line_total: Price,
}

impl From<&CartItem> for OrderLine {
    fn from(item: &CartItem) -> Self {
        Self {
            product_id: item.product_id,
            name: item.name.clone(),
            unit_price: item.unit_price,
            quantity: item.quantity,
            line_total: item.subtotal(),
        }
    }
}

/// Who picks the order up.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomerInfo {
    pub first_name: String,
    pub last_name: String,
    pub email: Email,
    pub phone: Phone,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

impl CustomerInfo {
    /// "First Last".
    #[must_use]
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

/// Customer form as submitted, before validation.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CustomerInfoInput {
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub note: Option<String>,
}

impl CustomerInfoInput {
    /// Validate the form.
    ///
    /// # Errors
    ///
    /// Returns the first failing field: blank names, an invalid email, an
    /// invalid French phone number or a note over 500 characters.
    pub fn validate(&self) -> Result<CustomerInfo, ValidationError> {
        let first_name = required_text("first_name", &self.first_name, 80)?;
        let last_name = required_text("last_name", &self.last_name, 80)?;
        let email =
            Email::parse(&self.email).map_err(|e| ValidationError::new("email", e.to_string()))?;
        let phone =
            Phone::parse(&self.phone).map_err(|e| ValidationError::new("phone", e.to_string()))?;
        let note = self
            .note
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .map(str::to_owned);
        if note.as_ref().is_some_and(|n| n.chars().count() > 500) {
            return Err(ValidationError::new("note", "must be at most 500 characters"));
        }
        Ok(CustomerInfo {
            first_name,
            last_name,
            email,
            phone,
            note,
        })
    }
}

/// Money summary of an order. Prices are tax-inclusive; `tax` is the VAT
/// portion of `total`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderTotals {
    pub subtotal: Price,
    pub discount: Price,
    pub total: Price,
    pub tax: Price,
}

/// Error for a status change the order lifecycle does not allow.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("cannot move order from {from} to {to}")]
pub struct StatusTransitionError {
    pub from: OrderStatus,
    pub to: OrderStatus,
}

/// A persisted order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    /// Public reference, `CMD-YYYYMMDD-XXXXXX`.
    pub number: String,
    pub user_id: Option<UserId>,
    pub lines: Vec<OrderLine>,
    /// Start of the pickup slot, shop-local time.
    pub pickup_at: NaiveDateTime,
    pub customer: CustomerInfo,
    pub promo_code: Option<String>,
    pub totals: OrderTotals,
    pub status: OrderStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    /// Check that the order may move to `next`.
    ///
    /// # Errors
    ///
    /// Returns `StatusTransitionError` if the lifecycle forbids the move.
    pub const fn check_transition(&self, next: OrderStatus) -> Result<(), StatusTransitionError> {
        if self.status.can_transition_to(next) {
            Ok(())
        } else {
            Err(StatusTransitionError {
                from: self.status,
                to: next,
            })
        }
    }

    /// Total number of units ordered.
    #[must_use]
    pub fn total_items(&self) -> u32 {
        self.lines
            .iter()
            .fold(0_u32, |acc, line| acc.saturating_add(line.quantity))
    }
}

/// Data needed to insert an order.
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub number: String,
    pub user_id: Option<UserId>,
    pub lines: Vec<OrderLine>,
    pub pickup_at: NaiveDateTime,
    pub customer: CustomerInfo,
    pub promo_code: Option<String>,
    pub totals: OrderTotals,
    /// Non-cancelled orders allowed at `pickup_at`; checked on insert.
    pub slot_capacity: u32,
}

/// Order listing filter.
///
/// Dates bound the shop-local day of `created_at`, inclusive.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct OrderFilter {
    pub status: Option<OrderStatus>,
    #[serde(skip)]
    pub user_id: Option<UserId>,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
    /// Offset used to turn `created_at` into a shop-local day.
    #[serde(skip)]
    pub utc_offset_minutes: i32,
}

impl OrderFilter {
    /// Whether `order` passes the filter.
    #[must_use]
    pub fn matches(&self, order: &Order) -> bool {
        let day = shop_local(order.created_at, self.utc_offset_minutes).date();
        self.status.is_none_or(|s| s == order.status)
            && self.user_id.is_none_or(|u| Some(u) == order.user_id)
            && self.from.is_none_or(|from| day >= from)
            && self.to.is_none_or(|to| day <= to)
    }
}

const NUMBER_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";

/// Generate an order number, `CMD-YYYYMMDD-XXXXXX`.
#[must_use]
pub fn generate_order_number(now: DateTime<Utc>) -> String {
    let mut rng = rand::rng();
    let suffix: String = (0..6)
        .filter_map(|_| NUMBER_ALPHABET.choose(&mut rng).copied().map(char::from))
        .collect();
    format!("CMD-{}-{suffix}", now.format("%Y%m%d"))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn input() -> CustomerInfoInput {
        CustomerInfoInput {
            first_name: " Camille ".to_owned(),
            last_name: "Durand".to_owned(),
            email: "camille@example.fr".to_owned(),
            phone: "06 12 34 56 78".to_owned(),
            note: Some("  ".to_owned()),
        }
    }

    #[test]
    fn test_customer_info_validates() {
        let info = input().validate().unwrap();
        assert_eq!(info.first_name, "Camille");
        assert_eq!(info.phone.as_str(), "0612345678");
        assert_eq!(info.note, None);
        assert_eq!(info.full_name(), "Camille Durand");
    }

    #[test]
    fn test_customer_info_rejects_fields() {
        let mut bad = input();
        bad.last_name = String::new();
        assert_eq!(bad.validate().unwrap_err().field, "last_name");

        let mut bad = input();
        bad.email = "camille@localhost".to_owned();
        assert_eq!(bad.validate().unwrap_err().field, "email");

        let mut bad = input();
        bad.phone = "12345".to_owned();
        assert_eq!(bad.validate().unwrap_err().field, "phone");
    }

    #[test]
    fn test_order_number_format() {
        let now = Utc.with_ymd_and_hms(2026, 3, 14, 9, 30, 0).unwrap();
        let number = generate_order_number(now);
        assert!(number.starts_with("CMD-20260314-"));
        assert_eq!(number.len(), "CMD-20260314-".len() + 6);
        assert!(
            number
                .chars()
                .skip(13)
                .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit())
        );
    }

    #[test]
    fn test_order_line_from_cart_item() {
        let item = CartItem {
            product_id: ProductId::new(3),
            name: "Pain de campagne".to_owned(),
            unit_price: Price::from_cents(380),
            quantity: 2,
            image: None,
        };
        let line = OrderLine::from(&item);
        assert_eq!(line.line_total, Price::from_cents(760));
    }
}
