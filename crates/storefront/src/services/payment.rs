//! Payment simulator.
//!
//! No money moves: [`PaymentSimulator::process`] validates the payment
//! details, waits a configurable delay and answers with a success or a
//! decline. A few card numbers are always declined so every outcome can be
//! exercised from the frontend.

use std::time::Duration;

use chrono::{DateTime, Datelike, Utc};
use rand::Rng;
use tracing::{info, instrument};
use uuid::Uuid;

use fournil_core::{Email, PaymentStatus, Price};

use crate::config::PaymentConfig;
use crate::models::{PaymentReceipt, PaymentRequest};

/// Test cards that are always declined, with the reason given.
const DECLINED_CARDS: &[(&str, &str)] = &[
    ("4000000000000002", "card declined"),
    ("4000000000009995", "insufficient funds"),
    ("4000000000000069", "expired card"),
];

/// Reason given when the random failure rate declines a payment.
const RANDOM_DECLINE: &str = "payment refused by the issuer";

/// Payment details that cannot be processed at all.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PaymentError {
    #[error("card holder name is required")]
    MissingHolder,
    #[error("card number is invalid")]
    InvalidCardNumber,
    #[error("expiry date must be MM/YY")]
    InvalidExpiry,
    #[error("card has expired")]
    CardExpired,
    #[error("CVV must be 3 or 4 digits")]
    InvalidCvv,
    #[error("PayPal email is invalid")]
    InvalidPaypalEmail,
}

/// Simulated payment processor.
#[derive(Debug, Clone)]
pub struct PaymentSimulator {
    delay: Duration,
    failure_rate: f64,
}

impl PaymentSimulator {
    #[must_use]
    pub fn new(config: &PaymentConfig) -> Self {
        Self {
            delay: config.delay,
            failure_rate: config.failure_rate.clamp(0.0, 1.0),
        }
    }

    /// Check the payment details without charging anything.
    ///
    /// # Errors
    ///
    /// Returns `PaymentError` if the payment details are malformed.
    pub fn validate(&self, request: &PaymentRequest) -> Result<(), PaymentError> {
        check_request(request, Utc::now()).map(|_| ())
    }

    /// Charge `amount`.
    ///
    /// A decline is a normal outcome, returned in the receipt.
    ///
    /// # Errors
    ///
    /// Returns `PaymentError` if the payment details are malformed.
    #[instrument(skip(self), fields(method = %request.method()))]
    pub async fn process(
        &self,
        request: &PaymentRequest,
        amount: Price,
    ) -> Result<PaymentReceipt, PaymentError> {
        let now = Utc::now();
        let checked = check_request(request, now)?;

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        let decline_reason = checked.decline_reason.or_else(|| {
            (self.failure_rate > 0.0 && rand::rng().random_bool(self.failure_rate))
                .then_some(RANDOM_DECLINE)
        });

        let receipt = match decline_reason {
            Some(reason) => PaymentReceipt {
                method: request.method(),
                status: PaymentStatus::Declined,
                amount,
                transaction_id: None,
                payer: checked.payer,
                decline_reason: Some(reason.to_owned()),
                processed_at: Utc::now(),
            },
            None => PaymentReceipt {
                method: request.method(),
                status: PaymentStatus::Succeeded,
                amount,
                transaction_id: Some(transaction_id()),
                payer: checked.payer,
                decline_reason: None,
                processed_at: Utc::now(),
            },
        };

        info!(
            status = %receipt.status,
            amount = %amount,
            payer = %receipt.payer,
            "Payment processed"
        );
        Ok(receipt)
    }
}

/// Validated payment details.
struct CheckedRequest {
    payer: String,
    decline_reason: Option<&'static str>,
}

fn check_request(request: &PaymentRequest, now: DateTime<Utc>) -> Result<CheckedRequest, PaymentError> {
    match request {
        PaymentRequest::Card {
            holder,
            number,
            expiry,
            cvv,
        } => {
            if holder.trim().is_empty() {
                return Err(PaymentError::MissingHolder);
            }
            let digits = card_digits(number).ok_or(PaymentError::InvalidCardNumber)?;
            if !luhn_valid(&digits) {
                return Err(PaymentError::InvalidCardNumber);
            }
            check_expiry(expiry, now)?;
            let cvv = cvv.trim();
            if !(3..=4).contains(&cvv.len()) || !cvv.chars().all(|c| c.is_ascii_digit()) {
                return Err(PaymentError::InvalidCvv);
            }
            let decline_reason = DECLINED_CARDS
                .iter()
                .find(|(card, _)| *card == digits)
                .map(|(_, reason)| *reason);
            Ok(CheckedRequest {
                payer: mask_card(&digits),
                decline_reason,
            })
        }
        PaymentRequest::Paypal { email } => {
            let email = Email::parse(email).map_err(|_| PaymentError::InvalidPaypalEmail)?;
            Ok(CheckedRequest {
                payer: email.into_inner(),
                decline_reason: None,
            })
        }
    }
}

/// Digits of a card number, ignoring spaces and dashes; 13 to 19 of them.
fn card_digits(number: &str) -> Option<String> {
    let digits: String = number.chars().filter(|c| !matches!(c, ' ' | '-')).collect();
    let valid = (13..=19).contains(&digits.len()) && digits.chars().all(|c| c.is_ascii_digit());
    valid.then_some(digits)
}

fn luhn_valid(digits: &str) -> bool {
    let sum: u32 = digits
        .chars()
        .rev()
        .filter_map(|c| c.to_digit(10))
        .enumerate()
        .map(|(i, d)| {
            if i % 2 == 1 {
                let doubled = d * 2;
                if doubled > 9 { doubled - 9 } else { doubled }
            } else {
                d
            }
        })
        .sum();
    sum % 10 == 0
}

/// `MM/YY`; a card is valid through the end of its expiry month.
fn check_expiry(expiry: &str, now: DateTime<Utc>) -> Result<(), PaymentError> {
    let (month, year) = expiry
        .trim()
        .split_once('/')
        .ok_or(PaymentError::InvalidExpiry)?;
    if month.len() != 2 || year.len() != 2 {
        return Err(PaymentError::InvalidExpiry);
    }
    let month: u32 = month.parse().map_err(|_| PaymentError::InvalidExpiry)?;
    let year: i32 = year.parse().map_err(|_| PaymentError::InvalidExpiry)?;
    if !(1..=12).contains(&month) {
        return Err(PaymentError::InvalidExpiry);
    }
    let year = 2000 + year;
    if (year, month) < (now.year(), now.month()) {
        return Err(PaymentError::CardExpired);
    }
    Ok(())
}

/// `**** **** **** 4242`.
fn mask_card(digits: &str) -> String {
    let last4: String = digits
        .chars()
        .skip(digits.len().saturating_sub(4))
        .collect();
    format!("**** **** **** {last4}")
}

/// `TXN-` and 16 uppercase hex digits.
fn transaction_id() -> String {
    let hex: String = Uuid::new_v4()
        .simple()
        .to_string()
        .to_uppercase()
        .chars()
        .take(16)
        .collect();
    format!("TXN-{hex}")
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn simulator() -> PaymentSimulator {
        PaymentSimulator::new(&PaymentConfig {
            delay: Duration::ZERO,
            failure_rate: 0.0,
        })
    }

    fn card(number: &str, expiry: &str, cvv: &str) -> PaymentRequest {
        PaymentRequest::Card {
            holder: "Léa Martin".to_owned(),
            number: number.to_owned(),
            expiry: expiry.to_owned(),
            cvv: cvv.to_owned(),
        }
    }

    #[test]
    fn test_luhn() {
        assert!(luhn_valid("4242424242424242"));
        assert!(luhn_valid("4000000000000002"));
        assert!(!luhn_valid("4242424242424241"));
    }

    #[test]
    fn test_expiry() {
        let now = Utc.with_ymd_and_hms(2026, 6, 15, 12, 0, 0).unwrap();
        assert!(check_expiry("06/26", now).is_ok());
        assert!(check_expiry("01/30", now).is_ok());
        assert_eq!(check_expiry("05/26", now), Err(PaymentError::CardExpired));
        assert_eq!(check_expiry("13/26", now), Err(PaymentError::InvalidExpiry));
        assert_eq!(check_expiry("6/26", now), Err(PaymentError::InvalidExpiry));
    }

    #[tokio::test]
    async fn test_card_success() {
        let receipt = simulator()
            .process(&card("4242 4242 4242 4242", "12/99", "123"), Price::from_cents(909))
            .await
            .unwrap();
        assert!(receipt.succeeded());
        assert_eq!(receipt.payer, "**** **** **** 4242");
        let txn = receipt.transaction_id.unwrap();
        assert!(txn.starts_with("TXN-"));
        assert_eq!(txn.len(), 20);
        assert!(txn.chars().skip(4).all(|c| c.is_ascii_hexdigit() && !c.is_ascii_lowercase()));
    }

    #[tokio::test]
    async fn test_decline_list() {
        for (number, reason) in DECLINED_CARDS {
            let receipt = simulator()
                .process(&card(number, "12/99", "123"), Price::from_cents(100))
                .await
                .unwrap();
            assert_eq!(receipt.status, PaymentStatus::Declined);
            assert_eq!(receipt.decline_reason.as_deref(), Some(*reason));
            assert!(receipt.transaction_id.is_none());
        }
    }

    #[tokio::test]
    async fn test_invalid_details_are_errors() {
        let sim = simulator();
        let amount = Price::from_cents(100);
        assert_eq!(
            sim.process(&card("4242424242424241", "12/99", "123"), amount).await,
            Err(PaymentError::InvalidCardNumber)
        );
        assert_eq!(
            sim.process(&card("4242", "12/99", "123"), amount).await,
            Err(PaymentError::InvalidCardNumber)
        );
        assert_eq!(
            sim.process(&card("4242424242424242", "12/99", "12"), amount).await,
            Err(PaymentError::InvalidCvv)
        );
        assert_eq!(
            sim.process(&card("4242424242424242", "01/20", "123"), amount).await,
            Err(PaymentError::CardExpired)
        );
        assert_eq!(
            sim.process(
                &PaymentRequest::Paypal {
                    email: "nobody@localhost".to_owned()
                },
                amount
            )
            .await,
            Err(PaymentError::InvalidPaypalEmail)
        );
    }

    #[tokio::test]
    async fn test_failure_rate_one_declines_everything() {
        let sim = PaymentSimulator::new(&PaymentConfig {
            delay: Duration::ZERO,
            failure_rate: 1.0,
        });
        let receipt = sim
            .process(
                &PaymentRequest::Paypal {
                    email: "lea@example.fr".to_owned(),
                },
                Price::from_cents(100),
            )
            .await
            .unwrap();
        assert_eq!(receipt.status, PaymentStatus::Declined);
        assert_eq!(receipt.payer, "lea@example.fr");
    }
}
