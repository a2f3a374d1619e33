//! Payments and invoices.

use std::fmt::Write as _;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use fournil_core::{InvoiceId, OrderId, PaymentId, PaymentMethod, PaymentStatus, Price};

use super::{CustomerInfo, OrderLine, OrderTotals};

/// Payment details submitted at the payment step.
#[derive(Clone, Deserialize)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum PaymentRequest {
    Card {
        holder: String,
        number: String,
        /// `MM/YY`.
        expiry: String,
        cvv: String,
    },
    Paypal {
        email: String,
    },
}

impl PaymentRequest {
    /// The payment method.
    #[must_use]
    pub const fn method(&self) -> PaymentMethod {
        match self {
            Self::Card { .. } => PaymentMethod::Card,
            Self::Paypal { .. } => PaymentMethod::Paypal,
        }
    }
}

// Card numbers and CVVs never reach the logs.
impl std::fmt::Debug for PaymentRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Card { holder, .. } => f
                .debug_struct("Card")
                .field("holder", holder)
                .finish_non_exhaustive(),
            Self::Paypal { email } => f.debug_struct("Paypal").field("email", email).finish(),
        }
    }
}

/// Result of running the payment simulator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentReceipt {
    pub method: PaymentMethod,
    pub status: PaymentStatus,
    pub amount: Price,
    /// `TXN-` followed by 16 hex digits, only for successful payments.
    pub transaction_id: Option<String>,
    /// `**** **** **** 4242` for cards, the payer email for PayPal.
    pub payer: String,
    pub decline_reason: Option<String>,
    pub processed_at: DateTime<Utc>,
}

impl PaymentReceipt {
    #[must_use]
    pub fn succeeded(&self) -> bool {
        self.status == PaymentStatus::Succeeded
    }
}

/// A recorded payment attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Payment {
    pub id: PaymentId,
    pub order_id: OrderId,
    pub method: PaymentMethod,
    pub amount: Price,
    pub status: PaymentStatus,
    pub transaction_id: Option<String>,
    pub payer: String,
    pub decline_reason: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Data needed to record a payment attempt.
#[derive(Debug, Clone)]
pub struct NewPayment {
    pub order_id: OrderId,
    pub receipt: PaymentReceipt,
}

/// An invoice for a paid order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Invoice {
    pub id: InvoiceId,
    /// `FAC-YYYYMM-NNNNNN`.
    pub number: String,
    pub order_id: OrderId,
    pub order_number: String,
    pub customer: CustomerInfo,
    pub lines: Vec<OrderLine>,
    pub totals: OrderTotals,
    pub payment_method: PaymentMethod,
    pub transaction_id: Option<String>,
    pub issued_at: DateTime<Utc>,
}

impl Invoice {
    /// Invoice number for an order issued at `issued_at`.
    #[must_use]
    pub fn number_for(order_id: OrderId, issued_at: DateTime<Utc>) -> String {
        format!("FAC-{}-{:06}", issued_at.format("%Y%m"), order_id.as_i32())
    }

    /// Plain-text rendering, as downloaded by the customer.
    #[must_use]
    pub fn render_text(&self, shop_name: &str, vat_rate_percent: &str) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "{shop_name}");
        let _ = writeln!(out, "FACTURE {}", self.number);
        let _ = writeln!(out, "Date : {}", self.issued_at.format("%d/%m/%Y"));
        let _ = writeln!(out, "Commande : {}", self.order_number);
        let _ = writeln!(out, "Client : {}", self.customer.full_name());
        let _ = writeln!(out, "Email : {}", self.customer.email);
        let _ = writeln!(out, "Téléphone : {}", self.customer.phone.display());
        out.push('\n');
        for line in &self.lines {
            let _ = writeln!(
                out,
                "{:>3} x {:<32} {:>10} {:>10}",
                line.quantity,
                line.name,
                line.unit_price.display(),
                line.line_total.display()
            );
        }
        out.push('\n');
        let _ = writeln!(out, "Sous-total : {}", self.totals.subtotal.display());
        if self.totals.discount > Price::ZERO {
            let _ = writeln!(out, "Remise : -{}", self.totals.discount.display());
        }
        let _ = writeln!(out, "Total TTC : {}", self.totals.total.display());
        let _ = writeln!(
            out,
            "dont TVA ({vat_rate_percent} %) : {}",
            self.totals.tax.display()
        );
        let _ = writeln!(out, "Paiement : {}", self.payment_method);
        if let Some(txn) = &self.transaction_id {
            let _ = writeln!(out, "Transaction : {txn}");
        }
        out
    }
}

/// Data needed to issue an invoice.
#[derive(Debug, Clone)]
pub struct NewInvoice {
    pub order_id: OrderId,
    pub payment_method: PaymentMethod,
    pub transaction_id: Option<String>,
    pub issued_at: DateTime<Utc>,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use fournil_core::{Email, Phone, ProductId};

    fn invoice() -> Invoice {
        Invoice {
            id: InvoiceId::new(1),
            number: Invoice::number_for(
                OrderId::new(42),
                Utc.with_ymd_and_hms(2026, 5, 2, 8, 0, 0).unwrap(),
            ),
            order_id: OrderId::new(42),
            order_number: "CMD-20260502-ABC234".to_owned(),
            customer: CustomerInfo {
                first_name: "Léa".to_owned(),
                last_name: "Martin".to_owned(),
                email: Email::parse("lea@example.fr").unwrap(),
                phone: Phone::parse("0612345678").unwrap(),
                note: None,
            },
            lines: vec![OrderLine {
                product_id: ProductId::new(1),
                name: "Croissant".to_owned(),
                unit_price: Price::from_cents(120),
                quantity: 3,
                line_total: Price::from_cents(360),
            }],
            totals: OrderTotals {
                subtotal: Price::from_cents(360),
                discount: Price::ZERO,
                total: Price::from_cents(360),
                tax: Price::from_cents(19),
            },
            payment_method: PaymentMethod::Card,
            transaction_id: Some("TXN-0123456789ABCDEF".to_owned()),
            issued_at: Utc.with_ymd_and_hms(2026, 5, 2, 8, 0, 0).unwrap(),
        }
    }

    #[test]
    fn test_invoice_number() {
        assert_eq!(invoice().number, "FAC-202605-000042");
    }

    #[test]
    fn test_render_text() {
        let text = invoice().render_text("Fournil", "5,5");
        assert!(text.contains("FACTURE FAC-202605-000042"));
        assert!(text.contains("Croissant"));
        assert!(text.contains("Total TTC : 3,60 €"));
        assert!(text.contains("dont TVA (5,5 %) : 0,19 €"));
        assert!(!text.contains("Remise"));
    }

    #[test]
    fn test_payment_request_debug_hides_card() {
        let req: PaymentRequest = serde_json::from_str(
            r#"{"method":"card","holder":"Léa","number":"4242424242424242","expiry":"12/30","cvv":"123"}"#,
        )
        .unwrap();
        assert_eq!(req.method(), PaymentMethod::Card);
        assert!(!format!("{req:?}").contains("4242"));
    }
}
