//! Order totals.
//!
//! Prices are tax-inclusive. The VAT shown on receipts is the portion of the
//! total that is tax: `total * r / (1 + r)`, rounded half away from zero.

use rust_decimal::Decimal;

use fournil_core::Price;

use crate::models::{OrderLine, OrderTotals};

/// VAT portion of a tax-inclusive amount.
#[must_use]
pub fn tax_included(total: Price, vat_rate: Decimal) -> Price {
    if vat_rate <= Decimal::ZERO {
        return Price::ZERO;
    }
    Price::new(total.amount() * vat_rate / (Decimal::ONE + vat_rate)).round()
}

/// Totals for `lines` with a `discount` already computed.
///
/// The discount is capped at the subtotal so the total is never negative.
#[must_use]
pub fn compute_totals(lines: &[OrderLine], discount: Price, vat_rate: Decimal) -> OrderTotals {
    let subtotal: Price = lines.iter().map(|line| line.line_total).sum();
    let discount = discount.min(subtotal);
    let total = subtotal.saturating_sub(discount);
    OrderTotals {
        subtotal,
        discount,
        total,
        tax: tax_included(total, vat_rate),
    }
}

/// A rate as a French percentage string (`0.055` -> `5,5`).
#[must_use]
pub fn rate_percent(vat_rate: Decimal) -> String {
    (vat_rate * Decimal::ONE_HUNDRED)
        .normalize()
        .to_string()
        .replace('.', ",")
}

#[cfg(test)]
mod tests {
    use super::*;
    use fournil_core::ProductId;

    fn line(cents: i64, quantity: u32) -> OrderLine {
        let unit_price = Price::from_cents(cents);
        OrderLine {
            product_id: ProductId::new(1),
            name: "Pain".to_owned(),
            unit_price,
            quantity,
            line_total: unit_price.times(quantity),
        }
    }

    fn vat() -> Decimal {
        Decimal::new(55, 3)
    }

    #[test]
    fn test_tax_included() {
        // 10.55 * 0.055 / 1.055 = 0.55
        assert_eq!(tax_included(Price::from_cents(1055), vat()), Price::from_cents(55));
        // 3.60 * 0.055 / 1.055 = 0.18767... -> 0.19
        assert_eq!(tax_included(Price::from_cents(360), vat()), Price::from_cents(19));
        assert_eq!(tax_included(Price::from_cents(360), Decimal::ZERO), Price::ZERO);
    }

    #[test]
    fn test_compute_totals() {
        let totals = compute_totals(&[line(450, 2), line(110, 1)], Price::from_cents(101), vat());
        assert_eq!(totals.subtotal, Price::from_cents(1010));
        assert_eq!(totals.discount, Price::from_cents(101));
        assert_eq!(totals.total, Price::from_cents(909));
        assert_eq!(totals.tax, Price::from_cents(47));
    }

    #[test]
    fn test_discount_never_makes_total_negative() {
        let totals = compute_totals(&[line(300, 1)], Price::from_cents(500), vat());
        assert_eq!(totals.discount, Price::from_cents(300));
        assert_eq!(totals.total, Price::ZERO);
        assert_eq!(totals.tax, Price::ZERO);
    }

    #[test]
    fn test_rate_percent() {
        assert_eq!(rate_percent(vat()), "5,5");
        assert_eq!(rate_percent(Decimal::new(20, 2)), "20");
    }
}
