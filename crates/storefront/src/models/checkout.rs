//! The checkout wizard.
//!
//! A [`CheckoutProcess`] walks linearly through
//! `slot -> customer_info -> recap -> payment -> confirmation`. Each step has
//! a guard checked by [`CheckoutProcess::can_advance`]; the payment step only
//! moves forward through [`CheckoutProcess::complete`] with a successful
//! payment. Totals are recomputed after every change to the lines or the promo.

use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use fournil_core::{CheckoutStep, OrderId, Price};

use super::{Cart, CustomerInfo, OrderLine, OrderTotals, PaymentReceipt};
use crate::services::pricing;

/// Errors from wizard transitions.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CheckoutError {
    #[error("cannot start checkout with an empty cart")]
    EmptyCart,
    #[error("no checkout in progress")]
    NotStarted,
    #[error("step {0} is not complete")]
    CannotAdvance(CheckoutStep),
    #[error("cannot go back from step {0}")]
    CannotGoBack(CheckoutStep),
    #[error("expected step {expected}, checkout is at {actual}")]
    WrongStep {
        expected: CheckoutStep,
        actual: CheckoutStep,
    },
    #[error("the order has already been placed, cancel the checkout to change it")]
    OrderAlreadyPlaced,
    #[error("no pickup slot selected")]
    MissingSlot,
    #[error("customer information missing")]
    MissingCustomer,
}

/// A promo code applied to the checkout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppliedPromo {
    pub code: String,
    pub reduction: Price,
}

/// Checkout state, stored in the session between requests.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckoutProcess {
    pub step: CheckoutStep,
    /// Cart snapshot taken at start.
    pub lines: Vec<OrderLine>,
    pub slot: Option<NaiveDateTime>,
    pub customer: Option<CustomerInfo>,
    pub promo: Option<AppliedPromo>,
    pub totals: OrderTotals,
    pub vat_rate: Decimal,
    /// Set once the pending order exists.
    pub order_id: Option<OrderId>,
    pub order_number: Option<String>,
    pub last_payment: Option<PaymentReceipt>,
}

impl CheckoutProcess {
    /// Start a checkout from the cart.
    ///
    /// # Errors
    ///
    /// Returns `CheckoutError::EmptyCart` if the cart has no lines.
    pub fn start(cart: &Cart, vat_rate: Decimal) -> Result<Self, CheckoutError> {
        if cart.is_empty() {
            return Err(CheckoutError::EmptyCart);
        }
        let mut process = Self {
            step: CheckoutStep::FIRST,
            lines: cart.items.iter().map(OrderLine::from).collect(),
            slot: None,
            customer: None,
            promo: None,
            totals: OrderTotals::default(),
            vat_rate,
            order_id: None,
            order_number: None,
            last_payment: None,
        };
        process.recompute_totals();
        Ok(process)
    }

    /// Whether the current step's requirements are met.
    #[must_use]
    pub const fn can_advance(&self) -> bool {
        match self.step {
            CheckoutStep::Slot => self.slot.is_some(),
            CheckoutStep::CustomerInfo => self.customer.is_some(),
            CheckoutStep::Recap => true,
            CheckoutStep::Payment | CheckoutStep::Confirmation => false,
        }
    }

    /// True unless at the first or last step.
    #[must_use]
    pub fn can_go_back(&self) -> bool {
        self.step != CheckoutStep::FIRST && self.step != CheckoutStep::LAST
    }

    /// Move to the next step.
    ///
    /// # Errors
    ///
    /// Returns `CheckoutError::CannotAdvance` if the guard fails.
    pub fn advance(&mut self) -> Result<CheckoutStep, CheckoutError> {
        match self.step.next() {
            Some(next) if self.can_advance() => {
                self.step = next;
                Ok(next)
            }
            _ => Err(CheckoutError::CannotAdvance(self.step)),
        }
    }

    /// Move to the previous step.
    ///
    /// # Errors
    ///
    /// Returns `CheckoutError::CannotGoBack` at the first or last step.
    pub fn go_back(&mut self) -> Result<CheckoutStep, CheckoutError> {
        match self.step.previous() {
            Some(previous) if self.can_go_back() => {
                self.step = previous;
                Ok(previous)
            }
            _ => Err(CheckoutError::CannotGoBack(self.step)),
        }
    }

    /// Fail unless the wizard is at `expected`.
    ///
    /// # Errors
    ///
    /// Returns `CheckoutError::WrongStep`.
    pub fn ensure_step(&self, expected: CheckoutStep) -> Result<(), CheckoutError> {
        if self.step == expected {
            Ok(())
        } else {
            Err(CheckoutError::WrongStep {
                expected,
                actual: self.step,
            })
        }
    }

    /// Choose the pickup slot. The caller checks availability.
    ///
    /// # Errors
    ///
    /// Fails outside the slot step or once the order exists.
    pub fn select_slot(&mut self, start: NaiveDateTime) -> Result<(), CheckoutError> {
        self.ensure_step(CheckoutStep::Slot)?;
        self.ensure_not_placed()?;
        self.slot = Some(start);
        Ok(())
    }

    /// Set validated customer information.
    ///
    /// # Errors
    ///
    /// Fails outside the customer step or once the order exists.
    pub fn set_customer(&mut self, customer: CustomerInfo) -> Result<(), CheckoutError> {
        self.ensure_step(CheckoutStep::CustomerInfo)?;
        self.ensure_not_placed()?;
        self.customer = Some(customer);
        Ok(())
    }

    /// Apply a checked promo code and its reduction.
    ///
    /// # Errors
    ///
    /// Fails before the recap step or once the order exists.
    pub fn apply_promo(&mut self, code: String, reduction: Price) -> Result<(), CheckoutError> {
        self.ensure_promo_step()?;
        self.promo = Some(AppliedPromo { code, reduction });
        self.recompute_totals();
        Ok(())
    }

    /// Drop the promo code.
    ///
    /// # Errors
    ///
    /// Fails before the recap step or once the order exists.
    pub fn remove_promo(&mut self) -> Result<(), CheckoutError> {
        self.ensure_promo_step()?;
        self.promo = None;
        self.recompute_totals();
        Ok(())
    }

    /// Subtotal of the lines, before any reduction.
    #[must_use]
    pub fn subtotal(&self) -> Price {
        self.lines.iter().map(|line| line.line_total).sum()
    }

    /// Recompute totals from the lines, the promo and the VAT rate.
    pub fn recompute_totals(&mut self) {
        let discount = self.promo.as_ref().map_or(Price::ZERO, |p| p.reduction);
        self.totals = pricing::compute_totals(&self.lines, discount, self.vat_rate);
    }

    /// Record the pending order created for this checkout.
    pub fn attach_order(&mut self, id: OrderId, number: String) {
        self.order_id = Some(id);
        self.order_number = Some(number);
    }

    /// Forget an order that can no longer be paid, so a fresh one is placed.
    pub fn detach_order(&mut self) {
        self.order_id = None;
        self.order_number = None;
    }

    /// Record a declined attempt; the wizard stays at payment.
    pub fn record_attempt(&mut self, receipt: PaymentReceipt) {
        self.last_payment = Some(receipt);
    }

    /// Finish with a successful payment.
    ///
    /// # Errors
    ///
    /// Fails outside the payment step.
    pub fn complete(&mut self, receipt: PaymentReceipt) -> Result<(), CheckoutError> {
        self.ensure_step(CheckoutStep::Payment)?;
        self.last_payment = Some(receipt);
        self.step = CheckoutStep::Confirmation;
        Ok(())
    }

    /// True once the checkout reached confirmation.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.step == CheckoutStep::LAST
    }

    fn ensure_not_placed(&self) -> Result<(), CheckoutError> {
        if self.order_id.is_some() {
            Err(CheckoutError::OrderAlreadyPlaced)
        } else {
            Ok(())
        }
    }

    fn ensure_promo_step(&self) -> Result<(), CheckoutError> {
        if !matches!(self.step, CheckoutStep::Recap | CheckoutStep::Payment) {
            return Err(CheckoutError::WrongStep {
                expected: CheckoutStep::Recap,
                actual: self.step,
            });
        }
        self.ensure_not_placed()
    }
}
