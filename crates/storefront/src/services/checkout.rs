//! Checkout finalization: order creation, payment and invoicing.
//!
//! The wizard itself ([`CheckoutProcess`]) is pure state kept in the session.
//! This service performs the side effects of its last step:
//!
//! 1. On the first payment attempt, the slot and promo are checked again,
//!    stock is taken for every line, the promo use is counted and the order
//!    is created in `pending_payment`.
//! 2. The payment simulator runs and the attempt is recorded.
//! 3. On success the order is confirmed and the invoice issued. On decline
//!    the pending order is kept for a retry. Cancelling it gives back the
//!    stock and the promo use.
//!
//! A retry only reuses the pending order while it is still `pending_payment`
//! and younger than the pending order TTL. Otherwise the stale order is
//! released and a fresh one is placed before anything is charged.

use std::time::Duration;

use chrono::{TimeDelta, Utc};
use tracing::{error, info, instrument, warn};

use fournil_core::{CheckoutStep, OrderId, OrderStatus, UserId};

use super::orders::{self, OrderError};
use super::payment::{PaymentError, PaymentSimulator};
use super::promo::{self, PromoCheckError};
use super::slots::{SlotError, SlotSchedule};
use crate::db::{RepositoryError, Store};
use crate::models::order::generate_order_number;
use crate::models::{
    CheckoutError, CheckoutProcess, Invoice, NewInvoice, NewOrder, NewPayment, Order,
    PaymentReceipt, PaymentRequest, PromoError,
};

/// Attempts at drawing an unused order number.
const ORDER_NUMBER_ATTEMPTS: usize = 3;

/// A pending order this close to expiry is not reused for a payment.
const REUSE_MARGIN_SECS: i64 = 60;

/// Why a payment could not be attempted.
#[derive(Debug, thiserror::Error)]
pub enum FinalizeError {
    #[error(transparent)]
    Checkout(#[from] CheckoutError),

    #[error(transparent)]
    Slot(#[from] SlotError),

    #[error(transparent)]
    Promo(#[from] PromoCheckError),

    #[error(transparent)]
    Payment(#[from] PaymentError),

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// Result of a payment attempt.
#[derive(Debug)]
pub enum PayOutcome {
    /// The order is confirmed and invoiced; the wizard is at confirmation.
    Paid { order: Order, invoice: Invoice },
    /// The payment was declined; the wizard stays at payment.
    Declined { receipt: PaymentReceipt },
}

/// Side effects of the checkout wizard.
pub struct CheckoutService<'a> {
    store: &'a dyn Store,
    slots: &'a SlotSchedule,
    payments: &'a PaymentSimulator,
    pending_ttl: TimeDelta,
}

impl<'a> CheckoutService<'a> {
    /// `pending_ttl` is the age at which unpaid orders expire.
    #[must_use]
    pub fn new(
        store: &'a dyn Store,
        slots: &'a SlotSchedule,
        payments: &'a PaymentSimulator,
        pending_ttl: Duration,
    ) -> Self {
        Self {
            store,
            slots,
            payments,
            pending_ttl: TimeDelta::from_std(pending_ttl).unwrap_or(TimeDelta::MAX),
        }
    }

    /// Pay for the checkout, creating its order first if needed.
    ///
    /// `process` is updated in place and must be saved back to the session
    /// whatever the outcome, so a retry reuses the pending order.
    ///
    /// # Errors
    ///
    /// Returns `FinalizeError` if the wizard is not at the payment step, the
    /// slot or promo are no longer valid, stock ran out, the payment details
    /// are malformed, or the store fails.
    #[instrument(skip(self, process, request), fields(order_number = tracing::field::Empty))]
    pub async fn pay(
        &self,
        process: &mut CheckoutProcess,
        user_id: Option<UserId>,
        request: &PaymentRequest,
    ) -> Result<PayOutcome, FinalizeError> {
        process.ensure_step(CheckoutStep::Payment)?;
        self.payments.validate(request)?;

        let order_id = match self.reusable_order(process).await? {
            Some(id) => id,
            None => self.place_order(process, user_id).await?.id,
        };
        tracing::Span::current().record(
            "order_number",
            process.order_number.as_deref().unwrap_or_default(),
        );

        let receipt = self.payments.process(request, process.totals.total).await?;
        self.store
            .create_payment(&NewPayment {
                order_id,
                receipt: receipt.clone(),
            })
            .await?;

        if !receipt.succeeded() {
            info!(reason = ?receipt.decline_reason, "Payment declined");
            process.record_attempt(receipt.clone());
            return Ok(PayOutcome::Declined { receipt });
        }

        let order = self
            .store
            .transition_order_status(order_id, OrderStatus::PendingPayment, OrderStatus::Confirmed)
            .await
            .inspect_err(|e| {
                error!(
                    transaction_id = ?receipt.transaction_id,
                    error = %e,
                    "Payment captured but the order could not be confirmed"
                );
            })?;

        let invoice = self
            .store
            .create_invoice(&NewInvoice {
                order_id,
                payment_method: receipt.method,
                transaction_id: receipt.transaction_id.clone(),
                issued_at: receipt.processed_at,
            })
            .await?;

        process.complete(receipt)?;
        info!(invoice = %invoice.number, total = %order.totals.total, "Order paid");
        Ok(PayOutcome::Paid { order, invoice })
    }

    /// Discard a checkout, cancelling its unpaid order.
    ///
    /// # Errors
    ///
    /// Returns `OrderError` if the order cannot be cancelled.
    #[instrument(skip_all, fields(order_number = ?process.order_number))]
    pub async fn cancel(&self, process: &CheckoutProcess) -> Result<(), OrderError> {
        let Some(order_id) = process.order_id else {
            return Ok(());
        };
        if process.is_complete() {
            return Ok(());
        }
        match self.store.get_order(order_id).await? {
            Some(order) if order.status == OrderStatus::PendingPayment => {
                orders::transition_order(self.store, order_id, OrderStatus::Cancelled).await?;
            }
            _ => {}
        }
        Ok(())
    }

    /// The order attached to `process`, if a payment may still be taken for it.
    ///
    /// A cancelled or vanished order is detached. A pending order at or near
    /// its expiry is cancelled, releasing its stock, then detached. A paid
    /// order is never paid twice.
    async fn reusable_order(
        &self,
        process: &mut CheckoutProcess,
    ) -> Result<Option<OrderId>, FinalizeError> {
        let Some(order_id) = process.order_id else {
            return Ok(None);
        };
        match self.store.get_order(order_id).await? {
            Some(order) if order.status == OrderStatus::PendingPayment => {
                let age = Utc::now() - order.created_at;
                if age + TimeDelta::seconds(REUSE_MARGIN_SECS) < self.pending_ttl {
                    return Ok(Some(order_id));
                }
                warn!(order_number = %order.number, "Pending order expired, placing a new one");
                match orders::transition_order(self.store, order_id, OrderStatus::Cancelled).await
                {
                    Ok(_) | Err(OrderError::NotFound) => {}
                    Err(OrderError::Transition(e)) => {
                        return Err(RepositoryError::Conflict(e.to_string()).into());
                    }
                    Err(OrderError::Repository(e)) => return Err(e.into()),
                }
            }
            Some(order) if order.status == OrderStatus::Cancelled => {
                warn!(order_number = %order.number, "Pending order was cancelled, placing a new one");
            }
            Some(_) => return Err(CheckoutError::OrderAlreadyPlaced.into()),
            None => warn!(%order_id, "Pending order disappeared, placing a new one"),
        }
        process.detach_order();
        Ok(None)
    }

    /// Check the slot and promo again, take the stock and create the order.
    async fn place_order(
        &self,
        process: &mut CheckoutProcess,
        user_id: Option<UserId>,
    ) -> Result<Order, FinalizeError> {
        let slot = process.slot.ok_or(CheckoutError::MissingSlot)?;
        let customer = process
            .customer
            .clone()
            .ok_or(CheckoutError::MissingCustomer)?;
        let now = Utc::now();

        self.slots.ensure_available(self.store, slot, now).await?;

        if let Some(applied) = process.promo.clone() {
            let (promo, reduction) =
                promo::evaluate(self.store, &applied.code, process.subtotal(), now).await?;
            process.apply_promo(promo.code, reduction)?;
        }
        process.recompute_totals();

        orders::reserve_stock(self.store, &process.lines).await?;

        let promo_code = process.promo.as_ref().map(|p| p.code.clone());
        if let Some(code) = &promo_code
            && let Err(e) = self.store.record_promo_use(code).await
        {
            orders::restore_stock(self.store, &process.lines).await;
            return Err(match e {
                RepositoryError::Conflict(_) => {
                    PromoCheckError::from(PromoError::UsageLimitReached).into()
                }
                other => other.into(),
            });
        }

        let mut last_error = None;
        for _ in 0..ORDER_NUMBER_ATTEMPTS {
            let new_order = NewOrder {
                number: generate_order_number(now),
                user_id,
                lines: process.lines.clone(),
                pickup_at: slot,
                customer: customer.clone(),
                promo_code: promo_code.clone(),
                totals: process.totals,
                slot_capacity: self.slots.config().capacity,
            };
            match self.store.create_order(&new_order).await {
                Ok(order) => {
                    info!(order_number = %order.number, pickup_at = %slot, "Order created");
                    process.attach_order(order.id, order.number.clone());
                    return Ok(order);
                }
                Err(RepositoryError::Conflict(msg)) => {
                    warn!(%msg, "Order number taken, drawing another");
                    last_error = Some(RepositoryError::Conflict(msg));
                }
                Err(e) => {
                    last_error = Some(e);
                    break;
                }
            }
        }

        orders::restore_stock(self.store, &process.lines).await;
        if let Some(code) = &promo_code {
            orders::release_promo_use(self.store, code).await;
        }
        Err(last_error
            .unwrap_or_else(|| RepositoryError::Conflict("no order number available".to_owned()))
            .into())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::db::{CatalogRepository, OrderRepository, PaymentRepository, PromoRepository};

    use fournil_core::{Price, ProductId};
    use rust_decimal::Decimal;

    use crate::config::{PaymentConfig, SlotConfig};
    use crate::db::MemoryStore;
    use crate::db::seed::SeedData;
    use crate::models::{Cart, CustomerInfoInput, ProductFilter};

    struct Fixture {
        store: MemoryStore,
        slots: SlotSchedule,
        payments: PaymentSimulator,
        pending_ttl: Duration,
    }

    impl Fixture {
        async fn new() -> Self {
            let store = MemoryStore::new();
            SeedData::demo().unwrap().apply(&store).await.unwrap();
            Self {
                store,
                slots: SlotSchedule::new(SlotConfig::default()),
                payments: PaymentSimulator::new(&PaymentConfig {
                    delay: Duration::ZERO,
                    failure_rate: 0.0,
                }),
                pending_ttl: Duration::from_secs(30 * 60),
            }
        }

        fn service(&self) -> CheckoutService<'_> {
            CheckoutService::new(&self.store, &self.slots, &self.payments, self.pending_ttl)
        }

        async fn product(&self, name: &str) -> ProductId {
            self.store
                .list_products(&ProductFilter::default())
                .await
                .unwrap()
                .into_iter()
                .find(|p| p.name == name)
                .unwrap()
                .id
        }

        async fn stock(&self, id: ProductId) -> u32 {
            self.store.get_product(id).await.unwrap().unwrap().stock
        }

        async fn promo_uses(&self, code: &str) -> u32 {
            self.store
                .get_promo_code_by_code(code)
                .await
                .unwrap()
                .unwrap()
                .uses
        }

        /// A checkout at the payment step for 4 chaussons (18.00).
        async fn at_payment(&self) -> CheckoutProcess {
            let product = self
                .store
                .get_product(self.product("Chausson aux pommes").await)
                .await
                .unwrap()
                .unwrap();
            let mut cart = Cart::default();
            cart.add(&product, 4);

            let mut process = CheckoutProcess::start(&cart, Decimal::new(55, 3)).unwrap();
            let slot = self
                .slots
                .list(&self.store, Utc::now())
                .await
                .unwrap()
                .into_iter()
                .find(|s| s.available)
                .unwrap();
            process.select_slot(slot.start).unwrap();
            process.advance().unwrap();
            process
                .set_customer(
                    CustomerInfoInput {
                        first_name: "Léa".to_owned(),
                        last_name: "Martin".to_owned(),
                        email: "lea@example.fr".to_owned(),
                        phone: "06 12 34 56 78".to_owned(),
                        note: None,
                    }
                    .validate()
                    .unwrap(),
                )
                .unwrap();
            process.advance().unwrap();
            process
                .apply_promo("BIENVENUE10".to_owned(), Price::from_cents(180))
                .unwrap();
            process.advance().unwrap();
            process
        }
    }

    fn card(number: &str) -> PaymentRequest {
        PaymentRequest::Card {
            holder: "Léa Martin".to_owned(),
            number: number.to_owned(),
            expiry: "12/99".to_owned(),
            cvv: "123".to_owned(),
        }
    }

    #[tokio::test]
    async fn test_decline_then_retry_reuses_order() {
        let fx = Fixture::new().await;
        let chausson = fx.product("Chausson aux pommes").await;
        let before = fx.stock(chausson).await;
        let mut process = fx.at_payment().await;

        let outcome = fx
            .service()
            .pay(&mut process, None, &card("4000000000009995"))
            .await
            .unwrap();
        assert!(matches!(outcome, PayOutcome::Declined { .. }));
        assert_eq!(process.step, CheckoutStep::Payment);
        let order_id = process.order_id.unwrap();
        assert_eq!(fx.stock(chausson).await, before - 4);

        let outcome = fx
            .service()
            .pay(&mut process, None, &card("4242424242424242"))
            .await
            .unwrap();
        let PayOutcome::Paid { order, invoice } = outcome else {
            panic!("expected a successful payment");
        };
        assert_eq!(order.id, order_id);
        assert_eq!(order.status, OrderStatus::Confirmed);
        assert_eq!(order.totals.total, Price::from_cents(1620));
        assert_eq!(invoice.order_id, order_id);
        assert!(process.is_complete());
        assert_eq!(fx.stock(chausson).await, before - 4);

        let payments = fx.store.list_payments_for_order(order_id).await.unwrap();
        assert_eq!(payments.len(), 2);
        let promo = fx
            .store
            .get_promo_code_by_code("BIENVENUE10")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(promo.uses, 1);
    }

    #[tokio::test]
    async fn test_cancel_restores_stock() {
        let fx = Fixture::new().await;
        let chausson = fx.product("Chausson aux pommes").await;
        let before = fx.stock(chausson).await;
        let mut process = fx.at_payment().await;

        fx.service()
            .pay(&mut process, None, &card("4000000000000002"))
            .await
            .unwrap();
        assert_eq!(fx.promo_uses("BIENVENUE10").await, 1);
        fx.service().cancel(&process).await.unwrap();

        assert_eq!(fx.stock(chausson).await, before);
        assert_eq!(fx.promo_uses("BIENVENUE10").await, 0);
        let order = fx
            .store
            .get_order(process.order_id.unwrap())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(order.status, OrderStatus::Cancelled);
    }

    #[tokio::test]
    async fn test_retry_after_cancellation_places_new_order() {
        let fx = Fixture::new().await;
        let chausson = fx.product("Chausson aux pommes").await;
        let before = fx.stock(chausson).await;
        let mut process = fx.at_payment().await;

        fx.service()
            .pay(&mut process, None, &card("4000000000000002"))
            .await
            .unwrap();
        let first = process.order_id.unwrap();
        orders::transition_order(&fx.store, first, OrderStatus::Cancelled)
            .await
            .unwrap();
        assert_eq!(fx.stock(chausson).await, before);

        let outcome = fx
            .service()
            .pay(&mut process, None, &card("4242424242424242"))
            .await
            .unwrap();
        let PayOutcome::Paid { order, invoice } = outcome else {
            panic!("expected a successful payment");
        };
        assert_ne!(order.id, first);
        assert_eq!(order.status, OrderStatus::Confirmed);
        assert_eq!(order.totals.total, Price::from_cents(1620));
        assert_eq!(invoice.order_id, order.id);
        assert_eq!(process.order_id, Some(order.id));
        assert_eq!(fx.stock(chausson).await, before - 4);

        let cancelled = fx.store.get_order(first).await.unwrap().unwrap();
        assert_eq!(cancelled.status, OrderStatus::Cancelled);
        assert_eq!(fx.promo_uses("BIENVENUE10").await, 1);
        let charged = fx.store.list_payments_for_order(first).await.unwrap();
        assert_eq!(charged.len(), 1);
        assert!(!charged.first().unwrap().receipt.succeeded());
    }

    #[tokio::test]
    async fn test_retry_after_expiry_releases_old_order() {
        let mut fx = Fixture::new().await;
        fx.pending_ttl = Duration::from_secs(60);
        let chausson = fx.product("Chausson aux pommes").await;
        let before = fx.stock(chausson).await;
        let mut process = fx.at_payment().await;

        fx.service()
            .pay(&mut process, None, &card("4000000000000002"))
            .await
            .unwrap();
        let first = process.order_id.unwrap();

        let outcome = fx
            .service()
            .pay(&mut process, None, &card("4242424242424242"))
            .await
            .unwrap();
        let PayOutcome::Paid { order, .. } = outcome else {
            panic!("expected a successful payment");
        };
        assert_ne!(order.id, first);
        let expired = fx.store.get_order(first).await.unwrap().unwrap();
        assert_eq!(expired.status, OrderStatus::Cancelled);
        assert_eq!(fx.stock(chausson).await, before - 4);
    }

    #[tokio::test]
    async fn test_confirmed_order_is_not_charged_again() {
        let fx = Fixture::new().await;
        let mut process = fx.at_payment().await;

        fx.service()
            .pay(&mut process, None, &card("4000000000000002"))
            .await
            .unwrap();
        let first = process.order_id.unwrap();
        orders::transition_order(&fx.store, first, OrderStatus::Confirmed)
            .await
            .unwrap();

        assert!(matches!(
            fx.service()
                .pay(&mut process, None, &card("4242424242424242"))
                .await,
            Err(FinalizeError::Checkout(CheckoutError::OrderAlreadyPlaced))
        ));
        assert_eq!(process.order_id, Some(first));
        assert_eq!(fx.store.list_payments_for_order(first).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_invalid_card_places_no_order() {
        let fx = Fixture::new().await;
        let chausson = fx.product("Chausson aux pommes").await;
        let before = fx.stock(chausson).await;
        let mut process = fx.at_payment().await;

        let err = fx
            .service()
            .pay(&mut process, None, &card("1234"))
            .await
            .unwrap_err();
        assert!(matches!(err, FinalizeError::Payment(PaymentError::InvalidCardNumber)));
        assert!(process.order_id.is_none());
        assert_eq!(fx.stock(chausson).await, before);
    }

    #[tokio::test]
    async fn test_pay_requires_payment_step() {
        let fx = Fixture::new().await;
        let mut process = fx.at_payment().await;
        process.go_back().unwrap();
        assert!(matches!(
            fx.service()
                .pay(&mut process, None, &card("4242424242424242"))
                .await,
            Err(FinalizeError::Checkout(CheckoutError::WrongStep { .. }))
        ));
        assert!(process.order_id.is_none());
    }
}
