//! Checkout wizard route handlers.
//!
//! The [`CheckoutProcess`] is kept in the session. Every handler loads it,
//! applies one transition and saves it. `POST /api/checkout/pay` hands the
//! process to [`CheckoutService`](crate::services::checkout::CheckoutService)
//! for order creation and payment.

use axum::{
    Json,
    extract::State,
    http::StatusCode,
};
use chrono::{NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use tower_sessions::Session;
use tracing::{info, instrument};

use crate::error::{AppError, Result, add_breadcrumb};
use crate::middleware::OptionalAuth;
use crate::middleware::session::{
    clear_checkout, load_cart, load_checkout, push_order_history, save_cart, save_checkout,
};
use crate::models::{
    CheckoutError, CheckoutProcess, CustomerInfoInput, Invoice, Order, PaymentRequest, PickupSlot,
};
use crate::services::checkout::PayOutcome;
use crate::services::promo;
use crate::state::AppState;

// =============================================================================
// Types
// =============================================================================

/// Checkout as returned to the client, with the step guards.
#[derive(Debug, Serialize)]
pub struct CheckoutView {
    #[serde(flatten)]
    pub process: CheckoutProcess,
    pub can_advance: bool,
    pub can_go_back: bool,
}

impl From<CheckoutProcess> for CheckoutView {
    fn from(process: CheckoutProcess) -> Self {
        Self {
            can_advance: process.can_advance(),
            can_go_back: process.can_go_back(),
            process,
        }
    }
}

/// `PUT /api/checkout/slot` body.
#[derive(Debug, Deserialize)]
pub struct SelectSlot {
    pub start: NaiveDateTime,
}

/// `POST /api/checkout/promo` body.
#[derive(Debug, Deserialize)]
pub struct ApplyPromo {
    pub code: String,
}

/// Successful payment.
#[derive(Debug, Serialize)]
pub struct PaidView {
    pub order: Order,
    pub invoice: Invoice,
    pub checkout: CheckoutView,
}

// =============================================================================
// Helpers
// =============================================================================

async fn current(session: &Session) -> Result<CheckoutProcess> {
    load_checkout(session)
        .await?
        .ok_or_else(|| CheckoutError::NotStarted.into())
}

async fn store(session: &Session, process: CheckoutProcess) -> Result<Json<CheckoutView>> {
    save_checkout(session, &process).await?;
    Ok(Json(process.into()))
}

// =============================================================================
// Handlers
// =============================================================================

/// `POST /api/checkout`: start from the cart, replacing any unfinished checkout.
#[instrument(skip(state, session))]
pub async fn start(
    State(state): State<AppState>,
    session: Session,
) -> Result<(StatusCode, Json<CheckoutView>)> {
    let cart = load_cart(&session).await?;
    let process = CheckoutProcess::start(&cart, state.config().shop.vat_rate)?;

    if let Some(previous) = load_checkout(&session).await? {
        state.checkout().cancel(&previous).await?;
        if previous.order_id.is_some() {
            state.catalog().invalidate().await;
        }
    }

    info!(lines = process.lines.len(), total = %process.totals.total, "Checkout started");
    Ok((StatusCode::CREATED, store(&session, process).await?))
}

/// `GET /api/checkout`
#[instrument(skip(session))]
pub async fn show(session: Session) -> Result<Json<CheckoutView>> {
    Ok(Json(current(&session).await?.into()))
}

/// `DELETE /api/checkout`: discard the process and cancel its unpaid order.
#[instrument(skip(state, session))]
pub async fn cancel(State(state): State<AppState>, session: Session) -> Result<StatusCode> {
    let process = current(&session).await?;
    state.checkout().cancel(&process).await?;
    if process.order_id.is_some() {
        state.catalog().invalidate().await;
    }
    clear_checkout(&session).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// `GET /api/checkout/slots`
#[instrument(skip(state))]
pub async fn slots(State(state): State<AppState>) -> Result<Json<Vec<PickupSlot>>> {
    Ok(Json(state.slots().list(state.store(), Utc::now()).await?))
}

/// `PUT /api/checkout/slot`
#[instrument(skip(state, session))]
pub async fn select_slot(
    State(state): State<AppState>,
    session: Session,
    Json(body): Json<SelectSlot>,
) -> Result<Json<CheckoutView>> {
    let mut process = current(&session).await?;
    state
        .slots()
        .ensure_available(state.store(), body.start, Utc::now())
        .await?;
    process.select_slot(body.start)?;
    store(&session, process).await
}

/// `PUT /api/checkout/customer`
#[instrument(skip(session, input))]
pub async fn set_customer(
    session: Session,
    Json(input): Json<CustomerInfoInput>,
) -> Result<Json<CheckoutView>> {
    let mut process = current(&session).await?;
    let customer = input.validate()?;
    process.set_customer(customer)?;
    store(&session, process).await
}

/// `POST /api/checkout/next`
#[instrument(skip(session))]
pub async fn next(session: Session) -> Result<Json<CheckoutView>> {
    let mut process = current(&session).await?;
    process.advance()?;
    store(&session, process).await
}

/// `POST /api/checkout/back`
#[instrument(skip(session))]
pub async fn back(session: Session) -> Result<Json<CheckoutView>> {
    let mut process = current(&session).await?;
    process.go_back()?;
    store(&session, process).await
}

/// `POST /api/checkout/promo`
#[instrument(skip(state, session))]
pub async fn apply_promo(
    State(state): State<AppState>,
    session: Session,
    Json(body): Json<ApplyPromo>,
) -> Result<Json<CheckoutView>> {
    let mut process = current(&session).await?;
    let (promo, reduction) =
        promo::evaluate(state.store(), &body.code, process.subtotal(), Utc::now()).await?;
    process.apply_promo(promo.code, reduction)?;
    store(&session, process).await
}

/// `DELETE /api/checkout/promo`
#[instrument(skip(session))]
pub async fn remove_promo(session: Session) -> Result<Json<CheckoutView>> {
    let mut process = current(&session).await?;
    process.remove_promo()?;
    store(&session, process).await
}

/// `POST /api/checkout/pay`
///
/// A declined payment answers 402 and leaves the wizard at the payment step
/// with the pending order kept for a retry.
#[instrument(skip(state, session, user, request))]
pub async fn pay(
    State(state): State<AppState>,
    session: Session,
    OptionalAuth(user): OptionalAuth,
    Json(request): Json<PaymentRequest>,
) -> Result<Json<PaidView>> {
    let mut process = current(&session).await?;
    let had_order = process.order_id.is_some();

    let outcome = state
        .checkout()
        .pay(&mut process, user.map(|u| u.id), &request)
        .await;

    // The process may have gained an order even if the attempt failed.
    save_checkout(&session, &process).await?;
    if !had_order && process.order_id.is_some() {
        state.catalog().invalidate().await;
    }

    match outcome? {
        PayOutcome::Paid { order, invoice } => {
            let mut cart = load_cart(&session).await?;
            cart.clear();
            save_cart(&session, &cart).await?;
            push_order_history(&session, &order.number).await?;
            Ok(Json(PaidView {
                order,
                invoice,
                checkout: process.into(),
            }))
        }
        PayOutcome::Declined { receipt } => {
            let reason = receipt
                .decline_reason
                .unwrap_or_else(|| "payment declined".to_owned());
            add_breadcrumb(
                "checkout",
                "Payment declined",
                Some(&[
                    ("order", process.order_number.as_deref().unwrap_or_default()),
                    ("reason", reason.as_str()),
                ]),
            );
            Err(AppError::PaymentDeclined(reason))
        }
    }
}
