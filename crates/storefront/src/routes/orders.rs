//! Customer order history and invoices.
//!
//! A visitor sees the orders of their account when logged in, and the orders
//! placed from their session otherwise. Admins see every order.

use axum::{
    Json,
    extract::{Path, Query, State},
    http::header,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use tower_sessions::Session;
use tracing::instrument;

use crate::error::{AppError, Result};
use crate::middleware::OptionalAuth;
use crate::middleware::session::load_order_history;
use crate::models::{CurrentUser, Order, OrderFilter, Payment};
use crate::services::pricing;
use crate::state::AppState;

/// An order with its payment attempts.
#[derive(Debug, Serialize)]
pub struct OrderDetail {
    #[serde(flatten)]
    pub order: Order,
    pub payments: Vec<Payment>,
}

/// Invoice output format.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InvoiceFormat {
    #[default]
    Json,
    Text,
}

#[derive(Debug, Default, Deserialize)]
pub struct InvoiceQuery {
    #[serde(default)]
    pub format: InvoiceFormat,
}

/// Load an order the visitor is allowed to see. Others get a 404.
async fn visible_order(
    state: &AppState,
    session: &Session,
    user: Option<&CurrentUser>,
    number: &str,
) -> Result<Order> {
    let not_found = || AppError::NotFound(format!("order {number}"));
    let order = state
        .store()
        .get_order_by_number(number)
        .await?
        .ok_or_else(not_found)?;

    let owned = user.is_some_and(|u| u.is_admin() || order.user_id == Some(u.id));
    if owned
        || load_order_history(session)
            .await?
            .iter()
            .any(|n| n == &order.number)
    {
        Ok(order)
    } else {
        Err(not_found())
    }
}

/// `GET /api/orders`, newest first.
#[instrument(skip(state, session, user))]
pub async fn list(
    State(state): State<AppState>,
    session: Session,
    OptionalAuth(user): OptionalAuth,
) -> Result<Json<Vec<Order>>> {
    if let Some(user) = user {
        let filter = OrderFilter {
            user_id: Some(user.id),
            ..OrderFilter::default()
        };
        return Ok(Json(state.store().list_orders(&filter).await?));
    }

    let history = load_order_history(&session).await?;
    let mut orders = Vec::with_capacity(history.len());
    for number in history.iter().rev() {
        if let Some(order) = state.store().get_order_by_number(number).await? {
            orders.push(order);
        }
    }
    Ok(Json(orders))
}

/// `GET /api/orders/{number}`
#[instrument(skip(state, session, user))]
pub async fn show(
    State(state): State<AppState>,
    session: Session,
    OptionalAuth(user): OptionalAuth,
    Path(number): Path<String>,
) -> Result<Json<OrderDetail>> {
    let order = visible_order(&state, &session, user.as_ref(), &number).await?;
    let payments = state.store().list_payments_for_order(order.id).await?;
    Ok(Json(OrderDetail { order, payments }))
}

/// `GET /api/orders/{number}/invoice?format=json|text`
#[instrument(skip(state, session, user))]
pub async fn invoice(
    State(state): State<AppState>,
    session: Session,
    OptionalAuth(user): OptionalAuth,
    Path(number): Path<String>,
    Query(query): Query<InvoiceQuery>,
) -> Result<Response> {
    let order = visible_order(&state, &session, user.as_ref(), &number).await?;
    let invoice = state
        .store()
        .get_invoice_for_order(order.id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("invoice for order {number}")))?;

    Ok(match query.format {
        InvoiceFormat::Json => Json(invoice).into_response(),
        InvoiceFormat::Text => {
            let shop = &state.config().shop;
            let text = invoice.render_text(&shop.name, &pricing::rate_percent(shop.vat_rate));
            (
                [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
                text,
            )
                .into_response()
        }
    })
}
