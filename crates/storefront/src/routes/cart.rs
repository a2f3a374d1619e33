//! Cart route handlers.
//!
//! The cart lives in the session. Each handler loads it, applies one
//! transition and saves it back before answering with the new state.

use axum::{
    Json,
    extract::{Path, State},
};
use serde::{Deserialize, Serialize};
use tower_sessions::Session;
use tracing::{debug, instrument};

use fournil_core::{Price, ProductId};

use crate::error::{AppError, Result};
use crate::middleware::session::{load_cart, save_cart};
use crate::models::{Cart, CartError, CartItem, Product};
use crate::state::AppState;

// =============================================================================
// Types
// =============================================================================

/// Cart as returned to the client, with derived totals.
#[derive(Debug, Serialize)]
pub struct CartView {
    pub items: Vec<CartItem>,
    pub is_open: bool,
    pub total_items: u32,
    pub total: Price,
}

impl From<Cart> for CartView {
    fn from(cart: Cart) -> Self {
        Self {
            total_items: cart.total_items(),
            total: cart.total(),
            is_open: cart.is_open,
            items: cart.items,
        }
    }
}

/// `POST /api/cart/items` body.
#[derive(Debug, Deserialize)]
pub struct AddItem {
    pub product_id: ProductId,
    #[serde(default = "one")]
    pub quantity: u32,
}

const fn one() -> u32 {
    1
}

/// `PUT /api/cart/items/{product_id}` body.
#[derive(Debug, Deserialize)]
pub struct SetQuantity {
    pub quantity: i64,
}

// =============================================================================
// Handlers
// =============================================================================

async fn product(state: &AppState, id: ProductId) -> Result<Product> {
    state
        .catalog()
        .product(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("product {id}")))
}

async fn store(session: &Session, cart: Cart) -> Result<Json<CartView>> {
    save_cart(session, &cart).await?;
    Ok(Json(cart.into()))
}

/// `GET /api/cart`
#[instrument(skip(session))]
pub async fn show(session: Session) -> Result<Json<CartView>> {
    Ok(Json(load_cart(&session).await?.into()))
}

/// `DELETE /api/cart`
#[instrument(skip(session))]
pub async fn clear(session: Session) -> Result<Json<CartView>> {
    let mut cart = load_cart(&session).await?;
    cart.clear();
    store(&session, cart).await
}

/// `POST /api/cart/items`
#[instrument(skip(state, session))]
pub async fn add(
    State(state): State<AppState>,
    session: Session,
    Json(body): Json<AddItem>,
) -> Result<Json<CartView>> {
    let product = product(&state, body.product_id).await?;
    let mut cart = load_cart(&session).await?;
    cart.add_checked(&product, body.quantity)?;
    debug!(product = %product.name, quantity = body.quantity, "Added to cart");
    store(&session, cart).await
}

/// `PUT /api/cart/items/{product_id}`; zero or less removes the line.
#[instrument(skip(state, session))]
pub async fn update(
    State(state): State<AppState>,
    session: Session,
    Path(product_id): Path<ProductId>,
    Json(body): Json<SetQuantity>,
) -> Result<Json<CartView>> {
    let mut cart = load_cart(&session).await?;
    if body.quantity <= 0 {
        if !cart.remove(product_id) {
            return Err(CartError::NotInCart(product_id).into());
        }
    } else {
        let product = product(&state, product_id).await?;
        cart.set_quantity_checked(&product, body.quantity)?;
    }
    store(&session, cart).await
}

/// `DELETE /api/cart/items/{product_id}`
#[instrument(skip(session))]
pub async fn remove(
    session: Session,
    Path(product_id): Path<ProductId>,
) -> Result<Json<CartView>> {
    let mut cart = load_cart(&session).await?;
    if !cart.remove(product_id) {
        return Err(CartError::NotInCart(product_id).into());
    }
    store(&session, cart).await
}

/// `POST /api/cart/open`
#[instrument(skip(session))]
pub async fn open(session: Session) -> Result<Json<CartView>> {
    let mut cart = load_cart(&session).await?;
    cart.open();
    store(&session, cart).await
}

/// `POST /api/cart/close`
#[instrument(skip(session))]
pub async fn close(session: Session) -> Result<Json<CartView>> {
    let mut cart = load_cart(&session).await?;
    cart.close();
    store(&session, cart).await
}
