//! Session middleware configuration and session-held state.
//!
//! Sets up sessions using tower-sessions. The store is `PostgreSQL` when a
//! database is configured, in-memory otherwise. The cart, the checkout in
//! progress and the list of orders placed by the visitor all live in the
//! session under [`session_keys`].

use serde::{Serialize, de::DeserializeOwned};
use tower_sessions::{Expiry, Session, SessionManagerLayer, SessionStore};
use tracing::warn;

use crate::config::StorefrontConfig;
use crate::models::{Cart, CheckoutProcess, session_keys};

/// Session cookie name.
pub const SESSION_COOKIE_NAME: &str = "fournil_session";

/// Session expiry time in seconds (7 days).
const SESSION_EXPIRY_SECONDS: i64 = 7 * 24 * 60 * 60;

/// Orders remembered in an anonymous session.
const ORDER_HISTORY_LIMIT: usize = 50;

/// Create the session layer over `store`.
#[must_use]
pub fn create_session_layer<S: SessionStore + Clone>(
    store: S,
    config: &StorefrontConfig,
) -> SessionManagerLayer<S> {
    // Determine if we're in production (HTTPS)
    let is_secure = config.base_url.starts_with("https://");

    SessionManagerLayer::new(store)
        .with_name(SESSION_COOKIE_NAME)
        .with_expiry(Expiry::OnInactivity(
            tower_sessions::cookie::time::Duration::seconds(SESSION_EXPIRY_SECONDS),
        ))
        .with_secure(is_secure)
        .with_same_site(tower_sessions::cookie::SameSite::Lax)
        .with_http_only(true)
        .with_path("/")
}

/// Read `key`, treating a value that no longer deserializes as absent.
async fn get_lenient<T: DeserializeOwned>(
    session: &Session,
    key: &str,
) -> Result<Option<T>, tower_sessions::session::Error> {
    match session.get::<T>(key).await {
        Ok(value) => Ok(value),
        Err(tower_sessions::session::Error::SerdeJson(e)) => {
            warn!(key, error = %e, "Discarding unreadable session value");
            session.remove_value(key).await?;
            Ok(None)
        }
        Err(e) => Err(e),
    }
}

async fn put<T: Serialize + Sync>(
    session: &Session,
    key: &str,
    value: &T,
) -> Result<(), tower_sessions::session::Error> {
    session.insert(key, value).await
}

/// The visitor's cart; empty if none or unreadable.
///
/// # Errors
///
/// Returns an error if the session store fails.
pub async fn load_cart(session: &Session) -> Result<Cart, tower_sessions::session::Error> {
    Ok(get_lenient(session, session_keys::CART)
        .await?
        .unwrap_or_default())
}

/// Persist the cart after a mutation.
///
/// # Errors
///
/// Returns an error if the session cannot be modified.
pub async fn save_cart(session: &Session, cart: &Cart) -> Result<(), tower_sessions::session::Error> {
    put(session, session_keys::CART, cart).await
}

/// The checkout in progress, if any.
///
/// # Errors
///
/// Returns an error if the session store fails.
pub async fn load_checkout(
    session: &Session,
) -> Result<Option<CheckoutProcess>, tower_sessions::session::Error> {
    get_lenient(session, session_keys::CHECKOUT).await
}

/// Persist the checkout.
///
/// # Errors
///
/// Returns an error if the session cannot be modified.
pub async fn save_checkout(
    session: &Session,
    process: &CheckoutProcess,
) -> Result<(), tower_sessions::session::Error> {
    put(session, session_keys::CHECKOUT, process).await
}

/// Drop the checkout.
///
/// # Errors
///
/// Returns an error if the session cannot be modified.
pub async fn clear_checkout(session: &Session) -> Result<(), tower_sessions::session::Error> {
    session.remove_value(session_keys::CHECKOUT).await?;
    Ok(())
}

/// Order numbers placed from this session, oldest first.
///
/// # Errors
///
/// Returns an error if the session store fails.
pub async fn load_order_history(
    session: &Session,
) -> Result<Vec<String>, tower_sessions::session::Error> {
    Ok(get_lenient(session, session_keys::ORDER_HISTORY)
        .await?
        .unwrap_or_default())
}

/// Remember an order placed from this session.
///
/// # Errors
///
/// Returns an error if the session cannot be modified.
pub async fn push_order_history(
    session: &Session,
    order_number: &str,
) -> Result<(), tower_sessions::session::Error> {
    let mut history = load_order_history(session).await?;
    if !history.iter().any(|n| n == order_number) {
        history.push(order_number.to_owned());
    }
    if history.len() > ORDER_HISTORY_LIMIT {
        history.drain(..history.len() - ORDER_HISTORY_LIMIT);
    }
    put(session, session_keys::ORDER_HISTORY, &history).await
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tower_sessions::MemoryStore;

    use crate::models::test_support::product;

    fn session() -> Session {
        Session::new(None, Arc::new(MemoryStore::default()), None)
    }

    #[tokio::test]
    async fn test_cart_roundtrip() {
        let session = session();
        assert!(load_cart(&session).await.unwrap().is_empty());

        let mut cart = Cart::default();
        cart.add(&product(1, "Chausson aux pommes", 450, 10), 2);
        save_cart(&session, &cart).await.unwrap();
        assert_eq!(load_cart(&session).await.unwrap(), cart);
    }

    #[tokio::test]
    async fn test_unreadable_cart_is_empty() {
        let session = session();
        session
            .insert(session_keys::CART, "not a cart")
            .await
            .unwrap();
        assert!(load_cart(&session).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_order_history_dedupes() {
        let session = session();
        push_order_history(&session, "CMD-20260603-AAAAAA").await.unwrap();
        push_order_history(&session, "CMD-20260603-BBBBBB").await.unwrap();
        push_order_history(&session, "CMD-20260603-AAAAAA").await.unwrap();
        assert_eq!(
            load_order_history(&session).await.unwrap(),
            vec!["CMD-20260603-AAAAAA", "CMD-20260603-BBBBBB"]
        );
    }
}
