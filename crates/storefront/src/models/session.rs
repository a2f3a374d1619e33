//! Session-related types.
//!
//! Everything the storefront keeps per visitor lives in the session under the
//! keys below: the cart, the checkout in progress, the numbers of orders placed
//! from this browser and the logged-in user.

use serde::{Deserialize, Serialize};

use fournil_core::{Email, UserId, UserRole};

/// Session-stored user identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurrentUser {
    /// User's database ID.
    pub id: UserId,
    pub email: Email,
    /// Display name.
    pub name: String,
    pub role: UserRole,
}

impl CurrentUser {
    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.role == UserRole::Admin
    }
}

/// Session keys.
pub mod keys {
    /// The logged-in user.
    pub const CURRENT_USER: &str = "current_user";

    /// The visitor's cart.
    pub const CART: &str = "cart";

    /// The checkout in progress.
    pub const CHECKOUT: &str = "checkout";

    /// Numbers of the orders placed in this session, oldest first.
    pub const ORDER_HISTORY: &str = "order_history";
}
