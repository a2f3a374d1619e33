//! User domain types.

use chrono::{DateTime, Utc};
use serde::Serialize;

use fournil_core::{Email, UserId, UserRole};

use super::CurrentUser;

/// A storefront account. The password hash is kept by the repository and
/// never leaves it except for verification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct User {
    pub id: UserId,
    pub email: Email,
    pub name: String,
    pub role: UserRole,
    pub created_at: DateTime<Utc>,
}

impl From<&User> for CurrentUser {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            email: user.email.clone(),
            name: user.name.clone(),
            role: user.role,
        }
    }
}

/// Data needed to create an account.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: Email,
    pub name: String,
    pub role: UserRole,
    /// Argon2 PHC string.
    pub password_hash: String,
}
