//! Admin user management commands.
//!
//! # Usage
//!
//! ```bash
//! fournil-cli admin create -e chef@fournil.fr -n "Chef" -p "mot-de-passe"
//! ```
//!
//! An account that already exists with that email is promoted to admin and
//! keeps its password.

use fournil_storefront::db::PgStore;
use fournil_storefront::services::auth::AuthService;

use super::{CommandError, connect};

/// Create a new admin user, or promote the existing account.
///
/// # Errors
///
/// Returns an error for an invalid email, name or password, or if the
/// database operations fail.
pub async fn create_user(email: &str, name: &str, password: &str) -> Result<(), CommandError> {
    let store = PgStore::new(connect().await?);

    let (user, created) = AuthService::new(&store)
        .ensure_admin(email, name, password)
        .await?;

    if created {
        tracing::info!(user_id = %user.id, "Created admin user {}", user.email);
    } else {
        tracing::info!(user_id = %user.id, "Promoted {} to admin", user.email);
    }
    Ok(())
}
