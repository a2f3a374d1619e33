//! Authentication service.
//!
//! Email and password accounts, hashed with Argon2id.

mod error;

pub use error::AuthError;

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use tracing::instrument;

use fournil_core::{Email, UserId, UserRole};

use crate::db::{RepositoryError, Store};
use crate::models::{NewUser, User, required_text};

/// Minimum password length.
const MIN_PASSWORD_LENGTH: usize = 8;

/// Authentication service.
///
/// Handles registration, login and role changes.
pub struct AuthService<'a> {
    store: &'a dyn Store,
}

impl<'a> AuthService<'a> {
    /// Create a new authentication service.
    #[must_use]
    pub const fn new(store: &'a dyn Store) -> Self {
        Self { store }
    }

    /// Register a new user with email and password.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidEmail` if the email format is invalid.
    /// Returns `AuthError::InvalidName` if the name is blank.
    /// Returns `AuthError::WeakPassword` if the password doesn't meet requirements.
    /// Returns `AuthError::UserAlreadyExists` if the email is already registered.
    #[instrument(skip(self, password))]
    pub async fn register(
        &self,
        email: &str,
        name: &str,
        password: &str,
        role: UserRole,
    ) -> Result<User, AuthError> {
        let email = Email::parse(email)?;
        let name =
            required_text("name", name, 80).map_err(|e| AuthError::InvalidName(e.message))?;
        validate_password(password)?;
        let password_hash = hash_password(password)?;

        self.store
            .create_user(&NewUser {
                email,
                name,
                role,
                password_hash,
            })
            .await
            .map_err(|e| match e {
                RepositoryError::Conflict(_) => AuthError::UserAlreadyExists,
                other => AuthError::Repository(other),
            })
    }

    /// Login with email and password.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidCredentials` if the email/password is wrong.
    #[instrument(skip(self, password))]
    pub async fn login(&self, email: &str, password: &str) -> Result<User, AuthError> {
        let email = Email::parse(email)?;

        let (user, password_hash) = self
            .store
            .get_user_by_email(&email)
            .await?
            .ok_or(AuthError::InvalidCredentials)?;

        verify_password(password, &password_hash)?;

        Ok(user)
    }

    /// Get a user by ID.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::UserNotFound` if the user doesn't exist.
    pub async fn get_user(&self, user_id: UserId) -> Result<User, AuthError> {
        self.store
            .get_user(user_id)
            .await?
            .ok_or(AuthError::UserNotFound)
    }

    /// Create an admin, or promote the existing account with that email.
    ///
    /// Returns the user and whether it was newly created.
    ///
    /// # Errors
    ///
    /// Same as [`AuthService::register`]; the password is ignored when the
    /// account already exists.
    pub async fn ensure_admin(
        &self,
        email: &str,
        name: &str,
        password: &str,
    ) -> Result<(User, bool), AuthError> {
        let parsed = Email::parse(email)?;
        if let Some((user, _)) = self.store.get_user_by_email(&parsed).await? {
            let user = self.store.set_user_role(user.id, UserRole::Admin).await?;
            return Ok((user, false));
        }
        let user = self.register(email, name, password, UserRole::Admin).await?;
        Ok((user, true))
    }
}

/// Validate password meets requirements.
fn validate_password(password: &str) -> Result<(), AuthError> {
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(AuthError::WeakPassword(format!(
            "password must be at least {MIN_PASSWORD_LENGTH} characters"
        )));
    }

    Ok(())
}

/// Hash a password using Argon2id.
fn hash_password(password: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();

    argon2
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|_| AuthError::PasswordHash)
}

/// Verify a password against a hash.
fn verify_password(password: &str, hash: &str) -> Result<(), AuthError> {
    let parsed_hash = PasswordHash::new(hash).map_err(|_| AuthError::InvalidCredentials)?;
    let argon2 = Argon2::default();

    argon2
        .verify_password(password.as_bytes(), &parsed_hash)
        .map_err(|_| AuthError::InvalidCredentials)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::db::MemoryStore;

    #[tokio::test]
    async fn test_register_then_login() {
        let store = MemoryStore::new();
        let auth = AuthService::new(&store);

        let user = auth
            .register("lea@example.fr", "Léa", "croissant42", UserRole::Customer)
            .await
            .unwrap();
        assert_eq!(user.role, UserRole::Customer);

        let logged_in = auth.login("LEA@example.fr", "croissant42").await.unwrap();
        assert_eq!(logged_in.id, user.id);

        assert!(matches!(
            auth.login("lea@example.fr", "wrong-password").await,
            Err(AuthError::InvalidCredentials)
        ));
        assert!(matches!(
            auth.login("nobody@example.fr", "croissant42").await,
            Err(AuthError::InvalidCredentials)
        ));
    }

    #[tokio::test]
    async fn test_register_rejects_weak_password_and_duplicates() {
        let store = MemoryStore::new();
        let auth = AuthService::new(&store);

        assert!(matches!(
            auth.register("lea@example.fr", "Léa", "short", UserRole::Customer)
                .await,
            Err(AuthError::WeakPassword(_))
        ));
        auth.register("lea@example.fr", "Léa", "croissant42", UserRole::Customer)
            .await
            .unwrap();
        assert!(matches!(
            auth.register("lea@example.fr", "Léa", "croissant42", UserRole::Customer)
                .await,
            Err(AuthError::UserAlreadyExists)
        ));
    }

    #[tokio::test]
    async fn test_ensure_admin_promotes_existing() {
        let store = MemoryStore::new();
        let auth = AuthService::new(&store);
        let user = auth
            .register("chef@example.fr", "Chef", "baguette42", UserRole::Customer)
            .await
            .unwrap();

        let (admin, created) = auth
            .ensure_admin("chef@example.fr", "Chef", "ignored-password")
            .await
            .unwrap();
        assert!(!created);
        assert_eq!(admin.id, user.id);
        assert_eq!(admin.role, UserRole::Admin);
    }

    #[test]
    fn test_password_hash_roundtrip() {
        let hash = hash_password("pain-au-levain").unwrap();
        assert!(verify_password("pain-au-levain", &hash).is_ok());
        assert!(verify_password("pain-de-mie", &hash).is_err());
    }
}
