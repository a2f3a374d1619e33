//! CLI subcommands.

pub mod admin;
pub mod migrate;
pub mod seed;

use sqlx::PgPool;
use thiserror::Error;

use fournil_storefront::config::{ConfigError, StorefrontConfig};
use fournil_storefront::db::{self, seed::SeedError};
use fournil_storefront::services::auth::AuthError;

/// Errors that can occur while running a command.
#[derive(Debug, Error)]
pub enum CommandError {
    /// Environment could not be loaded.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// No database configured.
    #[error("Missing environment variable: STOREFRONT_DATABASE_URL (or DATABASE_URL)")]
    MissingDatabaseUrl,

    /// Database connection error.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Migration failed.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// Seed file unreadable.
    #[error("Cannot read {0}: {1}")]
    Read(String, std::io::Error),

    /// Seeding failed.
    #[error(transparent)]
    Seed(#[from] SeedError),

    /// Account creation failed.
    #[error(transparent)]
    Auth(#[from] AuthError),
}

/// Connect to the database named by the storefront configuration.
async fn connect() -> Result<PgPool, CommandError> {
    let config = StorefrontConfig::from_env()?;
    let database_url = config
        .database_url
        .ok_or(CommandError::MissingDatabaseUrl)?;

    tracing::info!("Connecting to storefront database...");
    Ok(db::create_pool(&database_url).await?)
}
