//! Seed the catalog from YAML.
//!
//! The file is parsed and validated before connecting to the database; every
//! problem is listed. Rows that already exist (same category slug, product
//! name or promo code) are skipped, so seeding twice is harmless.

use std::path::Path;

use tracing::{error, info};

use fournil_storefront::db::PgStore;
use fournil_storefront::db::seed::{SeedData, SeedError};

use super::{CommandError, connect};

/// Seed from `file`, or from the bundled demo catalog when `demo` is set.
///
/// # Errors
///
/// Returns an error if the file cannot be read or parsed, fails validation,
/// or the database operations fail.
pub async fn run(file: Option<&Path>, demo: bool) -> Result<(), CommandError> {
    let data = match file {
        Some(path) if !demo => {
            info!(path = %path.display(), "Loading seed file");
            let content = tokio::fs::read_to_string(path)
                .await
                .map_err(|e| CommandError::Read(path.display().to_string(), e))?;
            SeedData::from_yaml(&content)?
        }
        _ => {
            info!("Loading demo catalog");
            SeedData::demo()?
        }
    };

    // Validate before touching the database
    let errors = data.validate();
    if !errors.is_empty() {
        error!("Seed validation failed:");
        for err in &errors {
            error!("  - {err}");
        }
        return Err(SeedError::Invalid(errors).into());
    }

    let store = PgStore::new(connect().await?);
    let result = data.apply(&store).await?;

    info!("Seeding complete!");
    info!("  Rows inserted: {}", result.inserted);
    info!("  Rows skipped (already exist): {}", result.skipped);
    Ok(())
}
