//! Seed the catalog and promo codes from YAML.
//!
//! ## YAML Format
//!
//! ```yaml
//! categories:
//!   - name: Viennoiseries
//!     slug: viennoiseries
//!     color: "#e0a84f"
//!     icon: croissant
//!     rank: 1
//!
//! products:
//!   - name: Croissant au beurre
//!     category: viennoiseries
//!     price: "1.20"
//!     stock: 60
//!
//! promo_codes:
//!   - code: BIENVENUE10
//!     kind: percent
//!     value: "10"
//!     minimum_amount: "15.00"
//! ```
//!
//! Seeding is idempotent: categories are matched by slug, products by name,
//! promo codes by code, and existing rows are left untouched.

use serde::Deserialize;
use tracing::{debug, info, instrument};

use fournil_core::Price;

use super::{RepositoryError, Store};
use crate::models::{CategoryInput, ProductFilter, ProductInput, PromoCodeInput};

/// The demo catalog shipped with the storefront.
pub const DEMO_CATALOG: &str = include_str!("../../seed/catalog.yaml");

/// A product entry, referencing its category by slug.
#[derive(Debug, Deserialize)]
pub struct SeedProduct {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub price: Price,
    #[serde(default)]
    pub images: Vec<String>,
    /// Category slug.
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub stock: u32,
    #[serde(default = "default_available")]
    pub available: bool,
}

const fn default_available() -> bool {
    true
}

/// Full seed file.
#[derive(Debug, Default, Deserialize)]
pub struct SeedData {
    #[serde(default)]
    pub categories: Vec<CategoryInput>,
    #[serde(default)]
    pub products: Vec<SeedProduct>,
    #[serde(default)]
    pub promo_codes: Vec<PromoCodeInput>,
}

/// Counts of what a seeding run did.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SeedResult {
    pub inserted: u64,
    pub skipped: u64,
}

/// Errors while seeding.
#[derive(Debug, thiserror::Error)]
pub enum SeedError {
    #[error("failed to parse YAML: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("{} validation errors: {}", .0.len(), .0.join("; "))]
    Invalid(Vec<String>),

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl SeedData {
    /// Parse a seed file.
    ///
    /// # Errors
    ///
    /// Returns `SeedError::Parse` for malformed YAML.
    pub fn from_yaml(content: &str) -> Result<Self, SeedError> {
        Ok(serde_yaml::from_str(content)?)
    }

    /// The demo catalog.
    ///
    /// # Errors
    ///
    /// Returns `SeedError::Parse` if the bundled file is malformed.
    pub fn demo() -> Result<Self, SeedError> {
        Self::from_yaml(DEMO_CATALOG)
    }

    /// List every problem in the file; empty when valid.
    #[must_use]
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        let mut slugs = Vec::new();
        for (i, category) in self.categories.iter().enumerate() {
            match category.validate() {
                Ok(valid) => {
                    if slugs.contains(&valid.slug) {
                        errors.push(format!("categories[{i}]: duplicate slug {}", valid.slug));
                    }
                    slugs.push(valid.slug);
                }
                Err(e) => errors.push(format!("categories[{i}]: {e}")),
            }
        }
        for (i, product) in self.products.iter().enumerate() {
            if let Err(e) = product.to_input(None).validate() {
                errors.push(format!("products[{i}]: {e}"));
            }
            if let Some(slug) = &product.category
                && !slugs.contains(slug)
            {
                errors.push(format!("products[{i}]: unknown category {slug}"));
            }
        }
        for (i, promo) in self.promo_codes.iter().enumerate() {
            if let Err(e) = promo.validate() {
                errors.push(format!("promo_codes[{i}]: {e}"));
            }
        }
        errors
    }

    /// Insert whatever is missing into `store`.
    ///
    /// # Errors
    ///
    /// Returns `SeedError::Invalid` if validation fails (nothing is written),
    /// or a repository error.
    #[instrument(skip_all, fields(
        categories = self.categories.len(),
        products = self.products.len(),
        promo_codes = self.promo_codes.len(),
    ))]
    pub async fn apply(&self, store: &dyn Store) -> Result<SeedResult, SeedError> {
        let errors = self.validate();
        if !errors.is_empty() {
            return Err(SeedError::Invalid(errors));
        }

        let mut result = SeedResult::default();

        for category in &self.categories {
            let category = category
                .validate()
                .map_err(|e| SeedError::Invalid(vec![e.to_string()]))?;
            if store.get_category_by_slug(&category.slug).await?.is_some() {
                debug!(slug = %category.slug, "Category exists, skipping");
                result.skipped += 1;
                continue;
            }
            store.create_category(&category).await?;
            result.inserted += 1;
        }

        let existing = store.list_products(&ProductFilter::default()).await?;
        for product in &self.products {
            if existing.iter().any(|p| p.name == product.name.trim()) {
                debug!(name = %product.name, "Product exists, skipping");
                result.skipped += 1;
                continue;
            }
            let category_id = match &product.category {
                Some(slug) => store.get_category_by_slug(slug).await?.map(|c| c.id),
                None => None,
            };
            let input = product
                .to_input(category_id)
                .validate()
                .map_err(|e| SeedError::Invalid(vec![e.to_string()]))?;
            store.create_product(&input).await?;
            result.inserted += 1;
        }

        for promo in &self.promo_codes {
            let promo = promo
                .validate()
                .map_err(|e| SeedError::Invalid(vec![e.to_string()]))?;
            if store.get_promo_code_by_code(&promo.code).await?.is_some() {
                debug!(code = %promo.code, "Promo code exists, skipping");
                result.skipped += 1;
                continue;
            }
            store.create_promo_code(&promo).await?;
            result.inserted += 1;
        }

        info!(
            inserted = result.inserted,
            skipped = result.skipped,
            "Seeding complete"
        );
        Ok(result)
    }
}

impl SeedProduct {
    fn to_input(&self, category_id: Option<fournil_core::CategoryId>) -> ProductInput {
        ProductInput {
            name: self.name.clone(),
            description: self.description.clone(),
            price: self.price,
            images: self.images.clone(),
            category_id,
            stock: self.stock,
            available: self.available,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::db::CatalogRepository;
    use crate::db::MemoryStore;

    #[test]
    fn test_demo_catalog_is_valid() {
        let demo = SeedData::demo().unwrap();
        assert_eq!(demo.validate(), Vec::<String>::new());
        let codes: Vec<&str> = demo.promo_codes.iter().map(|p| p.code.as_str()).collect();
        assert!(codes.contains(&"BIENVENUE10"));
        assert!(codes.contains(&"FIDELITE5"));
        assert!(codes.contains(&"GOURMAND20"));
    }

    #[test]
    fn test_validate_lists_all_errors() {
        let data = SeedData::from_yaml(
            r#"
categories:
  - name: ""
products:
  - name: Baguette
    category: pains
    price: "-1"
promo_codes:
  - code: "!!"
    kind: fixed
    value: "5"
"#,
        )
        .unwrap();
        let errors = data.validate();
        assert_eq!(errors.len(), 4, "{errors:?}");
    }

    #[tokio::test]
    async fn test_apply_is_idempotent() {
        let store = MemoryStore::new();
        let demo = SeedData::demo().unwrap();

        let first = demo.apply(&store).await.unwrap();
        assert!(first.inserted > 0);
        assert_eq!(first.skipped, 0);

        let second = demo.apply(&store).await.unwrap();
        assert_eq!(second.inserted, 0);
        assert_eq!(second.skipped, first.inserted);

        let products = store.list_products(&ProductFilter::default()).await.unwrap();
        assert!(products.iter().all(|p| p.category_id.is_some()));
    }
}
