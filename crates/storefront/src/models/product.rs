//! Catalog types: categories and products.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use fournil_core::{CategoryId, Price, ProductId};

use super::{ValidationError, required_text};

/// A product category (viennoiseries, pains, pâtisseries …).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub id: CategoryId,
    pub name: String,
    /// URL-safe unique identifier.
    pub slug: String,
    /// CSS color used for the category badge.
    pub color: String,
    /// Icon name.
    pub icon: String,
    /// Display order, ascending.
    pub rank: i32,
}

/// Create/update payload for a category.
#[derive(Debug, Clone, Deserialize)]
pub struct CategoryInput {
    pub name: String,
    /// Derived from the name when empty.
    #[serde(default)]
    pub slug: String,
    #[serde(default)]
    pub color: String,
    #[serde(default)]
    pub icon: String,
    #[serde(default)]
    pub rank: i32,
}

impl CategoryInput {
    /// Validate and normalize the payload (trimmed name, slug derived if missing).
    ///
    /// # Errors
    ///
    /// Returns a `ValidationError` if the name is blank or the slug is not
    /// made of lowercase letters, digits and dashes.
    pub fn validate(&self) -> Result<Self, ValidationError> {
        let name = required_text("name", &self.name, 80)?;
        let slug = if self.slug.trim().is_empty() {
            slugify(&name)
        } else {
            self.slug.trim().to_owned()
        };
        if slug.is_empty()
            || !slug
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
        {
            return Err(ValidationError::new(
                "slug",
                "must contain only lowercase letters, digits and dashes",
            ));
        }
        Ok(Self {
            name,
            slug,
            color: self.color.trim().to_owned(),
            icon: self.icon.trim().to_owned(),
            rank: self.rank,
        })
    }
}

/// Build a URL slug from a display name (`Pains spéciaux` → `pains-speciaux`).
#[must_use]
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    for c in name.chars().flat_map(char::to_lowercase) {
        let c = match c {
            'à' | 'â' | 'ä' => 'a',
            'é' | 'è' | 'ê' | 'ë' => 'e',
            'î' | 'ï' => 'i',
            'ô' | 'ö' => 'o',
            'ù' | 'û' | 'ü' => 'u',
            'ç' => 'c',
            other => other,
        };
        if c.is_ascii_alphanumeric() {
            slug.push(c);
        } else if !slug.is_empty() && !slug.ends_with('-') {
            slug.push('-');
        }
    }
    while slug.ends_with('-') {
        slug.pop();
    }
    slug
}

/// A product sold by the bakery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub description: String,
    /// Unit price, tax included.
    pub price: Price,
    /// Image URLs, first one is the cover.
    pub images: Vec<String>,
    pub category_id: Option<CategoryId>,
    /// Units left for sale today.
    pub stock: u32,
    /// Whether the product is listed for sale.
    pub available: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Product {
    /// Cover image, if any.
    #[must_use]
    pub fn cover_image(&self) -> Option<&str> {
        self.images.first().map(String::as_str)
    }

    /// True if `quantity` units can be ordered right now.
    #[must_use]
    pub const fn can_order(&self, quantity: u32) -> bool {
        self.available && quantity <= self.stock
    }
}

/// Create/update payload for a product.
#[derive(Debug, Clone, Deserialize)]
pub struct ProductInput {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub price: Price,
    #[serde(default)]
    pub images: Vec<String>,
    #[serde(default)]
    pub category_id: Option<CategoryId>,
    #[serde(default)]
    pub stock: u32,
    #[serde(default = "default_available")]
    pub available: bool,
}

const fn default_available() -> bool {
    true
}

/// Highest unit price a product may carry. Stored prices are `NUMERIC(10, 2)`.
pub const MAX_PRICE: Price = Price::from_cents(1_000_000);

impl ProductInput {
    /// Validate and normalize the payload.
    ///
    /// # Errors
    ///
    /// Returns a `ValidationError` if the name is blank, the description too
    /// long, or the price negative or above [`MAX_PRICE`].
    pub fn validate(&self) -> Result<Self, ValidationError> {
        let name = required_text("name", &self.name, 120)?;
        if self.description.chars().count() > 2000 {
            return Err(ValidationError::new(
                "description",
                "must be at most 2000 characters",
            ));
        }
        if self.price.is_negative() {
            return Err(ValidationError::new("price", "cannot be negative"));
        }
        if self.price > MAX_PRICE {
            return Err(ValidationError::new(
                "price",
                format!("cannot exceed {}", MAX_PRICE.display()),
            ));
        }
        Ok(Self {
            name,
            description: self.description.trim().to_owned(),
            price: self.price.round(),
            images: self
                .images
                .iter()
                .map(|i| i.trim().to_owned())
                .filter(|i| !i.is_empty())
                .collect(),
            category_id: self.category_id,
            stock: self.stock,
            available: self.available,
        })
    }
}

/// Product listing filter.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct ProductFilter {
    pub category_id: Option<CategoryId>,
    /// Case-insensitive match on name or description.
    pub query: Option<String>,
    /// Only products that are listed and in stock.
    pub available_only: bool,
}

impl ProductFilter {
    /// Whether `product` passes the filter.
    #[must_use]
    pub fn matches(&self, product: &Product) -> bool {
        if let Some(category_id) = self.category_id
            && product.category_id != Some(category_id)
        {
            return false;
        }
        if self.available_only && !(product.available && product.stock > 0) {
            return false;
        }
        match &self.query {
            Some(q) => {
                let q = q.to_lowercase();
                product.name.to_lowercase().contains(&q)
                    || product.description.to_lowercase().contains(&q)
            }
            None => true,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::models::test_support::product;

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("Pains spéciaux"), "pains-speciaux");
        assert_eq!(slugify("  Viennoiseries & Co. "), "viennoiseries-co");
        assert_eq!(slugify("Pâtisserie"), "patisserie");
    }

    #[test]
    fn test_category_input_derives_slug() {
        let input = CategoryInput {
            name: " Pains spéciaux ".to_owned(),
            slug: String::new(),
            color: "#c98b3a".to_owned(),
            icon: "bread".to_owned(),
            rank: 2,
        };
        let valid = input.validate().unwrap();
        assert_eq!(valid.name, "Pains spéciaux");
        assert_eq!(valid.slug, "pains-speciaux");
    }

    #[test]
    fn test_category_input_rejects_bad_slug() {
        let input = CategoryInput {
            name: "Pains".to_owned(),
            slug: "Pains Spéciaux".to_owned(),
            color: String::new(),
            icon: String::new(),
            rank: 0,
        };
        assert_eq!(input.validate().unwrap_err().field, "slug");
    }

    #[test]
    fn test_product_input_rejects_negative_price() {
        let input = ProductInput {
            name: "Baguette".to_owned(),
            description: String::new(),
            price: Price::from_cents(-10),
            images: vec![],
            category_id: None,
            stock: 10,
            available: true,
        };
        assert_eq!(input.validate().unwrap_err().field, "price");
    }

    #[test]
    fn test_product_input_caps_price() {
        let mut input = ProductInput {
            name: "Pièce montée".to_owned(),
            description: String::new(),
            price: Price::new(rust_decimal::Decimal::MAX),
            images: vec![],
            category_id: None,
            stock: 1,
            available: true,
        };
        let err = input.validate().unwrap_err();
        assert_eq!(err.field, "price");
        assert_eq!(err.message, "cannot exceed 10000,00 €");

        input.price = MAX_PRICE;
        assert_eq!(input.validate().unwrap().price, MAX_PRICE);
    }

    #[test]
    fn test_filter_matches() {
        let croissant = product(1, "Croissant au beurre", 120, 5);
        let mut empty = product(2, "Pain au chocolat", 130, 0);
        empty.category_id = Some(CategoryId::new(2));

        let by_query = ProductFilter {
            query: Some("BEURRE".to_owned()),
            ..ProductFilter::default()
        };
        assert!(by_query.matches(&croissant));
        assert!(!by_query.matches(&empty));

        let available = ProductFilter {
            available_only: true,
            ..ProductFilter::default()
        };
        assert!(available.matches(&croissant));
        assert!(!available.matches(&empty));

        let by_category = ProductFilter {
            category_id: Some(CategoryId::new(2)),
            ..ProductFilter::default()
        };
        assert!(by_category.matches(&empty));
        assert!(!by_category.matches(&croissant));
    }

    #[test]
    fn test_can_order() {
        let mut p = product(1, "Baguette", 110, 3);
        assert!(p.can_order(3));
        assert!(!p.can_order(4));
        p.available = false;
        assert!(!p.can_order(1));
    }
}
