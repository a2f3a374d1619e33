//! Shopping cart state.
//!
//! The cart lives in the visitor's session. Every operation is a pure,
//! synchronous transition on [`Cart`]; handlers persist the result after each
//! mutation.

use serde::{Deserialize, Serialize};

use fournil_core::{Price, ProductId};

use super::Product;

/// Errors from cart transitions that check the catalog.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CartError {
    /// Quantity must be at least one.
    #[error("quantity must be at least 1")]
    InvalidQuantity,
    /// Product is not listed for sale.
    #[error("{0} is not available")]
    Unavailable(String),
    /// Not enough units left.
    #[error("only {available} left for {name}")]
    InsufficientStock {
        /// Product name.
        name: String,
        /// Units left.
        available: u32,
    },
    /// Product is not in the cart.
    #[error("product {0} is not in the cart")]
    NotInCart(ProductId),
}

/// A cart line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartItem {
    pub product_id: ProductId,
    pub name: String,
    /// Price when the product was added.
    pub unit_price: Price,
    pub quantity: u32,
    pub image: Option<String>,
}

impl CartItem {
    /// Line subtotal (quantity × unit price).
    #[must_use]
    pub fn subtotal(&self) -> Price {
        self.unit_price.times(self.quantity)
    }
}

/// The visitor's cart, with the drawer UI flag.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cart {
    pub items: Vec<CartItem>,
    /// Whether the cart drawer is open.
    #[serde(default)]
    pub is_open: bool,
}

impl Cart {
    /// Add `quantity` units of `product`, merging with an existing line.
    ///
    /// A quantity of zero is a no-op.
    pub fn add(&mut self, product: &Product, quantity: u32) {
        if quantity == 0 {
            return;
        }
        if let Some(item) = self.item_mut(product.id) {
            item.quantity = item.quantity.saturating_add(quantity);
            return;
        }
        self.items.push(CartItem {
            product_id: product.id,
            name: product.name.clone(),
            unit_price: product.price,
            quantity,
            image: product.cover_image().map(str::to_owned),
        });
    }

    /// Add after checking availability and stock against `product`.
    ///
    /// # Errors
    ///
    /// Returns `CartError` if the quantity is zero, the product is not
    /// available, or the cart would hold more units than are in stock.
    pub fn add_checked(&mut self, product: &Product, quantity: u32) -> Result<(), CartError> {
        if quantity == 0 {
            return Err(CartError::InvalidQuantity);
        }
        if !product.available {
            return Err(CartError::Unavailable(product.name.clone()));
        }
        let wanted = self.quantity_of(product.id).saturating_add(quantity);
        if !product.can_order(wanted) {
            return Err(CartError::InsufficientStock {
                name: product.name.clone(),
                available: product.stock,
            });
        }
        self.add(product, quantity);
        Ok(())
    }

    /// Remove the line for `product_id`. Returns whether a line was removed.
    pub fn remove(&mut self, product_id: ProductId) -> bool {
        let before = self.items.len();
        self.items.retain(|item| item.product_id != product_id);
        self.items.len() != before
    }

    /// Set the quantity of a line; zero or less removes it.
    ///
    /// Returns whether the cart contained the product.
    pub fn set_quantity(&mut self, product_id: ProductId, quantity: i64) -> bool {
        if quantity <= 0 {
            return self.remove(product_id);
        }
        let quantity = u32::try_from(quantity).unwrap_or(u32::MAX);
        self.item_mut(product_id).is_some_and(|item| {
            item.quantity = quantity;
            true
        })
    }

    /// Set a quantity after checking stock against `product`.
    ///
    /// # Errors
    ///
    /// Returns `CartError::NotInCart` if the product has no line, or
    /// `CartError::InsufficientStock` if the new quantity exceeds stock.
    pub fn set_quantity_checked(&mut self, product: &Product, quantity: i64) -> Result<(), CartError> {
        if self.quantity_of(product.id) == 0 {
            return Err(CartError::NotInCart(product.id));
        }
        if quantity > 0 {
            let wanted = u32::try_from(quantity).unwrap_or(u32::MAX);
            if !product.can_order(wanted) {
                return Err(CartError::InsufficientStock {
                    name: product.name.clone(),
                    available: product.stock,
                });
            }
        }
        self.set_quantity(product.id, quantity);
        Ok(())
    }

    /// Empty the cart.
    pub fn clear(&mut self) {
        self.items.clear();
    }

    /// Open the drawer.
    pub const fn open(&mut self) {
        self.is_open = true;
    }

    /// Close the drawer.
    pub const fn close(&mut self) {
        self.is_open = false;
    }

    /// Sum of line subtotals.
    #[must_use]
    pub fn total(&self) -> Price {
        self.items.iter().map(CartItem::subtotal).sum()
    }

    /// Number of units across all lines.
    #[must_use]
    pub fn total_items(&self) -> u32 {
        self.items
            .iter()
            .fold(0_u32, |acc, item| acc.saturating_add(item.quantity))
    }

    /// Units of `product_id` in the cart.
    #[must_use]
    pub fn quantity_of(&self, product_id: ProductId) -> u32 {
        self.items
            .iter()
            .find(|item| item.product_id == product_id)
            .map_or(0, |item| item.quantity)
    }

    /// True if the cart has no lines.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    fn item_mut(&mut self, product_id: ProductId) -> Option<&mut CartItem> {
        self.items
            .iter_mut()
            .find(|item| item.product_id == product_id)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::models::test_support::product;

    #[test]
    fn test_add_same_product_twice_merges() {
        let p = product(1, "Chausson aux pommes", 450, 10);
        let mut cart = Cart::default();
        cart.add(&p, 1);
        cart.add(&p, 1);

        assert_eq!(cart.items.len(), 1);
        assert_eq!(cart.total(), Price::from_cents(900));
        assert_eq!(cart.total_items(), 2);
    }

    #[test]
    fn test_add_distinct_products() {
        let mut cart = Cart::default();
        cart.add(&product(1, "Baguette", 110, 10), 3);
        cart.add(&product(2, "Croissant", 120, 10), 2);
        assert_eq!(cart.total(), Price::from_cents(570));
        assert_eq!(cart.total_items(), 5);
    }

    #[test]
    fn test_set_quantity_zero_removes() {
        let p = product(1, "Baguette", 110, 10);
        let mut cart = Cart::default();
        cart.add(&p, 2);
        assert!(cart.set_quantity(p.id, 5));
        assert_eq!(cart.quantity_of(p.id), 5);
        assert!(cart.set_quantity(p.id, 0));
        assert!(cart.is_empty());
        assert!(!cart.set_quantity(p.id, -1));
    }

    #[test]
    fn test_remove_and_clear() {
        let mut cart = Cart::default();
        cart.add(&product(1, "Baguette", 110, 10), 1);
        cart.add(&product(2, "Croissant", 120, 10), 1);
        assert!(cart.remove(ProductId::new(1)));
        assert!(!cart.remove(ProductId::new(1)));
        assert_eq!(cart.total_items(), 1);
        cart.clear();
        assert_eq!(cart.total(), Price::ZERO);
    }

    #[test]
    fn test_drawer() {
        let mut cart = Cart::default();
        cart.open();
        assert!(cart.is_open);
        cart.close();
        assert!(!cart.is_open);
    }

    #[test]
    fn test_add_checked_respects_stock() {
        let p = product(1, "Tarte au citron", 2800, 2);
        let mut cart = Cart::default();
        cart.add_checked(&p, 2).unwrap();
        assert_eq!(
            cart.add_checked(&p, 1),
            Err(CartError::InsufficientStock {
                name: "Tarte au citron".to_owned(),
                available: 2
            })
        );
        assert_eq!(cart.add_checked(&p, 0), Err(CartError::InvalidQuantity));
    }

    #[test]
    fn test_add_checked_rejects_unavailable() {
        let mut p = product(1, "Galette des rois", 2200, 5);
        p.available = false;
        let mut cart = Cart::default();
        assert!(matches!(
            cart.add_checked(&p, 1),
            Err(CartError::Unavailable(_))
        ));
    }

    #[test]
    fn test_set_quantity_checked() {
        let p = product(1, "Baguette", 110, 4);
        let mut cart = Cart::default();
        assert_eq!(
            cart.set_quantity_checked(&p, 2),
            Err(CartError::NotInCart(p.id))
        );
        cart.add(&p, 1);
        cart.set_quantity_checked(&p, 4).unwrap();
        assert!(cart.set_quantity_checked(&p, 5).is_err());
        cart.set_quantity_checked(&p, 0).unwrap();
        assert!(cart.is_empty());
    }

    #[test]
    fn test_malformed_json_is_an_error() {
        let parsed: Result<Cart, _> = serde_json::from_str("{\"items\": 3}");
        assert!(parsed.is_err());
    }
}
