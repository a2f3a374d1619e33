//! Business logic services for the storefront.
//!
//! # Services
//!
//! - `analytics` - Revenue, best sellers, slot usage and rating reports
//! - `auth` - Email and password accounts (argon2)
//! - `catalog` - Cached catalog reads (moka)
//! - `checkout` - Order placement, payment and invoicing at the end of checkout
//! - `orders` - Order status lifecycle and stock bookkeeping
//! - `payment` - Payment simulator
//! - `pricing` - Totals and VAT
//! - `promo` - Promo code lookup
//! - `slots` - Pickup slot generation and availability

pub mod analytics;
pub mod auth;
pub mod catalog;
pub mod checkout;
pub mod orders;
pub mod payment;
pub mod pricing;
pub mod promo;
pub mod slots;
