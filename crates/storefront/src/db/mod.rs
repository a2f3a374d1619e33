//! Storage for the storefront.
//!
//! Handlers never talk to a database directly: they go through the repository
//! traits below, combined into [`Store`] and held as `Arc<dyn Store>` in the
//! application state. Two implementations exist:
//!
//! - [`MemoryStore`] keeps everything in `RwLock`-guarded maps. Used when no
//!   database URL is configured, and by the tests.
//! - [`PgStore`] persists to `PostgreSQL` (schema `storefront`).
//!
//! # Tables
//!
//! - `category`, `product` - catalog and stock
//! - `customer_order` - orders, lines and customer stored as JSONB
//! - `promo_code`, `payment`, `invoice`
//! - `account` - users with argon2 password hashes
//! - `review`
//! - `tower_sessions.session` - created by `tower-sessions-sqlx-store`
//!
//! # Migrations
//!
//! Migrations are stored in `crates/storefront/migrations/` and run via:
//! ```bash
//! cargo run -p fournil-cli -- migrate
//! ```

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDateTime;
use secrecy::ExposeSecret;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;

use fournil_core::{
    CategoryId, Email, OrderId, OrderStatus, ProductId, PromoCodeId, UserId, UserRole,
};

use crate::models::{
    Category, CategoryInput, Invoice, NewInvoice, NewOrder, NewPayment, NewReview, NewUser,
    Order, OrderFilter, Payment, Product, ProductFilter, ProductInput, PromoCode, PromoCodeInput,
    Review, User,
};

pub mod memory;
pub mod postgres;
pub mod seed;

pub use memory::MemoryStore;
pub use postgres::PgStore;

/// Errors that can occur during repository operations.
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Data in the database is corrupted or invalid.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// Requested entity was not found.
    #[error("not found")]
    NotFound,

    /// Constraint violation (unique code, stock below zero, stale status).
    #[error("conflict: {0}")]
    Conflict(String),

    /// The pickup slot already holds as many orders as it allows.
    #[error("pickup slot {0} is full")]
    SlotFull(NaiveDateTime),
}

/// Categories, products and stock.
#[async_trait]
pub trait CatalogRepository: Send + Sync {
    /// All categories, by rank then name.
    async fn list_categories(&self) -> Result<Vec<Category>, RepositoryError>;

    async fn get_category(&self, id: CategoryId) -> Result<Option<Category>, RepositoryError>;

    async fn get_category_by_slug(&self, slug: &str)
    -> Result<Option<Category>, RepositoryError>;

    /// Returns `Conflict` if the slug is taken.
    async fn create_category(&self, input: &CategoryInput) -> Result<Category, RepositoryError>;

    /// Returns `NotFound` or `Conflict` (slug taken).
    async fn update_category(
        &self,
        id: CategoryId,
        input: &CategoryInput,
    ) -> Result<Category, RepositoryError>;

    /// Products of the category are kept, uncategorized.
    async fn delete_category(&self, id: CategoryId) -> Result<(), RepositoryError>;

    /// Products passing `filter`, by name.
    async fn list_products(&self, filter: &ProductFilter)
    -> Result<Vec<Product>, RepositoryError>;

    async fn get_product(&self, id: ProductId) -> Result<Option<Product>, RepositoryError>;

    async fn create_product(&self, input: &ProductInput) -> Result<Product, RepositoryError>;

    async fn update_product(
        &self,
        id: ProductId,
        input: &ProductInput,
    ) -> Result<Product, RepositoryError>;

    async fn delete_product(&self, id: ProductId) -> Result<(), RepositoryError>;

    /// Add `delta` (possibly negative) to the stock, atomically.
    ///
    /// Returns `Conflict` if the stock would go below zero, `NotFound` if the
    /// product does not exist.
    async fn adjust_stock(&self, id: ProductId, delta: i32) -> Result<Product, RepositoryError>;
}

/// Orders.
#[async_trait]
pub trait OrderRepository: Send + Sync {
    /// Insert an order in `pending_payment`.
    ///
    /// Fails with `SlotFull` when `order.slot_capacity` non-cancelled orders
    /// already pick up at `order.pickup_at`, and with `Conflict` on a taken
    /// order number. The capacity check and the insert are atomic.
    async fn create_order(&self, order: &NewOrder) -> Result<Order, RepositoryError>;

    async fn get_order(&self, id: OrderId) -> Result<Option<Order>, RepositoryError>;

    async fn get_order_by_number(&self, number: &str) -> Result<Option<Order>, RepositoryError>;

    /// Orders passing `filter`, newest first.
    async fn list_orders(&self, filter: &OrderFilter) -> Result<Vec<Order>, RepositoryError>;

    /// Move an order from `from` to `to`.
    ///
    /// Returns `Conflict` if the order is no longer in `from`.
    async fn transition_order_status(
        &self,
        id: OrderId,
        from: OrderStatus,
        to: OrderStatus,
    ) -> Result<Order, RepositoryError>;

    /// Non-cancelled orders per pickup start in `[from, to)`.
    async fn count_booked_slots(
        &self,
        from: NaiveDateTime,
        to: NaiveDateTime,
    ) -> Result<HashMap<NaiveDateTime, u32>, RepositoryError>;
}

/// Promo codes.
#[async_trait]
pub trait PromoRepository: Send + Sync {
    async fn list_promo_codes(&self) -> Result<Vec<PromoCode>, RepositoryError>;

    /// Case-insensitive lookup.
    async fn get_promo_code_by_code(&self, code: &str)
    -> Result<Option<PromoCode>, RepositoryError>;

    /// Returns `Conflict` if the code exists.
    async fn create_promo_code(&self, input: &PromoCodeInput)
    -> Result<PromoCode, RepositoryError>;

    async fn set_promo_code_active(
        &self,
        id: PromoCodeId,
        active: bool,
    ) -> Result<PromoCode, RepositoryError>;

    /// Count one use. Returns `Conflict` if the usage cap is already reached.
    /// The check and the increment are atomic.
    async fn record_promo_use(&self, code: &str) -> Result<PromoCode, RepositoryError>;

    /// Give back one use, never going below zero.
    async fn release_promo_use(&self, code: &str) -> Result<(), RepositoryError>;
}

/// Payments and invoices.
#[async_trait]
pub trait PaymentRepository: Send + Sync {
    async fn create_payment(&self, payment: &NewPayment) -> Result<Payment, RepositoryError>;

    /// Oldest first.
    async fn list_payments_for_order(
        &self,
        order_id: OrderId,
    ) -> Result<Vec<Payment>, RepositoryError>;

    /// Issue the invoice of an order from its stored lines, customer and totals.
    ///
    /// Returns `NotFound` if the order does not exist, `Conflict` if it
    /// already has an invoice.
    async fn create_invoice(&self, invoice: &NewInvoice) -> Result<Invoice, RepositoryError>;

    async fn get_invoice_for_order(
        &self,
        order_id: OrderId,
    ) -> Result<Option<Invoice>, RepositoryError>;
}

/// Accounts.
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Returns `Conflict` if the email (case-insensitive) is taken.
    async fn create_user(&self, user: &NewUser) -> Result<User, RepositoryError>;

    async fn get_user(&self, id: UserId) -> Result<Option<User>, RepositoryError>;

    /// The user and their password hash.
    async fn get_user_by_email(
        &self,
        email: &Email,
    ) -> Result<Option<(User, String)>, RepositoryError>;

    async fn set_user_role(&self, id: UserId, role: UserRole) -> Result<User, RepositoryError>;
}

/// Product reviews.
#[async_trait]
pub trait ReviewRepository: Send + Sync {
    async fn create_review(&self, review: &NewReview) -> Result<Review, RepositoryError>;

    /// Reviews of one product, or all reviews, newest first.
    async fn list_reviews(
        &self,
        product_id: Option<ProductId>,
    ) -> Result<Vec<Review>, RepositoryError>;
}

/// Everything the storefront persists.
#[async_trait]
pub trait Store:
    CatalogRepository
    + OrderRepository
    + PromoRepository
    + PaymentRepository
    + UserRepository
    + ReviewRepository
{
    /// Check that the backend is reachable.
    async fn ping(&self) -> Result<(), RepositoryError>;
}

/// Create a `PostgreSQL` connection pool with sensible defaults.
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_url: &secrecy::SecretString) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}
