//! HTTP route handlers for the storefront API.
//!
//! # Route Structure
//!
//! ```text
//! GET  /health                          - Liveness
//! GET  /health/ready                    - Store reachable
//!
//! # Catalog
//! GET  /api/categories                  - Category list
//! GET  /api/categories/{slug}           - Category with its products
//! GET  /api/products                    - ?category=&q=&available=
//! GET  /api/products/{id}               - Product detail
//! GET  /api/products/{id}/reviews       - Reviews, newest first
//! POST /api/products/{id}/reviews       - Post a review (auth)
//!
//! # Cart (session)
//! GET|DELETE /api/cart                  - Current cart / clear
//! POST /api/cart/items                  - Add a product
//! PUT|DELETE /api/cart/items/{id}       - Set quantity / remove
//! POST /api/cart/open, /api/cart/close  - Drawer flag
//!
//! # Checkout (session)
//! POST|GET|DELETE /api/checkout         - Start / show / cancel
//! GET  /api/checkout/slots              - Pickup slots
//! PUT  /api/checkout/slot               - Select a slot
//! PUT  /api/checkout/customer           - Customer information
//! POST /api/checkout/next, /back        - Wizard transitions
//! POST|DELETE /api/checkout/promo       - Apply / remove a promo code
//! POST /api/checkout/pay                - Pay and place the order
//! POST /api/promo-codes/validate        - Check a code against a subtotal
//!
//! # Orders
//! GET  /api/orders                      - History
//! GET  /api/orders/{number}             - Detail
//! GET  /api/orders/{number}/invoice     - Invoice (?format=text)
//!
//! # Accounts (register and login are rate limited)
//! POST /api/auth/register, /login, /logout
//! GET  /api/auth/me
//!
//! # Back-office (admin)
//! /api/admin/categories[/{id}]
//! /api/admin/products[/{id}[/stock]]
//! /api/admin/orders[/{id}[/status]]
//! /api/admin/promo-codes[/{id}]
//! GET  /api/analytics/revenue|top-products|slots|summary|ratings
//! ```

pub mod admin;
pub mod analytics;
pub mod auth;
pub mod cart;
pub mod catalog;
pub mod checkout;
pub mod health;
pub mod orders;
pub mod promo;
pub mod reviews;

use axum::{
    Router,
    routing::{get, patch, post, put},
};

use crate::middleware::auth_rate_limiter;
use crate::state::AppState;

/// Create the health check routes router.
pub fn health_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(health::health))
        .route("/ready", get(health::ready))
}

/// Create the catalog routes router.
pub fn catalog_routes() -> Router<AppState> {
    Router::new()
        .route("/categories", get(catalog::list_categories))
        .route("/categories/{slug}", get(catalog::get_category))
        .route("/products", get(catalog::list_products))
        .route("/products/{id}", get(catalog::get_product))
        .route(
            "/products/{id}/reviews",
            get(reviews::list).post(reviews::create),
        )
}

/// Create the cart routes router.
pub fn cart_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(cart::show).delete(cart::clear))
        .route("/items", post(cart::add))
        .route(
            "/items/{product_id}",
            put(cart::update).delete(cart::remove),
        )
        .route("/open", post(cart::open))
        .route("/close", post(cart::close))
}

/// Create the checkout routes router.
pub fn checkout_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(checkout::show)
                .post(checkout::start)
                .delete(checkout::cancel),
        )
        .route("/slots", get(checkout::slots))
        .route("/slot", put(checkout::select_slot))
        .route("/customer", put(checkout::set_customer))
        .route("/next", post(checkout::next))
        .route("/back", post(checkout::back))
        .route(
            "/promo",
            post(checkout::apply_promo).delete(checkout::remove_promo),
        )
        .route("/pay", post(checkout::pay))
}

/// Create the order history routes router.
pub fn order_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(orders::list))
        .route("/{number}", get(orders::show))
        .route("/{number}/invoice", get(orders::invoice))
}

/// Create the auth routes router.
pub fn auth_routes() -> Router<AppState> {
    let credentials = Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login));
    let credentials = match auth_rate_limiter() {
        Some(limiter) => credentials.layer(limiter),
        None => credentials,
    };

    Router::new()
        .merge(credentials)
        .route("/logout", post(auth::logout))
        .route("/me", get(auth::me))
}

/// Create the back-office routes router.
pub fn admin_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/categories",
            get(admin::list_categories).post(admin::create_category),
        )
        .route(
            "/categories/{id}",
            put(admin::update_category).delete(admin::delete_category),
        )
        .route(
            "/products",
            get(admin::list_products).post(admin::create_product),
        )
        .route(
            "/products/{id}",
            get(admin::get_product)
                .put(admin::update_product)
                .delete(admin::delete_product),
        )
        .route("/products/{id}/stock", post(admin::adjust_stock))
        .route("/orders", get(admin::list_orders))
        .route("/orders/{id}", get(admin::get_order))
        .route("/orders/{id}/status", put(admin::update_order_status))
        .route(
            "/promo-codes",
            get(admin::list_promo_codes).post(admin::create_promo_code),
        )
        .route("/promo-codes/{id}", patch(admin::set_promo_code_active))
}

/// Create the analytics routes router.
pub fn analytics_routes() -> Router<AppState> {
    Router::new()
        .route("/revenue", get(analytics::revenue))
        .route("/top-products", get(analytics::top_products))
        .route("/slots", get(analytics::slots))
        .route("/summary", get(analytics::summary))
        .route("/ratings", get(analytics::ratings))
}

/// Create all routes for the storefront.
pub fn routes() -> Router<AppState> {
    Router::new()
        .nest("/health", health_routes())
        .nest(
            "/api",
            catalog_routes()
                .nest("/cart", cart_routes())
                .nest("/checkout", checkout_routes())
                .route("/promo-codes/validate", post(promo::validate))
                .nest("/orders", order_routes())
                .nest("/auth", auth_routes())
                .nest("/admin", admin_routes())
                .nest("/analytics", analytics_routes()),
        )
}
