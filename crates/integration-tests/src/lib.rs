//! Integration tests for Fournil.
//!
//! Each test spawns the full storefront router on `127.0.0.1:0` over a fresh
//! in-memory store seeded with the demo catalog, then drives it over HTTP
//! with a cookie-aware `reqwest` client (one client = one visitor session).
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p fournil-integration-tests
//! ```

#![allow(
    clippy::unwrap_used,
    clippy::missing_panics_doc,
    clippy::indexing_slicing
)]

use std::net::SocketAddr;
use std::sync::Arc;

use reqwest::{Client, Response, StatusCode};
use serde_json::{Value, json};

use fournil_storefront::build_router;
use fournil_storefront::config::StorefrontConfig;
use fournil_storefront::db::MemoryStore;
use fournil_storefront::db::seed::SeedData;
use fournil_storefront::middleware::create_session_layer;
use fournil_storefront::services::auth::AuthService;
use fournil_storefront::state::AppState;

/// Admin created by [`TestApp::login_admin`].
pub const ADMIN_EMAIL: &str = "chef@fournil.fr";
pub const ADMIN_PASSWORD: &str = "levain-2026";

/// A card the payment simulator accepts.
pub const GOOD_CARD: &str = "4242 4242 4242 4242";
/// A card the payment simulator always declines.
pub const DECLINED_CARD: &str = "4000000000000002";

/// A running storefront.
pub struct TestApp {
    pub base_url: String,
    pub store: Arc<MemoryStore>,
}

impl TestApp {
    /// Spawn the storefront with no payment delay and every weekday open.
    pub async fn spawn() -> Self {
        let config = StorefrontConfig::from_lookup(|key| match key {
            "PAYMENT_DELAY_MS" => Some("0".to_owned()),
            "SLOT_CLOSED_DAYS" => Some("none".to_owned()),
            _ => None,
        })
        .unwrap();

        let store = Arc::new(MemoryStore::new());
        SeedData::demo()
            .unwrap()
            .apply(store.as_ref())
            .await
            .unwrap();

        let session_layer = create_session_layer(tower_sessions::MemoryStore::default(), &config);
        let state = AppState::new(config, store.clone());
        let app = build_router(state, session_layer);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(
                listener,
                app.into_make_service_with_connect_info::<SocketAddr>(),
            )
            .await
            .unwrap();
        });

        Self {
            base_url: format!("http://{addr}"),
            store,
        }
    }

    /// A new visitor, with its own session cookie.
    #[must_use]
    pub fn visitor(&self) -> Visitor {
        Visitor {
            base_url: self.base_url.clone(),
            client: Client::builder().cookie_store(true).build().unwrap(),
        }
    }

    /// A visitor logged in as an admin.
    pub async fn login_admin(&self) -> Visitor {
        AuthService::new(self.store.as_ref())
            .ensure_admin(ADMIN_EMAIL, "Chef", ADMIN_PASSWORD)
            .await
            .unwrap();
        let admin = self.visitor();
        let resp = admin
            .post(
                "/api/auth/login",
                &json!({ "email": ADMIN_EMAIL, "password": ADMIN_PASSWORD }),
            )
            .await;
        assert_eq!(resp.status(), StatusCode::OK);
        admin
    }
}

/// One browser session against a [`TestApp`].
pub struct Visitor {
    base_url: String,
    pub client: Client,
}

impl Visitor {
    #[must_use]
    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    pub async fn get(&self, path: &str) -> Response {
        self.client.get(self.url(path)).send().await.unwrap()
    }

    pub async fn post(&self, path: &str, body: &Value) -> Response {
        self.client
            .post(self.url(path))
            .json(body)
            .send()
            .await
            .unwrap()
    }

    pub async fn put(&self, path: &str, body: &Value) -> Response {
        self.client
            .put(self.url(path))
            .json(body)
            .send()
            .await
            .unwrap()
    }

    pub async fn delete(&self, path: &str) -> Response {
        self.client.delete(self.url(path)).send().await.unwrap()
    }

    /// GET and parse JSON, asserting a 200.
    pub async fn get_json(&self, path: &str) -> Value {
        let resp = self.get(path).await;
        assert_eq!(resp.status(), StatusCode::OK, "GET {path}");
        resp.json().await.unwrap()
    }

    /// Id of the first product whose name matches `query`.
    pub async fn product_id(&self, query: &str) -> i64 {
        let products = self.get_json(&format!("/api/products?q={query}")).await;
        products[0]["id"].as_i64().unwrap()
    }

    /// Add `quantity` units of the product matching `query` to the cart.
    pub async fn add_to_cart(&self, query: &str, quantity: u32) -> Value {
        let id = self.product_id(query).await;
        let resp = self
            .post(
                "/api/cart/items",
                &json!({ "product_id": id, "quantity": quantity }),
            )
            .await;
        assert_eq!(resp.status(), StatusCode::OK);
        resp.json().await.unwrap()
    }

    /// Start a checkout and walk it to the payment step.
    ///
    /// Picks the first available slot and applies `promo` at the recap.
    pub async fn checkout_to_payment(&self, promo: Option<&str>) -> Value {
        let resp = self.post("/api/checkout", &json!({})).await;
        assert_eq!(resp.status(), StatusCode::CREATED);

        let slots = self.get_json("/api/checkout/slots").await;
        let slot = slots
            .as_array()
            .unwrap()
            .iter()
            .find(|s| s["available"] == true)
            .unwrap();
        let resp = self
            .put("/api/checkout/slot", &json!({ "start": slot["start"] }))
            .await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(self.post("/api/checkout/next", &json!({})).await.status(), StatusCode::OK);

        let resp = self
            .put(
                "/api/checkout/customer",
                &json!({
                    "first_name": "Camille",
                    "last_name": "Martin",
                    "email": "camille@example.fr",
                    "phone": "06 12 34 56 78",
                }),
            )
            .await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(self.post("/api/checkout/next", &json!({})).await.status(), StatusCode::OK);

        if let Some(code) = promo {
            let resp = self.post("/api/checkout/promo", &json!({ "code": code })).await;
            assert_eq!(resp.status(), StatusCode::OK);
        }
        let resp = self.post("/api/checkout/next", &json!({})).await;
        assert_eq!(resp.status(), StatusCode::OK);
        resp.json().await.unwrap()
    }

    /// Pay by card.
    pub async fn pay_by_card(&self, number: &str) -> Response {
        self.post(
            "/api/checkout/pay",
            &json!({
                "method": "card",
                "holder": "Camille Martin",
                "number": number,
                "expiry": "12/99",
                "cvv": "123",
            }),
        )
        .await
    }
}
