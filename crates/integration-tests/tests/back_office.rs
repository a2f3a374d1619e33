//! Admin endpoints and analytics.

#![allow(clippy::unwrap_used, clippy::indexing_slicing)]

use fournil_integration_tests::{GOOD_CARD, TestApp};
use reqwest::StatusCode;
use serde_json::{Value, json};

#[tokio::test]
async fn test_admin_endpoints_require_admin_role() {
    let app = TestApp::spawn().await;

    let anonymous = app.visitor();
    assert_eq!(
        anonymous.get("/api/admin/products").await.status(),
        StatusCode::UNAUTHORIZED
    );
    assert_eq!(
        anonymous.get("/api/analytics/summary").await.status(),
        StatusCode::UNAUTHORIZED
    );

    let customer = app.visitor();
    let resp = customer
        .post(
            "/api/auth/register",
            &json!({ "email": "lea@example.fr", "name": "Léa", "password": "croissant-beurre" }),
        )
        .await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    assert_eq!(
        customer.get("/api/admin/products").await.status(),
        StatusCode::FORBIDDEN
    );

    let admin = app.login_admin().await;
    let me = admin.get_json("/api/auth/me").await;
    assert_eq!(me["role"], "admin");
    let products = admin.get_json("/api/admin/products").await;
    assert_eq!(products.as_array().unwrap().len(), 11);
}

#[tokio::test]
async fn test_catalog_management() {
    let app = TestApp::spawn().await;
    let admin = app.login_admin().await;

    let resp = admin
        .post(
            "/api/admin/categories",
            &json!({ "name": "Boissons", "slug": "boissons", "rank": 5 }),
        )
        .await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let category: Value = resp.json().await.unwrap();

    let resp = admin
        .post(
            "/api/admin/products",
            &json!({
                "category_id": category["id"],
                "name": "Café",
                "description": "Espresso serré",
                "price": "1.80",
                "stock": 50,
            }),
        )
        .await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let product: Value = resp.json().await.unwrap();
    let id = product["id"].as_i64().unwrap();

    // Visible in the public catalog straight away
    let detail = admin.get_json("/api/categories/boissons").await;
    assert_eq!(detail["products"][0]["name"], "Café");

    let resp = admin
        .post(
            &format!("/api/admin/products/{id}/stock"),
            &json!({ "delta": -51 }),
        )
        .await;
    assert_eq!(resp.status(), StatusCode::CONFLICT);

    let resp = admin
        .post(
            &format!("/api/admin/products/{id}/stock"),
            &json!({ "delta": -20 }),
        )
        .await;
    let product: Value = resp.json().await.unwrap();
    assert_eq!(product["stock"], 30);

    let resp = admin.delete(&format!("/api/admin/products/{id}")).await;
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);
    assert_eq!(
        admin.get(&format!("/api/products/{id}")).await.status(),
        StatusCode::NOT_FOUND
    );
}

#[tokio::test]
async fn test_promo_code_management() {
    let app = TestApp::spawn().await;
    let admin = app.login_admin().await;

    let promo = json!({ "code": "rentree15", "kind": "percent", "value": "15" });
    let resp = admin.post("/api/admin/promo-codes", &promo).await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let created: Value = resp.json().await.unwrap();
    assert_eq!(created["code"], "RENTREE15");

    let resp = admin.post("/api/admin/promo-codes", &promo).await;
    assert_eq!(resp.status(), StatusCode::CONFLICT);

    let resp = admin
        .post(
            "/api/admin/promo-codes",
            &json!({ "code": "TROPFORT", "kind": "percent", "value": "150" }),
        )
        .await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    // Deactivated codes are refused at checkout
    let id = created["id"].as_i64().unwrap();
    let resp = admin
        .client
        .patch(admin.url(&format!("/api/admin/promo-codes/{id}")))
        .json(&json!({ "active": false }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let resp = admin
        .post(
            "/api/promo-codes/validate",
            &json!({ "code": "RENTREE15", "subtotal": "30.00" }),
        )
        .await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_order_lifecycle_and_analytics() {
    let app = TestApp::spawn().await;

    let customer = app.visitor();
    customer.add_to_cart("chausson", 4).await;
    customer.checkout_to_payment(Some("BIENVENUE10")).await;
    let resp = customer.pay_by_card(GOOD_CARD).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let paid: Value = resp.json().await.unwrap();
    let order_id = paid["order"]["id"].as_i64().unwrap();

    let admin = app.login_admin().await;

    let orders = admin.get_json("/api/admin/orders?status=confirmed").await;
    assert_eq!(orders.as_array().unwrap().len(), 1);

    let resp = admin
        .put(
            &format!("/api/admin/orders/{order_id}/status"),
            &json!({ "status": "in_preparation" }),
        )
        .await;
    assert_eq!(resp.status(), StatusCode::OK);
    let order: Value = resp.json().await.unwrap();
    assert_eq!(order["status"], "in_preparation");

    // Skipping `ready`
    let resp = admin
        .put(
            &format!("/api/admin/orders/{order_id}/status"),
            &json!({ "status": "picked_up" }),
        )
        .await;
    assert_eq!(resp.status(), StatusCode::CONFLICT);

    // The admin can read any order
    let number = paid["order"]["number"].as_str().unwrap();
    admin.get_json(&format!("/api/orders/{number}")).await;

    // Days follow shop-local time (UTC+1 by default).
    let today = (chrono::Utc::now() + chrono::Duration::minutes(60))
        .format("%Y-%m-%d")
        .to_string();
    let listed = admin
        .get_json(&format!("/api/admin/orders?from={today}&to={today}"))
        .await;
    assert_eq!(listed.as_array().unwrap().len(), 1);
    let revenue = admin.get_json("/api/analytics/revenue?period=day").await;
    assert_eq!(revenue[0]["period"], today.as_str());
    assert_eq!(revenue[0]["revenue"], "16.20");
    assert_eq!(revenue[0]["orders"], 1);

    let top = admin.get_json("/api/analytics/top-products?limit=3").await;
    assert_eq!(top.as_array().unwrap().len(), 1);
    assert_eq!(top[0]["quantity"], 4);

    let slots = admin.get_json("/api/analytics/slots").await;
    assert_eq!(slots[0]["orders"], 1);

    let summary = admin.get_json("/api/analytics/summary").await;
    assert_eq!(summary["orders"], 1);
    assert_eq!(summary["revenue"], "16.20");
    assert_eq!(summary["by_status"]["in_preparation"], 1);

    // The promo use was counted
    let promos = admin.get_json("/api/admin/promo-codes").await;
    let bienvenue = promos
        .as_array()
        .unwrap()
        .iter()
        .find(|p| p["code"] == "BIENVENUE10")
        .unwrap();
    assert_eq!(bienvenue["uses"], 1);
}
