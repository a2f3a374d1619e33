//! Catalog, reviews and health endpoints.

#![allow(clippy::unwrap_used, clippy::indexing_slicing)]

use fournil_integration_tests::TestApp;
use reqwest::StatusCode;
use serde_json::json;

#[tokio::test]
async fn test_health_endpoints() {
    let app = TestApp::spawn().await;
    let visitor = app.visitor();

    let resp = visitor.get("/health").await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(resp.text().await.unwrap(), "ok");

    assert_eq!(visitor.get("/health/ready").await.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_categories_by_rank_with_products() {
    let app = TestApp::spawn().await;
    let visitor = app.visitor();

    let categories = visitor.get_json("/api/categories").await;
    let slugs: Vec<&str> = categories
        .as_array()
        .unwrap()
        .iter()
        .map(|c| c["slug"].as_str().unwrap())
        .collect();
    assert_eq!(slugs, ["pains", "viennoiseries", "patisseries", "snacking"]);

    let detail = visitor.get_json("/api/categories/viennoiseries").await;
    assert_eq!(detail["name"], "Viennoiseries");
    assert!(
        detail["products"]
            .as_array()
            .unwrap()
            .iter()
            .any(|p| p["name"] == "Croissant au beurre")
    );

    assert_eq!(
        visitor.get("/api/categories/inconnue").await.status(),
        StatusCode::NOT_FOUND
    );
}

#[tokio::test]
async fn test_product_filters() {
    let app = TestApp::spawn().await;
    let visitor = app.visitor();

    let pains = visitor.get_json("/api/products?category=pains").await;
    assert_eq!(pains.as_array().unwrap().len(), 3);

    // Case-insensitive, matches descriptions too
    let levain = visitor.get_json("/api/products?q=LEVAIN").await;
    assert_eq!(levain[0]["name"], "Pain de campagne");

    let id = visitor.product_id("chausson").await;
    let product = visitor.get_json(&format!("/api/products/{id}")).await;
    assert_eq!(product["price"], "4.50");

    assert_eq!(
        visitor.get("/api/products/9999").await.status(),
        StatusCode::NOT_FOUND
    );
    assert_eq!(
        visitor.get("/api/products?category=inconnue").await.status(),
        StatusCode::NOT_FOUND
    );
}

#[tokio::test]
async fn test_unavailable_products_hidden_from_available_filter() {
    let app = TestApp::spawn().await;
    let admin = app.login_admin().await;
    let id = admin.product_id("paris-brest").await;

    let resp = admin
        .post(
            &format!("/api/admin/products/{id}/stock"),
            &json!({ "delta": -8 }),
        )
        .await;
    assert_eq!(resp.status(), StatusCode::OK);

    let visitor = app.visitor();
    let available = visitor.get_json("/api/products?available=true").await;
    assert!(
        available
            .as_array()
            .unwrap()
            .iter()
            .all(|p| p["name"] != "Paris-Brest")
    );
    let all = visitor.get_json("/api/products?q=paris").await;
    assert_eq!(all[0]["stock"], 0);
}

#[tokio::test]
async fn test_reviews_require_login_and_valid_rating() {
    let app = TestApp::spawn().await;
    let visitor = app.visitor();
    let id = visitor.product_id("croissant").await;
    let path = format!("/api/products/{id}/reviews");

    let resp = visitor
        .post(&path, &json!({ "rating": 5, "comment": "Parfait" }))
        .await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    let resp = visitor
        .post(
            "/api/auth/register",
            &json!({ "email": "lea@example.fr", "name": "Léa", "password": "croissant" }),
        )
        .await;
    assert_eq!(resp.status(), StatusCode::CREATED);

    let resp = visitor.post(&path, &json!({ "rating": 6 })).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let resp = visitor
        .post(&path, &json!({ "rating": 4, "comment": "Très feuilleté" }))
        .await;
    assert_eq!(resp.status(), StatusCode::CREATED);

    let reviews = app.visitor().get_json(&path).await;
    assert_eq!(reviews.as_array().unwrap().len(), 1);
    assert_eq!(reviews[0]["author"], "Léa");
    assert_eq!(reviews[0]["rating"], 4);
}
