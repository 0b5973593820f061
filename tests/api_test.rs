mod common;

use axum::http::{header, Method, StatusCode};
use common::{decimal, read_json, TestApp};
use rust_decimal_macros::dec;
use serde_json::json;

#[tokio::test]
async fn products_are_listed_by_stock() {
    let app = TestApp::new().await;
    app.seed_product("Beras Pandan Wangi", dec!(70000), dec!(68000), 5, dec!(5000))
        .await;
    app.seed_product("Gula Pasir", dec!(15000), dec!(14000), 40, dec!(1000))
        .await;

    let (status, body) = app.json(Method::GET, "/api/v1/products", None).await;
    assert_eq!(status, StatusCode::OK);
    let data = body["data"].as_array().unwrap();
    assert_eq!(data.len(), 2);
    assert_eq!(data[0]["name"], "Gula Pasir");
    assert_eq!(data[1]["name"], "Beras Pandan Wangi");
    assert_eq!(body["pagination"]["total"], 2);
    assert_eq!(body["pagination"]["current_page"], 1);
    assert_eq!(
        body["pagination"]["links"]["first"],
        "http://localhost:18080/api/v1/products?page=1"
    );
}

#[tokio::test]
async fn search_matches_name_case_insensitively() {
    let app = TestApp::new().await;
    app.seed_product("Beras Pandan Wangi", dec!(70000), dec!(68000), 5, dec!(5000))
        .await;
    app.seed_product("Gula Pasir", dec!(15000), dec!(14000), 40, dec!(1000))
        .await;

    let (status, body) = app
        .json(Method::GET, "/api/v1/products/search?q=PANDAN", None)
        .await;
    assert_eq!(status, StatusCode::OK);
    let data = body["data"].as_array().unwrap();
    assert_eq!(data.len(), 1);
    assert_eq!(data[0]["slug"], "beras-pandan-wangi");
    assert!(body["pagination"]["links"]["first"]
        .as_str()
        .unwrap()
        .contains("q=PANDAN"));

    // Categories are searched too
    let (_, body) = app
        .json(Method::GET, "/api/v1/products/search?q=sembako", None)
        .await;
    assert_eq!(body["data"].as_array().map(Vec::len), Some(2));
}

#[tokio::test]
async fn suggestions_need_two_characters() {
    let app = TestApp::new().await;
    app.seed_product("Gula Pasir", dec!(15000), dec!(14000), 40, dec!(1000))
        .await;

    let (status, body) = app
        .json(Method::GET, "/api/v1/products/suggest?q=g", None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!([]));

    let (_, body) = app
        .json(Method::GET, "/api/v1/products/suggest?q=gu", None)
        .await;
    let suggestions = body.as_array().unwrap();
    assert_eq!(suggestions.len(), 1);
    assert_eq!(suggestions[0]["slug"], "gula-pasir");
    assert_eq!(suggestions[0]["unit_1"], "PCS");
    assert_eq!(decimal(&suggestions[0]["price"]), dec!(14000));
}

#[tokio::test]
async fn product_detail_by_slug() {
    let app = TestApp::new().await;
    let product = app
        .seed_product("Minyak Goreng", dec!(35000), dec!(33000), 10, dec!(2000))
        .await;

    let (status, body) = app
        .json(Method::GET, "/api/v1/products/minyak-goreng", None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["id"], product.id.to_string());
    assert_eq!(body["sku"], product.sku.as_str());

    let (status, body) = app
        .json(Method::GET, "/api/v1/products/tidak-ada", None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Not Found");
}

#[tokio::test]
async fn cart_routes_follow_the_session() {
    let app = TestApp::new().await;
    let product = app
        .seed_product("Kopi Robusta", dec!(20000), dec!(18000), 25, dec!(500))
        .await;

    let body = app.add_to_cart(product.id, 2).await;
    assert_eq!(decimal(&body["cart"]["grand_total"]), dec!(40000));
    let item_id = body["items"][0]["id"].as_str().unwrap().to_string();
    assert_eq!(body["items"][0]["product_slug"], "kopi-robusta");

    // Bulk form update
    let (status, body) = app
        .json(
            Method::POST,
            "/api/v1/carts/update",
            Some(json!({ "items": [{ "item_id": item_id, "qty": 5 }] })),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(decimal(&body["cart"]["grand_total"]), dec!(100000));

    // Single line update
    let (status, body) = app
        .json(
            Method::PUT,
            &format!("/api/v1/carts/items/{item_id}"),
            Some(json!({ "qty": 1 })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["items"][0]["qty"], 1);
    assert_eq!(body["cart"]["total_weight"], 500);

    // Another session sees its own, empty cart
    let other = app
        .request_in_session("another-shopper", Method::GET, "/api/v1/carts", None)
        .await;
    let (_, other) = read_json(other).await;
    assert_eq!(other["items"], json!([]));

    let response = app
        .request(
            Method::DELETE,
            &format!("/api/v1/carts/items/{item_id}"),
            None,
        )
        .await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let (_, body) = app.json(Method::GET, "/api/v1/carts", None).await;
    assert_eq!(body["items"], json!([]));
}

#[tokio::test]
async fn clearing_the_cart_empties_it() {
    let app = TestApp::new().await;
    let product = app
        .seed_product("Mie Instan", dec!(3500), dec!(3000), 100, dec!(85))
        .await;
    app.add_to_cart(product.id, 4).await;

    let (status, body) = app.json(Method::DELETE, "/api/v1/carts", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["items"], json!([]));
    assert_eq!(decimal(&body["cart"]["grand_total"]), dec!(0));
}

#[tokio::test]
async fn adding_beyond_stock_is_unprocessable() {
    let app = TestApp::new().await;
    let product = app
        .seed_product("Air Mineral", dec!(4000), dec!(3500), 1, dec!(600))
        .await;

    let (status, body) = app
        .json(
            Method::POST,
            "/api/v1/carts",
            Some(json!({ "product_id": product.id, "qty": 2, "unit": "PCS" })),
        )
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body["message"].as_str().unwrap().contains("Insufficient stock"));
}

#[tokio::test]
async fn oversized_line_update_is_rejected() {
    let app = TestApp::new().await;
    let product = app
        .seed_product("Pasir Bangunan", dec!(300000), dec!(290000), 100, dec!(50000))
        .await;
    let body = app.add_to_cart(product.id, 1).await;
    let item_id = body["items"][0]["id"].as_str().unwrap().to_string();

    let (status, body) = app
        .json(
            Method::PUT,
            &format!("/api/v1/carts/items/{item_id}"),
            Some(json!({ "qty": 100000 })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "{body}");

    let (_, cart) = app.json(Method::GET, "/api/v1/carts", None).await;
    assert_eq!(cart["items"][0]["qty"], 1);
    assert_eq!(cart["cart"]["total_weight"], 50000);
}

#[tokio::test]
async fn new_visitors_get_a_session_cookie() {
    let app = TestApp::new().await;

    let response = app
        .request_anonymous(Method::GET, "/api/v1/carts", None)
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let cookie = response
        .headers()
        .get(header::SET_COOKIE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    assert!(cookie.starts_with(&format!("{}=", app.state.config.session.cookie_name)));
    assert!(cookie.contains("HttpOnly"));

    // Known sessions are not re-issued
    let response = app.request(Method::GET, "/api/v1/carts", None).await;
    assert!(response.headers().get(header::SET_COOKIE).is_none());
}

#[tokio::test]
async fn responses_carry_request_id() {
    let app = TestApp::new().await;

    let response = app.request(Method::GET, "/api/v1/status", None).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().contains_key("x-request-id"));

    let (_, body) = read_json(response).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["service"], "storefront-api");
}

#[tokio::test]
async fn health_endpoints_respond() {
    let app = TestApp::new().await;

    let response = app.request(Method::GET, "/health", None).await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = app.request(Method::GET, "/health/readiness", None).await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn openapi_document_is_served() {
    let app = TestApp::new().await;

    let (status, body) = app.json(Method::GET, "/api-docs/openapi.json", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["info"]["title"], "Storefront API");
    assert!(body["paths"]["/api/v1/orders/checkout"].is_object());
    assert!(body["paths"]["/api/v1/payment/notification"].is_object());
}
