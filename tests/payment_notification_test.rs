mod common;

use axum::http::{Method, StatusCode};
use common::{checkout_form, read_json, signed_notification, TestApp};
use rust_decimal_macros::dec;
use sea_orm::{ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter};
use serde_json::{json, Value};
use storefront_api::entities::{order, payment};
use uuid::Uuid;

const NOTIFICATION_PATH: &str = "/api/v1/payment/notification";

/// Places a 15000 order (2 x 5000 plus 5000 shipping) and returns its id.
async fn place_order(app: &TestApp) -> String {
    app.mock_rates(5000).await;
    app.mock_courier_order("TRK-P", "WB-P").await;
    app.mock_payment_link("snap-token-p").await;
    app.cart_with(dec!(5000), 2).await;

    let (status, body) = app
        .json(Method::POST, "/api/v1/orders/checkout", Some(checkout_form()))
        .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    body["order"]["id"].as_str().unwrap().to_string()
}

/// The gateway posts without a storefront session.
async fn notify(app: &TestApp, payload: Value) -> (StatusCode, Value) {
    let response = app
        .request_anonymous(Method::POST, NOTIFICATION_PATH, Some(payload))
        .await;
    read_json(response).await
}

async fn payment_rows(app: &TestApp, order_id: &str) -> u64 {
    payment::Entity::find()
        .filter(payment::Column::OrderId.eq(Uuid::parse_str(order_id).unwrap()))
        .count(&*app.state.db)
        .await
        .unwrap()
}

async fn stored_order(app: &TestApp, order_id: &str) -> order::Model {
    order::Entity::find_by_id(Uuid::parse_str(order_id).unwrap())
        .one(&*app.state.db)
        .await
        .unwrap()
        .expect("order exists")
}

#[tokio::test]
async fn settlement_marks_order_paid() {
    let app = TestApp::new().await;
    let order_id = place_order(&app).await;

    let (status, body) = notify(
        &app,
        signed_notification(&order_id, "15000.00", "bank_transfer", "settlement", "accept"),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["code"], 200);
    assert_eq!(body["message"], "Payment saved.");
    assert_eq!(body["data"]["paid"], true);
    assert_eq!(body["data"]["order_id"], order_id.as_str());

    let order = stored_order(&app, &order_id).await;
    assert_eq!(order.payment_status, order::PaymentStatus::Paid);
    assert!(order.paid_at.is_some());
    assert_eq!(payment_rows(&app, &order_id).await, 1);
}

#[tokio::test]
async fn credit_card_capture_marks_order_paid() {
    let app = TestApp::new().await;
    let order_id = place_order(&app).await;

    let (status, body) = notify(
        &app,
        signed_notification(&order_id, "15000.00", "credit_card", "capture", "accept"),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["data"]["paid"], true);
}

#[tokio::test]
async fn pending_notification_is_recorded_without_payment() {
    let app = TestApp::new().await;
    let order_id = place_order(&app).await;

    let (status, body) = notify(
        &app,
        signed_notification(&order_id, "15000.00", "bank_transfer", "pending", "accept"),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["data"]["paid"], false);

    let order = stored_order(&app, &order_id).await;
    assert_eq!(order.payment_status, order::PaymentStatus::Unpaid);
    assert_eq!(payment_rows(&app, &order_id).await, 1);
}

#[tokio::test]
async fn duplicate_settlement_is_refused_but_recorded() {
    let app = TestApp::new().await;
    let order_id = place_order(&app).await;
    let settlement =
        || signed_notification(&order_id, "15000.00", "bank_transfer", "settlement", "accept");

    let (status, _) = notify(&app, settlement()).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = notify(&app, settlement()).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["code"], 403);
    assert_eq!(body["message"], "Already paid before.");
    assert!(body["data"].is_null());

    assert_eq!(payment_rows(&app, &order_id).await, 2);
}

#[tokio::test]
async fn forged_signature_is_refused() {
    let app = TestApp::new().await;
    let order_id = place_order(&app).await;

    let mut payload =
        signed_notification(&order_id, "15000.00", "bank_transfer", "settlement", "accept");
    // Signed for a smaller amount than the one claimed
    payload["gross_amount"] = json!("150000.00");

    let (status, body) = notify(&app, payload).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["message"], "invalid signature key");

    let order = stored_order(&app, &order_id).await;
    assert_eq!(order.payment_status, order::PaymentStatus::Unpaid);
    assert_eq!(payment_rows(&app, &order_id).await, 0);
}

#[tokio::test]
async fn unknown_order_is_refused() {
    let app = TestApp::new().await;
    let missing = Uuid::new_v4().to_string();

    let (status, body) = notify(
        &app,
        signed_notification(&missing, "15000.00", "bank_transfer", "settlement", "accept"),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["message"], "order not found");
}

#[tokio::test]
async fn malformed_payload_is_bad_request() {
    let app = TestApp::new().await;

    let (status, body) = notify(&app, json!({ "status_code": "200" })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["message"]
        .as_str()
        .unwrap()
        .starts_with("invalid payload"));
}

#[tokio::test]
async fn development_skips_signature_check() {
    let app = TestApp::with_config(|cfg| cfg.environment = "development".to_string()).await;
    let order_id = place_order(&app).await;

    let mut payload =
        signed_notification(&order_id, "15000.00", "gopay", "settlement", "accept");
    payload["signature_key"] = json!("not-a-signature");

    let (status, body) = notify(&app, payload).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["data"]["paid"], true);
}
