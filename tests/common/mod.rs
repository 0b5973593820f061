#![allow(dead_code)]

use std::sync::Arc;

use axum::{
    body::Body,
    http::{Method, Request, StatusCode},
    Router,
};
use http_body_util::BodyExt;
use rust_decimal::Decimal;
use serde_json::{json, Value};
use storefront_api::{
    build_router,
    config::AppConfig,
    db,
    entities::product,
    events::{self, EventSender},
    handlers::AppServices,
    middleware_helpers::SESSION_HEADER,
    services::{
        commerce::product_catalog_service::{CreateProductInput, UnitPricingInput},
        payments::{notification_signature, MidtransSnapClient},
        shipping::{BiteshipClient, Coordinate},
    },
    session::InMemorySessionStore,
    AppState,
};
use tempfile::TempDir;
use tokio::sync::mpsc;
use tower::ServiceExt;
use uuid::Uuid;
use wiremock::{
    matchers::{method, path},
    Mock, MockServer, ResponseTemplate,
};

pub const SERVER_KEY: &str = "SB-Mid-server-test";
pub const ORIGIN_AREA: &str = "IDNC383";
/// Palaran district of Samarinda
pub const DISTRICT: &str = "6472030";

/// Application backed by a throwaway SQLite file, with the courier and the
/// payment gateway replaced by local mock servers.
pub struct TestApp {
    router: Router,
    pub state: AppState,
    pub courier: MockServer,
    pub gateway: MockServer,
    session_id: String,
    _db_dir: TempDir,
    _event_task: tokio::task::JoinHandle<()>,
}

impl TestApp {
    pub async fn new() -> Self {
        Self::with_config(|_| {}).await
    }

    /// Builds the app after letting the caller adjust the test configuration.
    pub async fn with_config(adjust: impl FnOnce(&mut AppConfig)) -> Self {
        let courier = MockServer::start().await;
        let gateway = MockServer::start().await;

        let db_dir = tempfile::tempdir().expect("create temp dir for test database");
        let db_path = db_dir.path().join("storefront_test.db");

        let mut cfg = AppConfig::new(
            format!("sqlite://{}?mode=rwc", db_path.display()),
            "127.0.0.1".to_string(),
            18_080,
            "test".to_string(),
        );
        cfg.auto_migrate = true;
        cfg.db_max_connections = 1;
        cfg.db_min_connections = 1;
        cfg.app_url = "http://localhost:18080".to_string();
        cfg.shipping.api_key = "biteship_test.integration".to_string();
        cfg.shipping.base_url = courier.uri();
        cfg.shipping.default_origin_area_id = ORIGIN_AREA.to_string();
        cfg.shipping.registration_retry_interval_secs = 0;
        cfg.payment.server_key = SERVER_KEY.to_string();
        cfg.payment.base_url = gateway.uri();
        adjust(&mut cfg);

        let pool = db::establish_connection_from_app_config(&cfg)
            .await
            .expect("failed to create test database");
        db::run_migrations(&pool)
            .await
            .expect("failed to run migrations in tests");

        let config = Arc::new(cfg);
        let db_arc = Arc::new(pool);
        let (event_tx, event_rx) = mpsc::channel(256);
        let event_sender = Arc::new(EventSender::new(event_tx));
        let event_task = tokio::spawn(events::process_events(event_rx));

        let courier_client = BiteshipClient::new(
            config.shipping.base_url.clone(),
            config.shipping.api_key.clone(),
            Coordinate {
                latitude: config.shipping.store.latitude,
                longitude: config.shipping.store.longitude,
            },
            config.shipping.request_timeout(),
        )
        .expect("courier client");
        let gateway_client = MidtransSnapClient::new(
            config.payment.base_url.clone(),
            config.payment.server_key.clone(),
            None,
        )
        .expect("payment client");

        let services = AppServices::new(
            db_arc.clone(),
            config.clone(),
            event_sender.clone(),
            Arc::new(courier_client),
            Arc::new(gateway_client),
        )
        .expect("wire services");

        let state = AppState {
            db: db_arc,
            config,
            event_sender,
            services,
            session_store: Arc::new(InMemorySessionStore::new()),
        };
        let router = build_router(state.clone());

        Self {
            router,
            state,
            courier,
            gateway,
            session_id: Uuid::new_v4().to_string(),
            _db_dir: db_dir,
            _event_task: event_task,
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Sends a request within the default shopper session.
    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
    ) -> axum::response::Response {
        self.request_in_session(&self.session_id, method, uri, body)
            .await
    }

    pub async fn request_in_session(
        &self,
        session_id: &str,
        method: Method,
        uri: &str,
        body: Option<Value>,
    ) -> axum::response::Response {
        let builder = Request::builder()
            .method(method)
            .uri(uri)
            .header(SESSION_HEADER, session_id);
        self.send(builder, body).await
    }

    /// Sends a request without any session header or cookie.
    pub async fn request_anonymous(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
    ) -> axum::response::Response {
        self.send(Request::builder().method(method).uri(uri), body)
            .await
    }

    async fn send(
        &self,
        mut builder: axum::http::request::Builder,
        body: Option<Value>,
    ) -> axum::response::Response {
        let body = if let Some(json) = body {
            builder = builder.header("content-type", "application/json");
            Body::from(serde_json::to_vec(&json).expect("failed to serialize json request body"))
        } else {
            Body::empty()
        };

        let request = builder.body(body).expect("failed to build request");
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router error during test request")
    }

    /// Like [`TestApp::request`], returning the status and the parsed JSON body.
    pub async fn json(&self, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let response = self.request(method, uri, body).await;
        read_json(response).await
    }

    /// Seeds a product sold per `PCS` with the given prices.
    pub async fn seed_product(
        &self,
        name: &str,
        retail: Decimal,
        bulk: Decimal,
        stock: i32,
        weight: Decimal,
    ) -> product::Model {
        let sku = format!("SKU-{}", &Uuid::new_v4().simple().to_string()[..8]);
        self.state
            .services
            .products
            .create_product(CreateProductInput {
                name: name.to_string(),
                sku,
                units: vec![UnitPricingInput::new("PCS", bulk, retail)],
                stock,
                categories: "Sembako".to_string(),
                weight,
                ..CreateProductInput::default()
            })
            .await
            .expect("seed product for tests")
    }

    pub async fn add_to_cart(&self, product_id: Uuid, qty: i32) -> Value {
        let (status, body) = self
            .json(
                Method::POST,
                "/api/v1/carts",
                Some(json!({ "product_id": product_id, "qty": qty, "unit": "PCS" })),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "add to cart failed: {body}");
        body
    }

    /// Courier rates answering every rate request with JNE REG and YES.
    pub async fn mock_rates(&self, reg_price: i64) {
        Mock::given(method("POST"))
            .and(path("/v1/rates/couriers"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "success": true,
                "message": "Success to retrieve courier pricing",
                "object": "courier_pricing",
                "pricing": [
                    {
                        "company": "jne",
                        "courier_name": "JNE",
                        "courier_code": "jne",
                        "courier_service_name": "REG",
                        "duration": "2 - 3 days",
                        "shipment_duration_unit": "days",
                        "price": reg_price
                    },
                    {
                        "company": "jne",
                        "courier_name": "JNE",
                        "courier_code": "jne",
                        "courier_service_name": "YES",
                        "duration": "1 days",
                        "shipment_duration_unit": "days",
                        "price": reg_price * 2
                    }
                ]
            })))
            .mount(&self.courier)
            .await;
    }

    pub async fn mock_courier_order(&self, tracking_id: &str, waybill_id: &str) {
        Mock::given(method("POST"))
            .and(path("/v1/orders"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "success": true,
                "message": "Order successfully created",
                "object": "order",
                "id": format!("bs-{tracking_id}"),
                "courier": {
                    "tracking_id": tracking_id,
                    "waybill_id": waybill_id,
                    "company": "jne",
                    "name": null,
                    "link": null
                },
                "status": "confirmed",
                "price": 5000
            })))
            .mount(&self.courier)
            .await;
    }

    pub async fn mock_courier_order_failure(&self) {
        Mock::given(method("POST"))
            .and(path("/v1/orders"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "success": false,
                "error": "Courier is not available",
                "code": 40002002
            })))
            .mount(&self.courier)
            .await;
    }

    pub async fn mock_payment_link(&self, token: &str) {
        Mock::given(method("POST"))
            .and(path("/snap/v1/transactions"))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({
                "token": token,
                "redirect_url": format!("https://app.sandbox.midtrans.com/snap/v4/redirection/{token}")
            })))
            .mount(&self.gateway)
            .await;
    }

    /// Fills the default session's cart with `qty` of one product and returns it.
    pub async fn cart_with(&self, retail: Decimal, qty: i32) -> product::Model {
        let product = self
            .seed_product("Gula Pasir 1 Kg", retail, retail, 50, Decimal::from(1000))
            .await;
        self.add_to_cart(product.id, qty).await;
        product
    }
}

impl Drop for TestApp {
    fn drop(&mut self) {
        self._event_task.abort();
    }
}

pub async fn read_json(response: axum::response::Response) -> (StatusCode, Value) {
    let status = response.status();
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("read response body")
        .to_bytes();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).expect("response body is json")
    };
    (status, value)
}

/// Checkout form for regular JNE delivery to [`DISTRICT`].
pub fn checkout_form() -> Value {
    json!({
        "courier": "jne",
        "shipping_package": "JNE",
        "city_id": DISTRICT,
        "cour_type": "regular",
        "first_name": "Sari",
        "last_name": "Dewi",
        "province_id": "64",
        "address1": "Jl. Pahlawan No. 1",
        "phone": "081234567890",
        "email": "sari@example.com",
        "post_code": "75131"
    })
}

/// Gateway notification signed with the test server key.
pub fn signed_notification(
    order_id: &str,
    gross_amount: &str,
    payment_type: &str,
    transaction_status: &str,
    fraud_status: &str,
) -> Value {
    let status_code = "200";
    json!({
        "order_id": order_id,
        "status_code": status_code,
        "gross_amount": gross_amount,
        "signature_key": notification_signature(order_id, status_code, gross_amount, SERVER_KEY),
        "transaction_id": Uuid::new_v4().to_string(),
        "transaction_status": transaction_status,
        "fraud_status": fraud_status,
        "payment_type": payment_type,
        "transaction_time": "2024-05-01 10:00:00"
    })
}

/// Reads a money field serialized either as a string or a number.
pub fn decimal(value: &Value) -> Decimal {
    match value {
        Value::String(raw) => raw.parse().expect("decimal string"),
        Value::Number(n) => n.to_string().parse().expect("decimal number"),
        other => panic!("expected a decimal, got {other}"),
    }
}
