//! Storefront API Library
//!
//! Catalog, session cart, courier quotes, checkout and payment reconciliation
//! for a single online shop.
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![allow(elided_lifetimes_in_paths)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

// Core modules
pub mod config;
pub mod db;
pub mod entities;
pub mod errors;
pub mod events;
pub mod handlers;
pub mod health;
pub mod middleware_helpers;
pub mod migrator;
pub mod openapi;
pub mod services;
pub mod session;
pub mod tracing;

use axum::{response::Json, routing::get, Router};
use sea_orm::DatabaseConnection;
use serde_json::{json, Value};
use std::sync::Arc;

use crate::middleware_helpers::{request_id_middleware, session_middleware, SessionLayer};
use crate::session::SessionStore;

// App state definition
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<DatabaseConnection>,
    pub config: Arc<config::AppConfig>,
    pub event_sender: Arc<events::EventSender>,
    pub services: handlers::AppServices,
    pub session_store: Arc<dyn SessionStore>,
}

/// Standard API result type for JSON responses
pub type ApiResult<T> = Result<Json<T>, errors::ServiceError>;

pub fn api_v1_routes() -> Router<AppState> {
    // Payment webhook (no session, signature-verified)
    let payment_webhook = Router::new().route(
        "/payment/notification",
        axum::routing::post(handlers::payment_webhooks::payment_notification),
    );

    Router::new()
        .route("/status", get(api_status))
        .nest("/products", handlers::products::products_routes())
        .nest("/carts", handlers::carts::carts_routes())
        .nest("/orders", handlers::orders::orders_routes())
        .nest("/tracking", handlers::tracking::tracking_routes())
        .merge(payment_webhook)
}

/// Full application router: API, health, docs, session and request-id middleware.
///
/// Transport concerns such as compression and CORS are left to the binary.
pub fn build_router(state: AppState) -> Router {
    let sessions = SessionLayer::new(
        state.session_store.clone(),
        state.config.session.cookie_name.clone(),
    );

    Router::new()
        .route("/", get(|| async { "storefront-api up" }))
        .nest("/api/v1", api_v1_routes())
        .with_state(state.clone())
        .nest("/health", health::health_routes(state.db.clone()))
        .merge(openapi::swagger_ui())
        .layer(axum::middleware::from_fn_with_state(
            sessions,
            session_middleware,
        ))
        .layer(crate::tracing::configure_http_tracing())
        // Ensure every request carries a request id for traceability
        .layer(axum::middleware::from_fn(request_id_middleware))
}

async fn api_status() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "git": option_env!("GIT_HASH").unwrap_or("unknown"),
        "service": "storefront-api",
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
}

pub mod prelude {
    pub use crate::config::AppConfig;
    pub use crate::db::*;
    pub use crate::errors::*;
    pub use crate::events::*;
    pub use crate::services::*;
    pub use crate::AppState;
}
