use crate::handlers::common::{created_response, map_service_error, success_response};
use crate::{
    entities::order,
    errors::ApiError,
    services::commerce::checkout_service::{CheckoutInput, CheckoutResult},
    services::orders::OrderDetails,
    session::Session,
    AppState,
};
use axum::{
    extract::{Extension, Json, Path, State},
    response::IntoResponse,
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use tracing::warn;
use utoipa::ToSchema;
use uuid::Uuid;

/// Creates the router for checkout and order endpoints
pub fn orders_routes() -> Router<AppState> {
    Router::new()
        .route("/checkout", post(checkout))
        .route("/:id", get(get_order))
        .route("/:id/courier-registration", post(retry_courier_registration))
}

/// Order detail plus the one-shot notice left by checkout
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct OrderView {
    #[serde(flatten)]
    pub details: OrderDetails,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notice: Option<String>,
}

/// Place an order from the session cart
#[utoipa::path(
    post,
    path = "/api/v1/orders/checkout",
    summary = "Checkout",
    description = "Turns the session cart into an order, opens a payment page and registers the delivery with the courier",
    request_body = CheckoutInput,
    responses(
        (status = 201, description = "Order placed", body = CheckoutResult,
            headers(("X-Request-Id" = String, description = "Unique request id"))
        ),
        (status = 400, description = "Invalid form or empty cart", body = crate::errors::ErrorResponse),
        (status = 404, description = "Chosen shipping option not offered", body = crate::errors::ErrorResponse),
        (status = 500, description = "Courier or payment gateway error", body = crate::errors::ErrorResponse)
    ),
    tag = "Orders"
)]
pub async fn checkout(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Json(payload): Json<CheckoutInput>,
) -> Result<impl IntoResponse, ApiError> {
    let cart_key = session.cart_key().await.map_err(map_service_error)?;
    let result = state
        .services
        .checkout
        .checkout(cart_key, payload)
        .await
        .map_err(map_service_error)?;

    // The order exists at this point; a lost notice must not fail the request
    if let Err(err) = session.set_flash(result.notice.clone()).await {
        warn!(error = %err, "could not store checkout notice");
    }

    Ok(created_response(result))
}

/// Order detail, visible only to the session that placed it
#[utoipa::path(
    get,
    path = "/api/v1/orders/{id}",
    params(("id" = Uuid, Path, description = "Order ID")),
    responses(
        (status = 200, description = "Order with lines and address", body = OrderView),
        (status = 404, description = "Order not found", body = crate::errors::ErrorResponse)
    ),
    tag = "Orders"
)]
pub async fn get_order(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let cart_key = session.cart_key().await.map_err(map_service_error)?;
    let details = state
        .services
        .orders
        .get_order(id, cart_key)
        .await
        .map_err(map_service_error)?;
    let notice = session.take_flash().await.map_err(map_service_error)?;

    Ok(success_response(OrderView { details, notice }))
}

/// Re-send a pending courier registration for one of the session's orders
#[utoipa::path(
    post,
    path = "/api/v1/orders/{id}/courier-registration",
    params(("id" = Uuid, Path, description = "Order ID")),
    responses(
        (status = 200, description = "Order after the attempt; still pending when the courier refused", body = order::Model),
        (status = 404, description = "Order not found", body = crate::errors::ErrorResponse)
    ),
    tag = "Orders"
)]
pub async fn retry_courier_registration(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let cart_key = session.cart_key().await.map_err(map_service_error)?;
    let order = state
        .services
        .orders
        .retry_courier_registration(id, cart_key)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(order))
}
