use crate::handlers::common::{
    map_service_error, no_content_response, success_response, validate_input, Envelope,
    SUCCESS_MESSAGE,
};
use crate::{
    errors::ApiError,
    services::commerce::cart_service::{AddToCartInput, CartWithItems, ItemQuantity},
    services::shipping::{DeliveryMode, DeliverySelection, ShippingApplication, ShippingQuote},
    session::Session,
    AppState,
};
use axum::{
    extract::{Extension, Json, Path, State},
    response::IntoResponse,
    routing::{get, post, put},
    Router,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

/// Creates the router for the session cart
pub fn carts_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(get_cart).post(add_to_cart).delete(clear_cart))
        .route("/update", post(update_cart))
        .route("/items/:id", put(update_cart_item).delete(remove_cart_item))
        .route("/calculate-shipping", post(calculate_shipping))
        .route("/apply-shipping", post(apply_shipping))
}

/// Current session cart with recalculated totals
#[utoipa::path(
    get,
    path = "/api/v1/carts",
    responses(
        (status = 200, description = "Session cart", body = CartWithItems)
    ),
    tag = "Carts"
)]
pub async fn get_cart(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
) -> Result<impl IntoResponse, ApiError> {
    let cart_key = session.cart_key().await.map_err(map_service_error)?;
    let cart = state
        .services
        .carts
        .get_cart(cart_key)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(cart))
}

/// Add a product to the session cart
#[utoipa::path(
    post,
    path = "/api/v1/carts",
    request_body = AddToCartInput,
    responses(
        (status = 200, description = "Item added", body = CartWithItems),
        (status = 400, description = "Invalid quantity or unit", body = crate::errors::ErrorResponse),
        (status = 404, description = "Product not found", body = crate::errors::ErrorResponse),
        (status = 422, description = "Not enough stock", body = crate::errors::ErrorResponse)
    ),
    tag = "Carts"
)]
pub async fn add_to_cart(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Json(payload): Json<AddToCartInput>,
) -> Result<impl IntoResponse, ApiError> {
    validate_input(&payload)?;

    let cart_key = session.cart_key().await.map_err(map_service_error)?;
    let cart = state
        .services
        .carts
        .add_item(cart_key, payload)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(cart))
}

/// Bulk quantity update
#[utoipa::path(
    post,
    path = "/api/v1/carts/update",
    request_body = UpdateCartRequest,
    responses(
        (status = 200, description = "Quantities applied", body = CartWithItems)
    ),
    tag = "Carts"
)]
pub async fn update_cart(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Json(payload): Json<UpdateCartRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let cart_key = session.cart_key().await.map_err(map_service_error)?;
    let cart = state
        .services
        .carts
        .update_items(cart_key, &payload.items)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(cart))
}

/// Set one line's quantity
#[utoipa::path(
    put,
    path = "/api/v1/carts/items/{id}",
    params(("id" = Uuid, Path, description = "Cart item ID")),
    request_body = UpdateQuantityRequest,
    responses(
        (status = 200, description = "Quantity applied", body = CartWithItems)
    ),
    tag = "Carts"
)]
pub async fn update_cart_item(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Path(item_id): Path<Uuid>,
    Json(payload): Json<UpdateQuantityRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let cart_key = session.cart_key().await.map_err(map_service_error)?;
    let cart = state
        .services
        .carts
        .update_item_quantity(cart_key, item_id, payload.qty)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(cart))
}

/// Remove a line from the session cart
#[utoipa::path(
    delete,
    path = "/api/v1/carts/items/{id}",
    params(("id" = Uuid, Path, description = "Cart item ID")),
    responses(
        (status = 204, description = "Item removed"),
        (status = 404, description = "Item not in this cart", body = crate::errors::ErrorResponse)
    ),
    tag = "Carts"
)]
pub async fn remove_cart_item(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Path(item_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let cart_key = session.cart_key().await.map_err(map_service_error)?;
    state
        .services
        .carts
        .remove_item(cart_key, item_id)
        .await
        .map_err(map_service_error)?;

    Ok(no_content_response())
}

/// Empty the session cart
#[utoipa::path(
    delete,
    path = "/api/v1/carts",
    responses(
        (status = 200, description = "Cart cleared", body = CartWithItems)
    ),
    tag = "Carts"
)]
pub async fn clear_cart(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
) -> Result<impl IntoResponse, ApiError> {
    let cart_key = session.cart_key().await.map_err(map_service_error)?;
    let cart = state
        .services
        .carts
        .clear_cart(cart_key)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(cart))
}

/// Quote delivery of the session cart
#[utoipa::path(
    post,
    path = "/api/v1/carts/calculate-shipping",
    request_body = ShippingRequest,
    responses(
        (status = 200, description = "Courier options", body = Envelope<ShippingQuote>),
        (status = 400, description = "Missing destination or coordinates", body = crate::errors::ErrorResponse),
        (status = 500, description = "Courier aggregator error", body = crate::errors::ErrorResponse)
    ),
    tag = "Carts"
)]
pub async fn calculate_shipping(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Json(payload): Json<ShippingRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let cart_key = session.cart_key().await.map_err(map_service_error)?;
    let cart = state
        .services
        .carts
        .get_cart(cart_key)
        .await
        .map_err(map_service_error)?;

    let quote = state
        .services
        .shipping
        .quote(cart.cart.total_weight, &payload.selection())
        .await
        .map_err(map_service_error)?;

    Ok(Envelope::ok(quote, SUCCESS_MESSAGE))
}

/// Apply a quoted option to the session cart totals
#[utoipa::path(
    post,
    path = "/api/v1/carts/apply-shipping",
    request_body = ApplyShippingRequest,
    responses(
        (status = 200, description = "Totals with shipping", body = Envelope<ShippingApplication>),
        (status = 404, description = "Chosen option no longer offered", body = crate::errors::ErrorResponse)
    ),
    tag = "Carts"
)]
pub async fn apply_shipping(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Json(payload): Json<ApplyShippingRequest>,
) -> Result<impl IntoResponse, ApiError> {
    validate_input(&payload)?;

    let cart_key = session.cart_key().await.map_err(map_service_error)?;
    let cart = state
        .services
        .carts
        .get_cart(cart_key)
        .await
        .map_err(map_service_error)?;

    let applied = state
        .services
        .shipping
        .apply(
            cart.cart.grand_total,
            cart.cart.total_weight,
            &payload.shipping.selection(),
            &payload.shipping_package,
        )
        .await
        .map_err(map_service_error)?;

    Ok(Envelope::ok(applied, SUCCESS_MESSAGE))
}

// Request DTOs

#[derive(Debug, Deserialize, Serialize, ToSchema)]
pub struct UpdateCartRequest {
    pub items: Vec<ItemQuantity>,
}

#[derive(Debug, Deserialize, Serialize, ToSchema)]
pub struct UpdateQuantityRequest {
    pub qty: i32,
}

/// Delivery selection as posted by the cart page
#[derive(Debug, Clone, Default, Deserialize, Serialize, ToSchema)]
pub struct ShippingRequest {
    /// Courier filter, e.g. `jne,sicepat`
    #[serde(default)]
    pub courier: Option<String>,
    #[serde(default)]
    pub city_id: Option<String>,
    /// `regular`, `instant` or `pickup`
    #[serde(default)]
    pub cour_type: Option<String>,
    #[serde(default)]
    pub latitude: Option<String>,
    #[serde(default)]
    pub longitude: Option<String>,
}

impl ShippingRequest {
    pub fn selection(&self) -> DeliverySelection {
        DeliverySelection {
            mode: DeliveryMode::from_form(self.cour_type.as_deref(), self.courier.as_deref()),
            city_id: self.city_id.clone().unwrap_or_default(),
            courier: self.courier.clone().unwrap_or_default(),
            latitude: self.latitude.clone(),
            longitude: self.longitude.clone(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, Validate, ToSchema)]
pub struct ApplyShippingRequest {
    #[serde(flatten)]
    pub shipping: ShippingRequest,
    /// Courier name of the chosen option, e.g. `JNE`
    #[serde(default)]
    #[validate(length(max = 100))]
    pub shipping_package: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shipping_request_maps_pickup_courier() {
        let request: ShippingRequest =
            serde_json::from_str(r#"{"courier": "pickup", "city_id": ""}"#).unwrap();
        let selection = request.selection();
        assert_eq!(selection.mode, DeliveryMode::Pickup);
        assert_eq!(selection.city_id, "");
    }

    #[test]
    fn apply_request_flattens_selection() {
        let request: ApplyShippingRequest = serde_json::from_str(
            r#"{"courier": "jne", "city_id": "6472", "shipping_package": "JNE"}"#,
        )
        .unwrap();
        assert_eq!(request.shipping_package, "JNE");
        let selection = request.shipping.selection();
        assert_eq!(selection.mode, DeliveryMode::Regular);
        assert_eq!(selection.city_id, "6472");
        assert_eq!(selection.courier, "jne");
    }
}
