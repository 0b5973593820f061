use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Storefront API",
        version = "1.0.0",
        description = r#"
# Storefront API

Online shop backend: product catalog, session cart, courier quotes, checkout and payment notifications.

## Sessions

Cart endpoints work on the caller's session. Browsers receive a `storefront_session` cookie on
the first request; other clients may send the same id in the `x-session-id` header.

## Error Handling

Errors use a consistent body with the matching HTTP status code:

```json
{
  "error": "Not Found",
  "message": "Not found: Product with slug beras-5kg not found",
  "request_id": "req-abc123xyz",
  "timestamp": "2024-01-01T00:00:00Z"
}
```

Shipping previews and the payment notification endpoint reply with `{code, data, message}`.

## Pagination

Catalog listings take `page` (default 1) and return `pagination.links` with absolute URLs.
        "#,
        license(
            name = "MIT",
            url = "https://opensource.org/licenses/MIT"
        )
    ),
    servers(
        (url = "http://localhost:9000", description = "Local development")
    ),
    tags(
        (name = "Products", description = "Catalog listing, search and detail"),
        (name = "Carts", description = "Session cart and shipping previews"),
        (name = "Orders", description = "Checkout and order detail"),
        (name = "Payments", description = "Payment gateway notifications"),
        (name = "Tracking", description = "Shipment tracking")
    ),
    paths(
        // Products
        crate::handlers::products::list_products,
        crate::handlers::products::search_products,
        crate::handlers::products::suggest_products,
        crate::handlers::products::get_product,

        // Carts
        crate::handlers::carts::get_cart,
        crate::handlers::carts::add_to_cart,
        crate::handlers::carts::update_cart,
        crate::handlers::carts::update_cart_item,
        crate::handlers::carts::remove_cart_item,
        crate::handlers::carts::clear_cart,
        crate::handlers::carts::calculate_shipping,
        crate::handlers::carts::apply_shipping,

        // Orders
        crate::handlers::orders::checkout,
        crate::handlers::orders::get_order,
        crate::handlers::orders::retry_courier_registration,

        // Webhooks
        crate::handlers::payment_webhooks::payment_notification,

        // Tracking
        crate::handlers::tracking::track_shipment,
    ),
    components(
        schemas(
            crate::errors::ErrorResponse
        )
    )
)]
pub struct ApiDocV1;

pub fn swagger_ui() -> SwaggerUi {
    SwaggerUi::new("/swagger-ui")
        .url("/api-docs/openapi.json", ApiDocV1::openapi())
        .config(utoipa_swagger_ui::Config::from("/api-docs/openapi.json").try_it_out_enabled(true))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn openapi_lists_storefront_paths() {
        let openapi = ApiDocV1::openapi();
        let json = serde_json::to_string_pretty(&openapi).unwrap();
        assert!(json.contains("Storefront API"));
        assert!(json.contains("/api/v1/carts/calculate-shipping"));
        assert!(json.contains("/api/v1/payment/notification"));
    }
}
