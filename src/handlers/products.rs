use crate::handlers::common::{map_service_error, success_response, PageParams};
use crate::{
    entities::product,
    errors::ApiError,
    services::commerce::product_catalog_service::{ProductPage, ProductSuggestion},
    AppState,
};
use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
    routing::get,
    Router,
};
use serde::Deserialize;
use utoipa::IntoParams;

/// Creates the router for catalog endpoints
pub fn products_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_products))
        .route("/search", get(search_products))
        .route("/suggest", get(suggest_products))
        .route("/:slug", get(get_product))
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct SearchParams {
    #[serde(default)]
    pub q: String,
    #[serde(default = "first_page")]
    pub page: u64,
}

fn first_page() -> u64 {
    1
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct SuggestParams {
    #[serde(default)]
    pub q: String,
}

/// List products
#[utoipa::path(
    get,
    path = "/api/v1/products",
    params(PageParams),
    responses(
        (status = 200, description = "Products ordered by stock", body = ProductPage),
        (status = 500, description = "Internal server error", body = crate::errors::ErrorResponse)
    ),
    tag = "Products"
)]
pub async fn list_products(
    State(state): State<AppState>,
    Query(params): Query<PageParams>,
) -> Result<impl IntoResponse, ApiError> {
    let page = state
        .services
        .products
        .list_products(params.page)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(page))
}

/// Search products
#[utoipa::path(
    get,
    path = "/api/v1/products/search",
    params(SearchParams),
    responses(
        (status = 200, description = "Matching products", body = ProductPage)
    ),
    tag = "Products"
)]
pub async fn search_products(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> Result<impl IntoResponse, ApiError> {
    let page = state
        .services
        .products
        .search_products(&params.q, params.page)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(page))
}

/// Autocomplete suggestions
#[utoipa::path(
    get,
    path = "/api/v1/products/suggest",
    params(SuggestParams),
    responses(
        (status = 200, description = "Up to ten suggestions", body = [ProductSuggestion])
    ),
    tag = "Products"
)]
pub async fn suggest_products(
    State(state): State<AppState>,
    Query(params): Query<SuggestParams>,
) -> Result<impl IntoResponse, ApiError> {
    let suggestions = state
        .services
        .products
        .suggest_products(&params.q)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(suggestions))
}

/// Product detail by slug
#[utoipa::path(
    get,
    path = "/api/v1/products/{slug}",
    params(("slug" = String, Path, description = "Product slug")),
    responses(
        (status = 200, description = "Product found", body = product::Model),
        (status = 404, description = "Product not found", body = crate::errors::ErrorResponse)
    ),
    tag = "Products"
)]
pub async fn get_product(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let product = state
        .services
        .products
        .get_product_by_slug(&slug)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(product))
}
