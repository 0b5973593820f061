use crate::{
    config::CatalogConfig,
    entities::product,
    errors::ServiceError,
};
use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    sea_query::{Expr, Func},
    ActiveModelTrait, ColumnTrait, Condition, DatabaseConnection, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, QuerySelect, Select, Set,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

const PRODUCTS_PATH: &str = "/api/v1/products";
const SEARCH_PATH: &str = "/api/v1/products/search";

/// Read side of the product catalog plus product creation for seeding.
#[derive(Clone)]
pub struct ProductCatalogService {
    db: Arc<DatabaseConnection>,
    config: CatalogConfig,
    app_url: String,
}

impl ProductCatalogService {
    pub fn new(db: Arc<DatabaseConnection>, config: CatalogConfig, app_url: impl Into<String>) -> Self {
        Self {
            db,
            config,
            app_url: app_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Lists products, best stocked first.
    #[instrument(skip(self))]
    pub async fn list_products(&self, page: u64) -> Result<ProductPage, ServiceError> {
        let query = product::Entity::find();
        self.paginate(query, page, PRODUCTS_PATH, None).await
    }

    /// Case-insensitive substring search over name, categories and unit labels.
    #[instrument(skip(self))]
    pub async fn search_products(&self, q: &str, page: u64) -> Result<ProductPage, ServiceError> {
        let q = q.trim();
        if q.is_empty() {
            return self.list_products(page).await;
        }
        let query = product::Entity::find().filter(search_condition(q));
        self.paginate(query, page, SEARCH_PATH, Some(q)).await
    }

    /// Autocomplete suggestions; short queries yield nothing.
    #[instrument(skip(self))]
    pub async fn suggest_products(&self, q: &str) -> Result<Vec<ProductSuggestion>, ServiceError> {
        let q = q.trim();
        if q.chars().count() < self.config.suggestion_min_chars {
            return Ok(Vec::new());
        }

        let products = product::Entity::find()
            .filter(search_condition(q))
            .order_by_desc(product::Column::Stock)
            .order_by_asc(product::Column::Name)
            .limit(self.config.suggestion_limit)
            .all(&*self.db)
            .await?;

        Ok(products.into_iter().map(ProductSuggestion::from).collect())
    }

    #[instrument(skip(self))]
    pub async fn get_product_by_slug(&self, slug: &str) -> Result<product::Model, ServiceError> {
        product::Entity::find()
            .filter(product::Column::Slug.eq(slug))
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Product with slug {} not found", slug)))
    }

    pub async fn get_product(&self, product_id: Uuid) -> Result<product::Model, ServiceError> {
        product::Entity::find_by_id(product_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Product {} not found", product_id)))
    }

    /// Create a new product
    #[instrument(skip(self, input), fields(sku = %input.sku))]
    pub async fn create_product(
        &self,
        input: CreateProductInput,
    ) -> Result<product::Model, ServiceError> {
        input.validate()?;
        self.ensure_unique_sku(&input.sku).await?;

        let slug = match input.slug.as_deref().map(str::trim) {
            Some(slug) if !slug.is_empty() => slug.to_string(),
            _ => slugify(&input.name),
        };
        let mut units = input.units.clone();
        units.resize_with(3, UnitPricingInput::default);
        let now = Utc::now();
        let product_id = Uuid::new_v4();

        let product = product::ActiveModel {
            id: Set(product_id),
            name: Set(input.name.trim().to_string()),
            sku: Set(input.sku.clone()),
            slug: Set(slug),
            unit_1: Set(units[0].label.clone()),
            unit_2: Set(units[1].label.clone()),
            unit_3: Set(units[2].label.clone()),
            conversion_1: Set(units[0].conversion),
            conversion_2: Set(units[1].conversion),
            conversion_3: Set(units[2].conversion),
            cost_price_1: Set(units[0].cost_price),
            cost_price_2: Set(units[1].cost_price),
            cost_price_3: Set(units[2].cost_price),
            bulk_price_1: Set(units[0].bulk_price),
            bulk_price_2: Set(units[1].bulk_price),
            bulk_price_3: Set(units[2].bulk_price),
            retail_price_1: Set(units[0].retail_price),
            retail_price_2: Set(units[1].retail_price),
            retail_price_3: Set(units[2].retail_price),
            stock: Set(input.stock),
            supplier: Set(input.supplier.clone()),
            categories: Set(input.categories.clone()),
            price: Set(input.price.unwrap_or(units[0].retail_price)),
            weight: Set(input.weight),
            short_description: Set(input.short_description.clone()),
            description: Set(input.description.clone()),
            status: Set(input.status),
            created_at: Set(now),
            updated_at: Set(now),
        };

        let product = product.insert(&*self.db).await?;
        info!("Created product: {}", product_id);
        Ok(product)
    }

    async fn ensure_unique_sku(&self, sku: &str) -> Result<(), ServiceError> {
        let existing = product::Entity::find()
            .filter(product::Column::Sku.eq(sku))
            .one(&*self.db)
            .await?;

        if existing.is_some() {
            return Err(ServiceError::ValidationError(format!(
                "SKU {} already exists",
                sku
            )));
        }
        Ok(())
    }

    async fn paginate(
        &self,
        query: Select<product::Entity>,
        page: u64,
        path: &str,
        q: Option<&str>,
    ) -> Result<ProductPage, ServiceError> {
        let page = page.max(1);
        let per_page = self.config.page_size;
        let paginator = query
            .order_by_desc(product::Column::Stock)
            .order_by_asc(product::Column::Name)
            .paginate(&*self.db, per_page);

        let total = paginator.num_items().await?;
        let data = paginator.fetch_page(page - 1).await?;

        Ok(ProductPage {
            data,
            pagination: Pagination::new(&format!("{}{}", self.app_url, path), q, page, per_page, total),
        })
    }
}

fn search_condition(q: &str) -> Condition {
    let pattern = format!("%{}%", q.to_lowercase());
    [
        product::Column::Name,
        product::Column::Categories,
        product::Column::Unit1,
        product::Column::Unit2,
        product::Column::Unit3,
    ]
    .into_iter()
    .fold(Condition::any(), |cond, column| {
        cond.add(Expr::expr(Func::lower(Expr::col(column))).like(pattern.clone()))
    })
}

/// Lowercase ASCII words joined by `-`
pub fn slugify(name: &str) -> String {
    name.split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|part| !part.is_empty())
        .map(|part| part.to_ascii_lowercase())
        .collect::<Vec<_>>()
        .join("-")
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ProductPage {
    pub data: Vec<product::Model>,
    pub pagination: Pagination,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct PageLinks {
    pub first: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prev: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next: Option<String>,
    pub last: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Pagination {
    pub current_page: u64,
    pub total_pages: u64,
    pub total: u64,
    pub per_page: u64,
    pub links: PageLinks,
}

impl Pagination {
    pub fn new(base: &str, q: Option<&str>, current_page: u64, per_page: u64, total: u64) -> Self {
        let total_pages = if per_page == 0 {
            0
        } else {
            total.div_ceil(per_page)
        };
        let last_page = total_pages.max(1);
        let link = |page: u64| page_url(base, q, page);

        Self {
            current_page,
            total_pages,
            total,
            per_page,
            links: PageLinks {
                first: link(1),
                prev: (current_page > 1).then(|| link((current_page - 1).min(last_page))),
                next: (current_page < total_pages).then(|| link(current_page + 1)),
                last: link(last_page),
            },
        }
    }
}

fn page_url(base: &str, q: Option<&str>, page: u64) -> String {
    match reqwest::Url::parse(base) {
        Ok(mut url) => {
            {
                let mut pairs = url.query_pairs_mut();
                if let Some(q) = q {
                    pairs.append_pair("q", q);
                }
                pairs.append_pair("page", &page.to_string());
            }
            url.to_string()
        }
        Err(_) => match q {
            Some(q) => format!("{}?q={}&page={}", base, q, page),
            None => format!("{}?page={}", base, page),
        },
    }
}

/// Autocomplete entry; `price` is the first bulk price.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ProductSuggestion {
    pub name: String,
    pub slug: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub categories: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub unit_1: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub unit_2: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub unit_3: String,
    #[schema(value_type = String)]
    pub price: Decimal,
}

impl From<product::Model> for ProductSuggestion {
    fn from(product: product::Model) -> Self {
        Self {
            name: product.name,
            slug: product.slug,
            categories: product.categories,
            unit_1: product.unit_1,
            unit_2: product.unit_2,
            unit_3: product.unit_3,
            price: product.bulk_price_1,
        }
    }
}

/// One unit-of-measure slot of a new product
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct UnitPricingInput {
    pub label: String,
    pub conversion: i32,
    #[schema(value_type = String)]
    pub cost_price: Decimal,
    /// Price when more than two are bought
    #[schema(value_type = String)]
    pub bulk_price: Decimal,
    #[schema(value_type = String)]
    pub retail_price: Decimal,
}

impl UnitPricingInput {
    pub fn new(label: &str, bulk_price: Decimal, retail_price: Decimal) -> Self {
        Self {
            label: label.to_string(),
            conversion: 1,
            cost_price: Decimal::ZERO,
            bulk_price,
            retail_price,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate, ToSchema)]
pub struct CreateProductInput {
    #[validate(length(min = 1, max = 255))]
    pub name: String,
    #[validate(length(min = 1, max = 100))]
    pub sku: String,
    /// Derived from the name when absent
    pub slug: Option<String>,
    /// Up to three unit slots, in order
    #[validate(length(min = 1, max = 3))]
    pub units: Vec<UnitPricingInput>,
    #[validate(range(min = 0))]
    pub stock: i32,
    pub supplier: Option<String>,
    #[serde(default)]
    pub categories: String,
    #[schema(value_type = Option<String>)]
    pub price: Option<Decimal>,
    /// Grams
    #[schema(value_type = String)]
    pub weight: Decimal,
    pub short_description: Option<String>,
    pub description: Option<String>,
    #[serde(default)]
    pub status: i32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slugify_collapses_separators() {
        assert_eq!(slugify("Beras Pandan Wangi 5 Kg"), "beras-pandan-wangi-5-kg");
        assert_eq!(slugify("  Gula -- Pasir!! "), "gula-pasir");
    }

    #[test]
    fn pagination_links_cover_neighbours() {
        let pagination = Pagination::new("http://localhost:9000/api/v1/products", None, 2, 100, 250);
        assert_eq!(pagination.total_pages, 3);
        assert_eq!(
            pagination.links.first,
            "http://localhost:9000/api/v1/products?page=1"
        );
        assert_eq!(
            pagination.links.prev.as_deref(),
            Some("http://localhost:9000/api/v1/products?page=1")
        );
        assert_eq!(
            pagination.links.next.as_deref(),
            Some("http://localhost:9000/api/v1/products?page=3")
        );
        assert_eq!(
            pagination.links.last,
            "http://localhost:9000/api/v1/products?page=3"
        );
    }

    #[test]
    fn pagination_of_empty_catalog() {
        let pagination = Pagination::new("http://localhost/api/v1/products", None, 1, 100, 0);
        assert_eq!(pagination.total_pages, 0);
        assert!(pagination.links.prev.is_none());
        assert!(pagination.links.next.is_none());
        assert_eq!(pagination.links.last, "http://localhost/api/v1/products?page=1");
    }

    #[test]
    fn search_links_keep_the_query() {
        let pagination =
            Pagination::new("http://localhost/api/v1/products/search", Some("gula pasir"), 1, 10, 11);
        assert_eq!(
            pagination.links.next.as_deref(),
            Some("http://localhost/api/v1/products/search?q=gula+pasir&page=2")
        );
    }

    #[test]
    fn create_product_input_is_validated() {
        let input = CreateProductInput {
            name: String::new(),
            sku: "SKU-1".into(),
            units: vec![UnitPricingInput::default()],
            ..CreateProductInput::default()
        };
        assert!(input.validate().is_err());

        let too_many_units = CreateProductInput {
            name: "Gula".into(),
            sku: "SKU-2".into(),
            units: vec![UnitPricingInput::default(); 4],
            ..CreateProductInput::default()
        };
        assert!(too_many_units.validate().is_err());
    }
}
