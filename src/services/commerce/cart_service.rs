use crate::{
    config::CartConfig,
    entities::commerce::{cart, cart_item},
    entities::product,
    errors::ServiceError,
    events::{Event, EventSender},
};
use chrono::Utc;
use metrics::counter;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, QueryFilter,
    QueryOrder, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

/// Quantities above this use the bulk price tier
pub const BULK_THRESHOLD: i32 = 2;
/// Largest quantity a single cart line may hold
pub const MAX_LINE_QTY: i32 = 10_000;

/// Session cart management.
///
/// Carts are addressed by the cart key stored in the caller's session and are
/// created lazily on first access. Every mutation ends with a recalculation, so
/// the stored totals always reflect the current lines.
#[derive(Clone)]
pub struct CartService {
    db: Arc<DatabaseConnection>,
    event_sender: Arc<EventSender>,
    config: CartConfig,
}

impl CartService {
    pub fn new(
        db: Arc<DatabaseConnection>,
        event_sender: Arc<EventSender>,
        config: CartConfig,
    ) -> Self {
        Self {
            db,
            event_sender,
            config,
        }
    }

    /// Loads the cart for `cart_key`, creating an empty one on first use.
    ///
    /// Two requests racing on a fresh key both try the insert; the loser
    /// re-reads the winner's row.
    #[instrument(skip(self))]
    pub async fn get_or_create(&self, cart_key: Uuid) -> Result<cart::Model, ServiceError> {
        if let Some(cart) = cart::Entity::find_by_id(cart_key).one(&*self.db).await? {
            return Ok(cart);
        }

        let now = Utc::now();
        let cart = cart::ActiveModel {
            id: Set(cart_key),
            base_total_price: Set(Decimal::ZERO),
            tax_amount: Set(Decimal::ZERO),
            tax_percent: Set(self.config.tax_percent),
            discount_amount: Set(Decimal::ZERO),
            discount_percent: Set(self.config.discount_percent),
            grand_total: Set(Decimal::ZERO),
            total_weight: Set(0),
            created_at: Set(now),
            updated_at: Set(now),
        };

        match cart.insert(&*self.db).await {
            Ok(cart) => {
                self.event_sender
                    .send_or_log(Event::CartCreated(cart_key))
                    .await;
                info!("Created cart: {}", cart_key);
                Ok(cart)
            }
            Err(insert_err) => {
                warn!(error = %insert_err, "cart insert failed, re-reading");
                cart::Entity::find_by_id(cart_key)
                    .one(&*self.db)
                    .await?
                    .ok_or(ServiceError::DatabaseError(insert_err))
            }
        }
    }

    /// Returns the cart with freshly recalculated totals.
    #[instrument(skip(self))]
    pub async fn get_cart(&self, cart_key: Uuid) -> Result<CartWithItems, ServiceError> {
        self.get_or_create(cart_key).await?;
        let txn = self.db.begin().await?;
        let cart = self.recalculate(&txn, cart_key).await?;
        txn.commit().await?;
        self.load_view(cart).await
    }

    /// Adds a product line, or grows the matching line for the same product and unit.
    ///
    /// The price tier is picked from the requested quantity when the line is
    /// created: more than two units use the bulk price of the chosen unit slot,
    /// otherwise the retail price. Merged lines keep their original price.
    #[instrument(skip(self))]
    pub async fn add_item(
        &self,
        cart_key: Uuid,
        input: AddToCartInput,
    ) -> Result<CartWithItems, ServiceError> {
        input.validate()?;
        self.get_or_create(cart_key).await?;

        let txn = self.db.begin().await?;

        let product = product::Entity::find_by_id(input.product_id)
            .one(&txn)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Product {} not found", input.product_id))
            })?;

        check_line_quantity(&product, input.qty)?;

        let slot = product
            .unit_slot(&input.unit)
            .ok_or_else(|| ServiceError::InvalidUnit(input.unit.clone()))?;
        let price = if input.qty > BULK_THRESHOLD {
            product.bulk_price(slot)
        } else {
            product.retail_price(slot)
        };

        let existing = cart_item::Entity::find()
            .filter(cart_item::Column::CartId.eq(cart_key))
            .filter(cart_item::Column::ProductId.eq(product.id))
            .filter(cart_item::Column::Unit.eq(input.unit.as_str()))
            .one(&txn)
            .await?;

        let now = Utc::now();
        let item_id = match existing {
            Some(item) => {
                let item_id = item.id;
                let quantity = item.qty + input.qty;
                check_line_quantity(&product, quantity)?;
                let mut item: cart_item::ActiveModel = item.into();
                item.qty = Set(quantity);
                item.updated_at = Set(now);
                item.update(&txn).await?;
                item_id
            }
            None => {
                let line = LineAmounts::compute(
                    price,
                    input.qty,
                    self.config.tax_percent,
                    self.config.discount_percent,
                );
                let item = cart_item::ActiveModel {
                    id: Set(Uuid::new_v4()),
                    cart_id: Set(cart_key),
                    product_id: Set(product.id),
                    qty: Set(input.qty),
                    unit: Set(input.unit.clone()),
                    base_price: Set(price),
                    base_total: Set(line.base_total),
                    tax_amount: Set(line.tax_amount),
                    tax_percent: Set(self.config.tax_percent),
                    discount_amount: Set(line.discount_amount),
                    discount_percent: Set(self.config.discount_percent),
                    sub_total: Set(line.sub_total),
                    created_at: Set(now),
                    updated_at: Set(now),
                };
                item.insert(&txn).await?.id
            }
        };

        let cart = self.recalculate(&txn, cart_key).await?;
        txn.commit().await?;

        counter!("storefront.cart.items_added", 1);
        self.event_sender
            .send_or_log(Event::CartItemAdded {
                cart_id: cart_key,
                item_id,
                product_id: product.id,
                quantity: input.qty,
            })
            .await;

        info!(
            "Added item to cart {}: product {} x{} {}",
            cart_key, product.id, input.qty, input.unit
        );
        self.load_view(cart).await
    }

    /// Sets a line's quantity. Non-positive quantities leave the cart untouched.
    #[instrument(skip(self))]
    pub async fn update_item_quantity(
        &self,
        cart_key: Uuid,
        item_id: Uuid,
        qty: i32,
    ) -> Result<CartWithItems, ServiceError> {
        self.update_items(cart_key, &[ItemQuantity { item_id, qty }])
            .await
    }

    /// Applies several quantity changes in one transaction.
    #[instrument(skip(self, updates), fields(count = updates.len()))]
    pub async fn update_items(
        &self,
        cart_key: Uuid,
        updates: &[ItemQuantity],
    ) -> Result<CartWithItems, ServiceError> {
        self.get_or_create(cart_key).await?;
        let txn = self.db.begin().await?;

        let mut changed = Vec::new();
        for update in updates.iter().filter(|u| u.qty > 0) {
            let (item, product) = cart_item::Entity::find_by_id(update.item_id)
                .filter(cart_item::Column::CartId.eq(cart_key))
                .find_also_related(product::Entity)
                .one(&txn)
                .await?
                .ok_or_else(|| {
                    ServiceError::NotFound(format!("Cart item {} not found", update.item_id))
                })?;
            let product = product.ok_or_else(|| {
                ServiceError::NotFound(format!("Product {} not found", item.product_id))
            })?;
            check_line_quantity(&product, update.qty)?;

            let mut item: cart_item::ActiveModel = item.into();
            item.qty = Set(update.qty);
            item.updated_at = Set(Utc::now());
            item.update(&txn).await?;
            changed.push(update.clone());
        }

        let cart = self.recalculate(&txn, cart_key).await?;
        txn.commit().await?;

        for update in changed {
            self.event_sender
                .send_or_log(Event::CartItemUpdated {
                    cart_id: cart_key,
                    item_id: update.item_id,
                    quantity: update.qty,
                })
                .await;
        }

        self.load_view(cart).await
    }

    /// Deletes a line; `NotFound` when the line is not in this cart.
    #[instrument(skip(self))]
    pub async fn remove_item(
        &self,
        cart_key: Uuid,
        item_id: Uuid,
    ) -> Result<CartWithItems, ServiceError> {
        let txn = self.db.begin().await?;

        let result = cart_item::Entity::delete_many()
            .filter(cart_item::Column::Id.eq(item_id))
            .filter(cart_item::Column::CartId.eq(cart_key))
            .exec(&txn)
            .await?;

        if result.rows_affected == 0 {
            return Err(ServiceError::NotFound(format!(
                "Cart item {} not found",
                item_id
            )));
        }

        let cart = self.recalculate(&txn, cart_key).await?;
        txn.commit().await?;

        self.event_sender
            .send_or_log(Event::CartItemRemoved {
                cart_id: cart_key,
                item_id,
            })
            .await;

        self.load_view(cart).await
    }

    /// Empties the cart and resets its totals.
    #[instrument(skip(self))]
    pub async fn clear_cart(&self, cart_key: Uuid) -> Result<CartWithItems, ServiceError> {
        self.get_or_create(cart_key).await?;
        let txn = self.db.begin().await?;
        let cart = self.clear_with(&txn, cart_key).await?;
        txn.commit().await?;

        info!("Cleared cart: {}", cart_key);
        self.load_view(cart).await
    }

    /// Clears inside a caller-owned transaction (used by checkout).
    pub async fn clear_with<C: ConnectionTrait>(
        &self,
        conn: &C,
        cart_key: Uuid,
    ) -> Result<cart::Model, ServiceError> {
        cart_item::Entity::delete_many()
            .filter(cart_item::Column::CartId.eq(cart_key))
            .exec(conn)
            .await?;
        let cart = self.recalculate(conn, cart_key).await?;

        self.event_sender
            .send_or_log(Event::CartCleared(cart_key))
            .await;
        Ok(cart)
    }

    /// Recomputes every line and the cart totals from the stored prices.
    pub async fn recalculate<C: ConnectionTrait>(
        &self,
        conn: &C,
        cart_key: Uuid,
    ) -> Result<cart::Model, ServiceError> {
        let lines = cart_item::Entity::find()
            .filter(cart_item::Column::CartId.eq(cart_key))
            .find_also_related(product::Entity)
            .all(conn)
            .await?;

        let tax_percent = self.config.tax_percent;
        let discount_percent = self.config.discount_percent;
        let mut totals = CartTotals::default();

        for (item, product) in lines {
            let line = LineAmounts::compute(item.base_price, item.qty, tax_percent, discount_percent);
            let unit_weight = product.as_ref().map(|p| p.weight).unwrap_or_default();
            totals.add(&line, item.qty, unit_weight)?;

            if line != LineAmounts::stored(&item)
                || item.tax_percent != tax_percent
                || item.discount_percent != discount_percent
            {
                let mut active: cart_item::ActiveModel = item.into();
                active.base_total = Set(line.base_total);
                active.tax_amount = Set(line.tax_amount);
                active.tax_percent = Set(tax_percent);
                active.discount_amount = Set(line.discount_amount);
                active.discount_percent = Set(discount_percent);
                active.sub_total = Set(line.sub_total);
                active.update(conn).await?;
            }
        }

        let cart = cart::Entity::find_by_id(cart_key)
            .one(conn)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Cart {} not found", cart_key)))?;

        let mut cart: cart::ActiveModel = cart.into();
        cart.base_total_price = Set(totals.base_total_price);
        cart.tax_amount = Set(totals.tax_amount);
        cart.tax_percent = Set(tax_percent);
        cart.discount_amount = Set(totals.discount_amount);
        cart.discount_percent = Set(discount_percent);
        cart.grand_total = Set(totals.grand_total);
        cart.total_weight = Set(totals.total_weight);
        cart.updated_at = Set(Utc::now());
        Ok(cart.update(conn).await?)
    }

    async fn load_view(&self, cart: cart::Model) -> Result<CartWithItems, ServiceError> {
        let lines = cart_item::Entity::find()
            .filter(cart_item::Column::CartId.eq(cart.id))
            .order_by_asc(cart_item::Column::CreatedAt)
            .find_also_related(product::Entity)
            .all(&*self.db)
            .await?;

        let items = lines
            .into_iter()
            .map(|(item, product)| CartLine::new(item, product.as_ref()))
            .collect();

        Ok(CartWithItems { cart, items })
    }
}

/// Monetary amounts of one cart line
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LineAmounts {
    pub base_total: Decimal,
    pub tax_amount: Decimal,
    pub discount_amount: Decimal,
    pub sub_total: Decimal,
}

impl LineAmounts {
    pub fn compute(
        price: Decimal,
        qty: i32,
        tax_percent: Decimal,
        discount_percent: Decimal,
    ) -> Self {
        let hundred = Decimal::ONE_HUNDRED;
        let base_total = price * Decimal::from(qty);
        let tax_amount = base_total * tax_percent / hundred;
        let discount_amount = base_total * discount_percent / hundred;
        Self {
            base_total,
            tax_amount,
            discount_amount,
            sub_total: base_total + tax_amount - discount_amount,
        }
    }

    fn stored(item: &cart_item::Model) -> Self {
        Self {
            base_total: item.base_total,
            tax_amount: item.tax_amount,
            discount_amount: item.discount_amount,
            sub_total: item.sub_total,
        }
    }
}

/// Running cart totals
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CartTotals {
    pub base_total_price: Decimal,
    pub tax_amount: Decimal,
    pub discount_amount: Decimal,
    pub grand_total: Decimal,
    pub total_weight: i32,
}

impl CartTotals {
    /// Weight counts each unit rounded up to a whole gram.
    pub fn add(
        &mut self,
        line: &LineAmounts,
        qty: i32,
        unit_weight: Decimal,
    ) -> Result<(), ServiceError> {
        let grams = unit_weight.ceil().to_i32().unwrap_or_default();
        self.total_weight = qty
            .checked_mul(grams)
            .and_then(|weight| self.total_weight.checked_add(weight))
            .ok_or_else(|| {
                ServiceError::ValidationError("cart weight is too large to ship".to_string())
            })?;
        self.base_total_price += line.base_total;
        self.tax_amount += line.tax_amount;
        self.discount_amount += line.discount_amount;
        self.grand_total += line.sub_total;
        Ok(())
    }
}

/// Bounds a line quantity and checks it against the product's stock.
fn check_line_quantity(product: &product::Model, qty: i32) -> Result<(), ServiceError> {
    if qty > MAX_LINE_QTY {
        return Err(ServiceError::ValidationError(format!(
            "quantity {} exceeds the maximum of {} per line",
            qty, MAX_LINE_QTY
        )));
    }
    if qty > product.stock {
        return Err(ServiceError::InsufficientStock(format!(
            "requested {} of {} but only {} left",
            qty, product.name, product.stock
        )));
    }
    Ok(())
}

#[derive(Debug, Clone, Deserialize, Serialize, Validate, ToSchema)]
pub struct AddToCartInput {
    pub product_id: Uuid,
    #[validate(range(min = 1, max = 10000))]
    pub qty: i32,
    /// One of the product's unit labels, e.g. `PCS`
    #[validate(length(min = 1))]
    pub unit: String,
}

#[derive(Debug, Clone, Deserialize, Serialize, ToSchema)]
pub struct ItemQuantity {
    pub item_id: Uuid,
    pub qty: i32,
}

/// Cart line joined with its product
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CartLine {
    #[serde(flatten)]
    pub item: cart_item::Model,
    pub product_name: Option<String>,
    pub product_sku: Option<String>,
    pub product_slug: Option<String>,
    #[schema(value_type = Option<String>)]
    pub product_weight: Option<Decimal>,
}

impl CartLine {
    fn new(item: cart_item::Model, product: Option<&product::Model>) -> Self {
        Self {
            item,
            product_name: product.map(|p| p.name.clone()),
            product_sku: product.map(|p| p.sku.clone()),
            product_slug: product.map(|p| p.slug.clone()),
            product_weight: product.map(|p| p.weight),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CartWithItems {
    pub cart: cart::Model,
    pub items: Vec<CartLine>,
}

impl CartWithItems {
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}
