use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// Catalog product.
///
/// Each product is sold in up to three units of measure. Every unit slot has a
/// bulk price (used when more than two are bought) and a retail price.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize, ToSchema)]
#[sea_orm(table_name = "products")]
#[schema(as = Product)]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub name: String,
    #[sea_orm(unique)]
    pub sku: String,
    #[sea_orm(unique)]
    pub slug: String,
    pub unit_1: String,
    pub unit_2: String,
    pub unit_3: String,
    pub conversion_1: i32,
    pub conversion_2: i32,
    pub conversion_3: i32,
    #[sea_orm(column_type = "Decimal(Some((19, 4)))")]
    pub cost_price_1: Decimal,
    #[sea_orm(column_type = "Decimal(Some((19, 4)))")]
    pub cost_price_2: Decimal,
    #[sea_orm(column_type = "Decimal(Some((19, 4)))")]
    pub cost_price_3: Decimal,
    #[sea_orm(column_type = "Decimal(Some((19, 4)))")]
    pub bulk_price_1: Decimal,
    #[sea_orm(column_type = "Decimal(Some((19, 4)))")]
    pub bulk_price_2: Decimal,
    #[sea_orm(column_type = "Decimal(Some((19, 4)))")]
    pub bulk_price_3: Decimal,
    #[sea_orm(column_type = "Decimal(Some((19, 4)))")]
    pub retail_price_1: Decimal,
    #[sea_orm(column_type = "Decimal(Some((19, 4)))")]
    pub retail_price_2: Decimal,
    #[sea_orm(column_type = "Decimal(Some((19, 4)))")]
    pub retail_price_3: Decimal,
    pub stock: i32,
    #[sea_orm(nullable)]
    pub supplier: Option<String>,
    pub categories: String,
    #[sea_orm(column_type = "Decimal(Some((19, 4)))")]
    pub price: Decimal,
    /// Grams
    #[sea_orm(column_type = "Decimal(Some((10, 2)))")]
    pub weight: Decimal,
    #[sea_orm(nullable)]
    pub short_description: Option<String>,
    #[sea_orm(column_type = "Text", nullable)]
    pub description: Option<String>,
    pub status: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::commerce::cart_item::Entity")]
    CartItems,
    #[sea_orm(has_many = "super::order_item::Entity")]
    OrderItems,
}

impl Related<super::commerce::cart_item::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::CartItems.def()
    }
}

impl Related<super::order_item::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::OrderItems.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

/// One of the three unit-of-measure columns of a product
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitSlot {
    First,
    Second,
    Third,
}

impl Model {
    /// Finds the slot whose label equals `unit` exactly.
    pub fn unit_slot(&self, unit: &str) -> Option<UnitSlot> {
        if unit.is_empty() {
            return None;
        }
        [
            (UnitSlot::First, &self.unit_1),
            (UnitSlot::Second, &self.unit_2),
            (UnitSlot::Third, &self.unit_3),
        ]
        .into_iter()
        .find(|(_, label)| label.as_str() == unit)
        .map(|(slot, _)| slot)
    }

    pub fn bulk_price(&self, slot: UnitSlot) -> Decimal {
        match slot {
            UnitSlot::First => self.bulk_price_1,
            UnitSlot::Second => self.bulk_price_2,
            UnitSlot::Third => self.bulk_price_3,
        }
    }

    pub fn retail_price(&self, slot: UnitSlot) -> Decimal {
        match slot {
            UnitSlot::First => self.retail_price_1,
            UnitSlot::Second => self.retail_price_2,
            UnitSlot::Third => self.retail_price_3,
        }
    }
}
