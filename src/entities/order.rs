use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use utoipa::ToSchema;
use uuid::Uuid;

/// Order placed from a cart. Monetary fields are snapshots taken at checkout.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize, ToSchema)]
#[sea_orm(table_name = "orders")]
#[schema(as = Order)]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub cart_id: Uuid,
    pub status: i32,
    pub order_date: DateTime<Utc>,
    pub payment_due: DateTime<Utc>,
    pub payment_status: PaymentStatus,
    /// Payment page URL returned by the gateway
    #[sea_orm(nullable)]
    pub payment_token: Option<String>,
    #[sea_orm(column_type = "Decimal(Some((19, 4)))")]
    pub base_total_price: Decimal,
    #[sea_orm(column_type = "Decimal(Some((19, 4)))")]
    pub tax_amount: Decimal,
    #[sea_orm(column_type = "Decimal(Some((19, 4)))")]
    pub tax_percent: Decimal,
    #[sea_orm(column_type = "Decimal(Some((19, 4)))")]
    pub discount_amount: Decimal,
    #[sea_orm(column_type = "Decimal(Some((19, 4)))")]
    pub discount_percent: Decimal,
    #[sea_orm(column_type = "Decimal(Some((19, 4)))")]
    pub shipping_cost: Decimal,
    #[sea_orm(column_type = "Decimal(Some((19, 4)))")]
    pub grand_total: Decimal,
    pub delivery_mode: String,
    pub shipping_courier: String,
    pub shipping_service_name: String,
    #[sea_orm(nullable)]
    pub note: Option<String>,
    pub courier_status: CourierStatus,
    #[sea_orm(nullable)]
    pub tracking_id: Option<String>,
    #[sea_orm(nullable)]
    pub waybill_id: Option<String>,
    #[sea_orm(nullable)]
    pub courier_error: Option<String>,
    /// Courier order payload kept for registration retries
    #[sea_orm(column_type = "Json", nullable)]
    #[schema(value_type = Option<Object>)]
    pub courier_request: Option<Json>,
    #[sea_orm(nullable)]
    pub paid_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::order_item::Entity")]
    OrderItems,
    #[sea_orm(has_one = "super::order_customer::Entity")]
    Customer,
    #[sea_orm(has_many = "super::payment::Entity")]
    Payments,
}

impl Related<super::order_item::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::OrderItems.def()
    }
}

impl Related<super::order_customer::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Customer.def()
    }
}

impl Related<super::payment::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Payments.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

/// `Unpaid -> Paid` is the only transition.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    EnumIter,
    DeriveActiveEnum,
    ToSchema,
    Display,
    EnumString,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(20))")]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum PaymentStatus {
    #[sea_orm(string_value = "unpaid")]
    Unpaid,
    #[sea_orm(string_value = "paid")]
    Paid,
}

/// Delivery registration with the courier.
///
/// `AwaitingPayment -> Pending` once the payment link exists, then
/// `Pending -> Registering -> Registered`, or back to `Pending` on failure.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    EnumIter,
    DeriveActiveEnum,
    ToSchema,
    Display,
    EnumString,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(20))")]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum CourierStatus {
    /// Store pickup, nothing to register
    #[sea_orm(string_value = "not_required")]
    NotRequired,
    /// Saved, but no payment link yet; never sent to the courier
    #[sea_orm(string_value = "awaiting_payment")]
    AwaitingPayment,
    #[sea_orm(string_value = "pending")]
    Pending,
    /// Claimed by one sender while the courier call is in flight
    #[sea_orm(string_value = "registering")]
    Registering,
    #[sea_orm(string_value = "registered")]
    Registered,
}

/// Order workflow status stored in `status`
pub const ORDER_STATUS_PENDING: i32 = 0;
