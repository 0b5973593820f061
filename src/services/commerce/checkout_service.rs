use crate::{
    config::AppConfig,
    entities::{order, order_customer, order_item},
    errors::ServiceError,
    events::{Event, EventSender},
    services::{
        commerce::cart_service::{CartService, CartWithItems},
        orders::OrderService,
        payments::{PaymentCustomer, PaymentGateway, PaymentRequest},
        shipping::{
            option_fee, select_option, Coordinate, DeliveryMode, DeliverySelection,
            ShippingService, PICKUP_COURIER,
        },
    },
};
use chrono::{Duration, Utc};
use rust_decimal::Decimal;
use sea_orm::{ActiveModelTrait, DatabaseConnection, Set, TransactionTrait};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

/// Checkout form
#[derive(Debug, Clone, Default, Deserialize, Serialize, Validate, ToSchema)]
pub struct CheckoutInput {
    /// Courier code, e.g. `jne`; `pickup` selects store pickup
    #[serde(default)]
    pub courier: Option<String>,
    /// Courier name of the chosen quote option, e.g. `JNE`
    #[serde(default)]
    pub shipping_package: Option<String>,
    #[serde(default)]
    pub city_id: Option<String>,
    /// `regular`, `instant` or `pickup`
    #[serde(default)]
    pub cour_type: Option<String>,
    #[serde(default)]
    pub latitude: Option<String>,
    #[serde(default)]
    pub longitude: Option<String>,
    #[validate(length(min = 1, max = 100))]
    pub first_name: String,
    #[serde(default)]
    #[validate(length(max = 100))]
    pub last_name: String,
    #[serde(default)]
    pub province_id: String,
    #[validate(length(min = 1, max = 255))]
    pub address1: String,
    #[serde(default)]
    pub address2: Option<String>,
    #[validate(length(min = 6, max = 20))]
    pub phone: String,
    #[validate(email)]
    pub email: String,
    #[serde(default)]
    pub post_code: String,
    #[serde(default)]
    pub note: Option<String>,
}

impl CheckoutInput {
    pub fn delivery_mode(&self) -> DeliveryMode {
        DeliveryMode::from_form(self.cour_type.as_deref(), self.courier.as_deref())
    }

    pub fn selection(&self) -> DeliverySelection {
        DeliverySelection {
            mode: self.delivery_mode(),
            city_id: self.city_id.clone().unwrap_or_default(),
            courier: self.courier.clone().unwrap_or_default(),
            latitude: self.latitude.clone(),
            longitude: self.longitude.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CheckoutResult {
    pub order: order::Model,
    pub payment_url: Option<String>,
    pub tracking_id: Option<String>,
    pub notice: String,
    pub redirect_to: String,
}

/// Shipping decision made at checkout
struct ShippingChoice {
    fee: Decimal,
    courier_name: String,
    service_name: String,
    courier_company: String,
}

/// Turns the session cart into an order.
///
/// The order and its snapshot rows are written in one transaction. The payment
/// page and the courier registration follow; a courier failure leaves the order
/// pending registration instead of failing the checkout. An order whose payment
/// link could not be created is never sent to the courier.
#[derive(Clone)]
pub struct CheckoutService {
    db: Arc<DatabaseConnection>,
    config: Arc<AppConfig>,
    event_sender: Arc<EventSender>,
    carts: CartService,
    shipping: ShippingService,
    orders: OrderService,
    gateway: Arc<dyn PaymentGateway>,
}

impl CheckoutService {
    pub fn new(
        db: Arc<DatabaseConnection>,
        config: Arc<AppConfig>,
        event_sender: Arc<EventSender>,
        carts: CartService,
        shipping: ShippingService,
        orders: OrderService,
        gateway: Arc<dyn PaymentGateway>,
    ) -> Self {
        Self {
            db,
            config,
            event_sender,
            carts,
            shipping,
            orders,
            gateway,
        }
    }

    #[instrument(skip(self, input), fields(mode = %input.delivery_mode()))]
    pub async fn checkout(
        &self,
        cart_key: Uuid,
        input: CheckoutInput,
    ) -> Result<CheckoutResult, ServiceError> {
        input.validate()?;

        let cart = self.carts.get_cart(cart_key).await?;
        if cart.is_empty() {
            return Err(ServiceError::ValidationError("cart is empty".to_string()));
        }

        let selection = input.selection();
        let destination = match selection.mode {
            DeliveryMode::Instant => Some(selection.coordinate()?),
            _ => None,
        };

        let choice = self.choose_shipping(&cart, &selection, &input).await?;
        let grand_total = cart.cart.grand_total + choice.fee;

        let order = self
            .persist_order(&cart, &input, &selection, destination, &choice, grand_total)
            .await?;
        self.event_sender
            .send_or_log(Event::OrderCreated(order.id))
            .await;

        let order = self.attach_payment_link(order, &input, grand_total).await?;
        let payment_url = order.payment_token.clone();

        let order = self.orders.register_courier(order).await?;

        self.carts.clear_cart(cart_key).await?;

        let tracking_id = order.tracking_id.clone();
        let notice = match &tracking_id {
            Some(tracking) => format!("Order saved successfully {}", tracking),
            None => "Order saved successfully".to_string(),
        };

        info!(order_id = %order.id, %grand_total, "checkout completed");
        Ok(CheckoutResult {
            redirect_to: format!("/orders/{}", order.id),
            order,
            payment_url,
            tracking_id,
            notice,
        })
    }

    async fn choose_shipping(
        &self,
        cart: &CartWithItems,
        selection: &DeliverySelection,
        input: &CheckoutInput,
    ) -> Result<ShippingChoice, ServiceError> {
        if selection.mode == DeliveryMode::Pickup {
            return Ok(ShippingChoice {
                fee: Decimal::ZERO,
                courier_name: PICKUP_COURIER.to_string(),
                service_name: PICKUP_COURIER.to_string(),
                courier_company: "pickup".to_string(),
            });
        }

        let label = input.shipping_package.as_deref().unwrap_or_default();
        let quote = self
            .shipping
            .quote(cart.cart.total_weight, selection)
            .await?;
        let chosen = select_option(&quote.pricing, label)?;

        Ok(ShippingChoice {
            fee: option_fee(chosen),
            courier_name: chosen.courier_name.clone(),
            service_name: chosen.courier_service_name.clone(),
            courier_company: chosen
                .company
                .clone()
                .filter(|c| !c.is_empty())
                .unwrap_or_else(|| selection.courier.clone()),
        })
    }

    async fn persist_order(
        &self,
        cart: &CartWithItems,
        input: &CheckoutInput,
        selection: &DeliverySelection,
        destination: Option<Coordinate>,
        choice: &ShippingChoice,
        grand_total: Decimal,
    ) -> Result<order::Model, ServiceError> {
        let now = Utc::now();
        let order_id = Uuid::new_v4();
        let totals = &cart.cart;

        let items: Vec<order_item::Model> = cart
            .items
            .iter()
            .map(|line| order_item::Model {
                id: Uuid::new_v4(),
                order_id,
                product_id: line.item.product_id,
                qty: line.item.qty,
                unit: line.item.unit.clone(),
                base_price: line.item.base_price,
                base_total: line.item.base_total,
                tax_amount: line.item.tax_amount,
                tax_percent: line.item.tax_percent,
                discount_amount: line.item.discount_amount,
                discount_percent: line.item.discount_percent,
                sub_total: line.item.sub_total,
                sku: line.product_sku.clone().unwrap_or_default(),
                name: line.product_name.clone().unwrap_or_default(),
                weight: line.product_weight.unwrap_or_default(),
                created_at: now,
            })
            .collect();

        let customer = order_customer::Model {
            id: Uuid::new_v4(),
            order_id,
            first_name: input.first_name.trim().to_string(),
            last_name: input.last_name.trim().to_string(),
            city_id: selection.city_id.clone(),
            province_id: input.province_id.clone(),
            address1: input.address1.trim().to_string(),
            address2: input.address2.clone().filter(|a| !a.trim().is_empty()),
            phone: input.phone.trim().to_string(),
            email: input.email.trim().to_string(),
            post_code: input.post_code.trim().to_string(),
            created_at: now,
        };

        let (courier_status, courier_request) = match selection.mode {
            DeliveryMode::Pickup => (order::CourierStatus::NotRequired, None),
            mode => {
                let request = self.shipping.build_courier_order(
                    &order_id.to_string(),
                    mode,
                    &choice.courier_company,
                    &customer,
                    destination,
                    &items,
                );
                (
                    order::CourierStatus::AwaitingPayment,
                    Some(serde_json::to_value(&request)?),
                )
            }
        };

        let txn = self.db.begin().await?;

        let order = order::ActiveModel {
            id: Set(order_id),
            cart_id: Set(totals.id),
            status: Set(order::ORDER_STATUS_PENDING),
            order_date: Set(now),
            payment_due: Set(now + Duration::days(self.config.payment.due_days)),
            payment_status: Set(order::PaymentStatus::Unpaid),
            payment_token: Set(None),
            base_total_price: Set(totals.base_total_price),
            tax_amount: Set(totals.tax_amount),
            tax_percent: Set(totals.tax_percent),
            discount_amount: Set(totals.discount_amount),
            discount_percent: Set(totals.discount_percent),
            shipping_cost: Set(choice.fee),
            grand_total: Set(grand_total),
            delivery_mode: Set(selection.mode.to_string()),
            shipping_courier: Set(choice.courier_name.clone()),
            shipping_service_name: Set(choice.service_name.clone()),
            note: Set(input.note.clone()),
            courier_status: Set(courier_status),
            tracking_id: Set(None),
            waybill_id: Set(None),
            courier_error: Set(None),
            courier_request: Set(courier_request),
            paid_at: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&txn)
        .await?;

        for item in items {
            order_item::ActiveModel::from(item)
                .reset_all()
                .insert(&txn)
                .await?;
        }
        order_customer::ActiveModel::from(customer)
            .reset_all()
            .insert(&txn)
            .await?;

        txn.commit().await?;
        Ok(order)
    }

    /// Creates the hosted payment page and stores its URL on the order.
    ///
    /// Only a payable order is released for courier registration.
    async fn attach_payment_link(
        &self,
        order: order::Model,
        input: &CheckoutInput,
        grand_total: Decimal,
    ) -> Result<order::Model, ServiceError> {
        let request = PaymentRequest {
            order_id: order.id.to_string(),
            gross_amount: grand_total,
            customer: PaymentCustomer {
                first_name: input.first_name.trim().to_string(),
                last_name: input.last_name.trim().to_string(),
                email: input.email.trim().to_string(),
                phone: input.phone.trim().to_string(),
            },
        };

        let link = self.gateway.create_transaction(&request).await.map_err(|e| {
            warn!(order_id = %order.id, error = %e, "payment link creation failed");
            e
        })?;

        let release = order.courier_status == order::CourierStatus::AwaitingPayment;
        let mut active: order::ActiveModel = order.into();
        active.payment_token = Set(Some(link.redirect_url));
        if release {
            active.courier_status = Set(order::CourierStatus::Pending);
        }
        active.updated_at = Set(Utc::now());
        Ok(active.update(&*self.db).await?)
    }
}
