use crate::{
    entities::{order, order_customer, order_item},
    errors::ServiceError,
    events::{Event, EventSender},
    services::shipping::{CourierOrderRequest, ShippingService},
};
use chrono::Utc;
use sea_orm::{
    sea_query::Expr, ActiveEnum, ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait,
    QueryFilter, QueryOrder, QuerySelect, Set,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{error, info, instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;

/// Pending registrations handled per worker pass
const RETRY_BATCH_SIZE: u64 = 50;

/// Order with its snapshot lines and shipping address
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct OrderDetails {
    pub order: order::Model,
    pub items: Vec<order_item::Model>,
    pub customer: Option<order_customer::Model>,
}

/// Order reads and courier registration.
#[derive(Clone)]
pub struct OrderService {
    db: Arc<DatabaseConnection>,
    event_sender: Arc<EventSender>,
    shipping: ShippingService,
}

impl OrderService {
    pub fn new(
        db: Arc<DatabaseConnection>,
        event_sender: Arc<EventSender>,
        shipping: ShippingService,
    ) -> Self {
        Self {
            db,
            event_sender,
            shipping,
        }
    }

    async fn find_order(&self, order_id: Uuid) -> Result<order::Model, ServiceError> {
        order::Entity::find_by_id(order_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_id)))
    }

    /// Order placed from `cart_key`; other carts' orders read as missing.
    async fn find_owned_order(
        &self,
        order_id: Uuid,
        cart_key: Uuid,
    ) -> Result<order::Model, ServiceError> {
        order::Entity::find_by_id(order_id)
            .filter(order::Column::CartId.eq(cart_key))
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_id)))
    }

    #[instrument(skip(self))]
    pub async fn get_order(
        &self,
        order_id: Uuid,
        cart_key: Uuid,
    ) -> Result<OrderDetails, ServiceError> {
        let order = self.find_owned_order(order_id, cart_key).await?;

        let items = order_item::Entity::find()
            .filter(order_item::Column::OrderId.eq(order_id))
            .order_by_asc(order_item::Column::CreatedAt)
            .all(&*self.db)
            .await?;

        let customer = order_customer::Entity::find()
            .filter(order_customer::Column::OrderId.eq(order_id))
            .one(&*self.db)
            .await?;

        Ok(OrderDetails {
            order,
            items,
            customer,
        })
    }

    /// Sends the stored courier request for a pending order.
    ///
    /// Orders that are not pending come back unchanged, and so does an order
    /// another caller claimed first. A courier failure is recorded on the order,
    /// which goes back to pending; it is not an error here.
    #[instrument(skip(self, order), fields(order_id = %order.id))]
    pub async fn register_courier(&self, order: order::Model) -> Result<order::Model, ServiceError> {
        if order.courier_status != order::CourierStatus::Pending {
            return Ok(order);
        }

        let request: CourierOrderRequest = match order.courier_request.clone() {
            Some(raw) => serde_json::from_value(raw)?,
            None => {
                return Err(ServiceError::InternalError(format!(
                    "order {} has no courier request to send",
                    order.id
                )))
            }
        };

        let order_id = order.id;
        if !self.claim_registration(order_id).await? {
            info!("courier registration already claimed");
            return self.find_order(order_id).await;
        }

        let mut active: order::ActiveModel = order.into();
        active.updated_at = Set(Utc::now());

        match self.shipping.register_courier_order(&request).await {
            Ok(response) => {
                let tracking_id = response.courier.tracking_id.clone().unwrap_or_default();
                active.courier_status = Set(order::CourierStatus::Registered);
                active.tracking_id = Set(response.courier.tracking_id);
                active.waybill_id = Set(response.courier.waybill_id);
                active.courier_error = Set(None);
                let updated = active.update(&*self.db).await?;

                metrics::counter!("storefront.courier.registrations", 1, "result" => "registered");
                self.event_sender
                    .send_or_log(Event::CourierRegistered {
                        order_id,
                        tracking_id,
                    })
                    .await;
                Ok(updated)
            }
            Err(err) => {
                let reason = err.to_string();
                warn!(error = %reason, "courier registration failed, order stays pending");
                active.courier_status = Set(order::CourierStatus::Pending);
                active.courier_error = Set(Some(reason.clone()));
                let updated = active.update(&*self.db).await?;

                metrics::counter!("storefront.courier.registrations", 1, "result" => "pending");
                self.event_sender
                    .send_or_log(Event::CourierRegistrationPending { order_id, reason })
                    .await;
                Ok(updated)
            }
        }
    }

    /// Moves a payable pending order to `registering`; false when someone else got it.
    async fn claim_registration(&self, order_id: Uuid) -> Result<bool, ServiceError> {
        let result = order::Entity::update_many()
            .col_expr(
                order::Column::CourierStatus,
                Expr::value(order::CourierStatus::Registering.to_value()),
            )
            .col_expr(order::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(order::Column::Id.eq(order_id))
            .filter(order::Column::CourierStatus.eq(order::CourierStatus::Pending))
            .filter(order::Column::PaymentToken.is_not_null())
            .exec(&*self.db)
            .await?;
        Ok(result.rows_affected == 1)
    }

    #[instrument(skip(self))]
    pub async fn retry_courier_registration(
        &self,
        order_id: Uuid,
        cart_key: Uuid,
    ) -> Result<order::Model, ServiceError> {
        let order = self.find_owned_order(order_id, cart_key).await?;
        self.register_courier(order).await
    }

    /// One pass over pending registrations; returns how many got registered.
    pub async fn retry_pending_registrations(&self) -> Result<usize, ServiceError> {
        let pending = order::Entity::find()
            .filter(order::Column::CourierStatus.eq(order::CourierStatus::Pending))
            .filter(order::Column::CourierRequest.is_not_null())
            .filter(order::Column::PaymentToken.is_not_null())
            .order_by_asc(order::Column::CreatedAt)
            .limit(RETRY_BATCH_SIZE)
            .all(&*self.db)
            .await?;

        let mut registered = 0;
        for order in pending {
            let updated = self.register_courier(order).await?;
            if updated.courier_status == order::CourierStatus::Registered {
                registered += 1;
            }
        }
        Ok(registered)
    }

    /// Background worker re-sending pending courier registrations.
    pub fn start_retry_worker(self, interval: Duration) -> Option<JoinHandle<()>> {
        if interval.is_zero() {
            info!("Courier registration retry worker disabled");
            return None;
        }

        Some(tokio::spawn(async move {
            loop {
                sleep(interval).await;
                match self.retry_pending_registrations().await {
                    Ok(0) => {}
                    Ok(count) => info!(count, "pending courier registrations completed"),
                    Err(e) => error!("courier retry worker error: {}", e),
                }
            }
        }))
    }
}
