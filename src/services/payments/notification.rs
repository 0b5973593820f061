use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    sea_query::Expr, ActiveEnum, ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait,
    QueryFilter, Set,
};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha512};
use std::str::FromStr;
use std::sync::Arc;
use tracing::{info, instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    config::AppConfig,
    entities::{order, payment},
    errors::ServiceError,
    events::{Event, EventSender},
};

pub const CREDIT_CARD: &str = "credit_card";
pub const STATUS_CAPTURE: &str = "capture";
pub const STATUS_SETTLEMENT: &str = "settlement";
pub const FRAUD_ACCEPT: &str = "accept";

/// Asynchronous payment notification posted by the gateway
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct PaymentNotification {
    pub order_id: String,
    #[serde(default)]
    pub status_code: String,
    #[serde(default)]
    pub gross_amount: String,
    #[serde(default)]
    pub signature_key: String,
    #[serde(default)]
    pub transaction_id: String,
    #[serde(default)]
    pub transaction_status: String,
    #[serde(default)]
    pub fraud_status: String,
    #[serde(default)]
    pub payment_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transaction_time: Option<String>,
}

impl PaymentNotification {
    /// Credit cards settle on `capture`, everything else on `settlement`;
    /// both need the fraud check to accept.
    pub fn is_success(&self) -> bool {
        let expected_status = if self.payment_type == CREDIT_CARD {
            STATUS_CAPTURE
        } else {
            STATUS_SETTLEMENT
        };
        self.transaction_status == expected_status && self.fraud_status == FRAUD_ACCEPT
    }
}

/// Hex SHA-512 of `order_id + status_code + gross_amount + server_key`
pub fn notification_signature(
    order_id: &str,
    status_code: &str,
    gross_amount: &str,
    server_key: &str,
) -> String {
    let mut hasher = Sha512::new();
    hasher.update(order_id.as_bytes());
    hasher.update(status_code.as_bytes());
    hasher.update(gross_amount.as_bytes());
    hasher.update(server_key.as_bytes());
    hex::encode(hasher.finalize())
}

fn constant_time_eq(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut res = 0u8;
    for (x, y) in a.as_bytes().iter().zip(b.as_bytes()) {
        res |= x ^ y;
    }
    res == 0
}

pub fn verify_signature(notification: &PaymentNotification, server_key: &str) -> bool {
    let expected = notification_signature(
        &notification.order_id,
        &notification.status_code,
        &notification.gross_amount,
        server_key,
    );
    constant_time_eq(&expected, &notification.signature_key.to_ascii_lowercase())
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct NotificationOutcome {
    pub order_id: Uuid,
    pub payment_id: Uuid,
    /// True when this notification moved the order to paid
    pub paid: bool,
}

#[derive(Clone)]
pub struct PaymentService {
    db: Arc<DatabaseConnection>,
    config: Arc<AppConfig>,
    event_sender: Arc<EventSender>,
}

impl PaymentService {
    pub fn new(
        db: Arc<DatabaseConnection>,
        config: Arc<AppConfig>,
        event_sender: Arc<EventSender>,
    ) -> Self {
        Self {
            db,
            config,
            event_sender,
        }
    }

    /// Verifies, records and applies one gateway notification.
    ///
    /// The notification is stored before the order is looked at again, so a
    /// duplicate for an already paid order still leaves an audit row and then
    /// fails with [`ServiceError::AlreadyPaid`].
    #[instrument(skip(self, notification), fields(order_id = %notification.order_id, status = %notification.transaction_status))]
    pub async fn handle_notification(
        &self,
        notification: &PaymentNotification,
    ) -> Result<NotificationOutcome, ServiceError> {
        if !self.config.is_development()
            && !verify_signature(notification, &self.config.payment.server_key)
        {
            warn!("payment notification signature mismatch");
            metrics::counter!("storefront.payments.rejected", 1, "reason" => "signature");
            return Err(ServiceError::InvalidSignature);
        }

        let not_found =
            || ServiceError::NotFound(format!("Order {} not found", notification.order_id));
        let order_id = Uuid::parse_str(notification.order_id.trim()).map_err(|_| not_found())?;
        let order = order::Entity::find_by_id(order_id)
            .one(&*self.db)
            .await?
            .ok_or_else(not_found)?;

        let amount = Decimal::from_str(notification.gross_amount.trim()).map_err(|_| {
            ServiceError::ValidationError(format!(
                "invalid gross_amount: {}",
                notification.gross_amount
            ))
        })?;

        let payment_id = Uuid::new_v4();
        let record = payment::ActiveModel {
            id: Set(payment_id),
            order_id: Set(order.id),
            amount: Set(amount),
            transaction_id: Set(notification.transaction_id.clone()),
            transaction_status: Set(notification.transaction_status.clone()),
            fraud_status: Set(Some(notification.fraud_status.clone()).filter(|s| !s.is_empty())),
            payment_type: Set(notification.payment_type.clone()),
            status_code: Set(notification.status_code.clone()),
            payload: Set(serde_json::to_value(notification)?),
            created_at: Set(Utc::now()),
        };
        record.insert(&*self.db).await.map_err(|e| {
            warn!(error = %e, "failed to record payment notification");
            ServiceError::PaymentNotProcessed(e.to_string())
        })?;

        self.event_sender
            .send_or_log(Event::PaymentRecorded {
                order_id: order.id,
                payment_id,
                transaction_status: notification.transaction_status.clone(),
            })
            .await;

        if order.payment_status == order::PaymentStatus::Paid {
            info!("order already paid, notification recorded only");
            return Err(ServiceError::AlreadyPaid(order.id));
        }

        if !notification.is_success() {
            info!(
                fraud_status = %notification.fraud_status,
                payment_type = %notification.payment_type,
                "payment not successful yet"
            );
            return Ok(NotificationOutcome {
                order_id: order.id,
                payment_id,
                paid: false,
            });
        }

        self.mark_paid(order.id).await?;

        self.event_sender.send_or_log(Event::OrderPaid(order.id)).await;
        info!("order marked as paid");

        Ok(NotificationOutcome {
            order_id: order.id,
            payment_id,
            paid: true,
        })
    }

    /// Compare-and-swap from unpaid to paid; losing the race reports `AlreadyPaid`.
    async fn mark_paid(&self, order_id: Uuid) -> Result<(), ServiceError> {
        let now = Utc::now();
        let result = order::Entity::update_many()
            .col_expr(
                order::Column::PaymentStatus,
                Expr::value(order::PaymentStatus::Paid.to_value()),
            )
            .col_expr(order::Column::PaidAt, Expr::value(Some(now)))
            .col_expr(order::Column::UpdatedAt, Expr::value(now))
            .filter(order::Column::Id.eq(order_id))
            .filter(order::Column::PaymentStatus.eq(order::PaymentStatus::Unpaid))
            .exec(&*self.db)
            .await
            .map_err(|e| ServiceError::PaymentNotProcessed(e.to_string()))?;

        if result.rows_affected == 0 {
            return Err(ServiceError::AlreadyPaid(order_id));
        }
        Ok(())
    }
}
