use crate::handlers::common::Envelope;
use crate::{
    errors::ServiceError,
    services::payments::{NotificationOutcome, PaymentNotification},
    AppState,
};
use axum::{
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use tracing::{info, warn};

/// Message returned once a notification is stored
pub const PAYMENT_SAVED: &str = "Payment saved.";

/// Gateway-facing status for a failed notification.
/// Unknown orders are refused like forged ones.
fn failure_status(err: &ServiceError) -> StatusCode {
    match err {
        ServiceError::NotFound(_) => StatusCode::FORBIDDEN,
        other => other.status_code(),
    }
}

fn failure_message(err: &ServiceError) -> String {
    match err {
        ServiceError::NotFound(_) => "order not found".to_string(),
        other => other.response_message(),
    }
}

// POST /api/v1/payment/notification
#[utoipa::path(
    post,
    path = "/api/v1/payment/notification",
    request_body = PaymentNotification,
    responses(
        (status = 200, description = "Notification stored", body = Envelope<NotificationOutcome>),
        (status = 400, description = "Malformed payload or payment not stored", body = Envelope<NotificationOutcome>),
        (status = 403, description = "Invalid signature, unknown order or already paid", body = Envelope<NotificationOutcome>)
    ),
    tag = "Payments"
)]
pub async fn payment_notification(State(state): State<AppState>, body: Bytes) -> Response {
    let notification: PaymentNotification = match serde_json::from_slice(&body) {
        Ok(notification) => notification,
        Err(e) => {
            warn!(error = %e, "unreadable payment notification");
            return Envelope::failure(StatusCode::BAD_REQUEST, format!("invalid payload: {}", e))
                .into_response();
        }
    };

    match state
        .services
        .payments
        .handle_notification(&notification)
        .await
    {
        Ok(outcome) => {
            info!(order_id = %outcome.order_id, paid = outcome.paid, "payment notification handled");
            Envelope::ok(outcome, PAYMENT_SAVED).into_response()
        }
        Err(err) => {
            warn!(order_id = %notification.order_id, error = %err, "payment notification rejected");
            Envelope::failure(failure_status(&err), failure_message(&err)).into_response()
        }
    }
}
