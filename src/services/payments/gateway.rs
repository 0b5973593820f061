//! Hosted payment page creation (Midtrans Snap).

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use reqwest::Client;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{instrument, warn};

use crate::errors::ServiceError;

const SNAP_TRANSACTIONS_PATH: &str = "/snap/v1/transactions";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentCustomer {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: String,
}

/// Request for a payment page covering `gross_amount`
#[derive(Debug, Clone, PartialEq)]
pub struct PaymentRequest {
    pub order_id: String,
    pub gross_amount: Decimal,
    pub customer: PaymentCustomer,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentLink {
    pub token: String,
    pub redirect_url: String,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn create_transaction(&self, request: &PaymentRequest) -> Result<PaymentLink, ServiceError>;
}

#[derive(Debug, Serialize)]
struct SnapTransactionDetails<'a> {
    order_id: &'a str,
    gross_amount: i64,
}

#[derive(Debug, Serialize)]
struct SnapRequest<'a> {
    transaction_details: SnapTransactionDetails<'a>,
    customer_details: &'a PaymentCustomer,
}

#[derive(Debug, Deserialize)]
struct SnapErrorBody {
    #[serde(default)]
    error_messages: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct MidtransSnapClient {
    http: Client,
    base_url: String,
    server_key: String,
}

impl MidtransSnapClient {
    pub fn new(
        base_url: impl Into<String>,
        server_key: impl Into<String>,
        timeout: Option<Duration>,
    ) -> Result<Self, ServiceError> {
        let mut builder = Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let http = builder.build().map_err(|e| {
            ServiceError::InternalError(format!("failed to build payment client: {}", e))
        })?;

        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            server_key: server_key.into(),
        })
    }

    /// Snap authenticates with the server key as the basic-auth user and no password.
    fn authorization(&self) -> String {
        format!("Basic {}", BASE64.encode(format!("{}:", self.server_key)))
    }
}

/// Whole currency units; the gateway rejects fractional amounts.
pub fn gross_amount_units(amount: Decimal) -> i64 {
    amount.trunc().to_i64().unwrap_or_default()
}

#[async_trait]
impl PaymentGateway for MidtransSnapClient {
    #[instrument(skip(self, request), fields(order_id = %request.order_id))]
    async fn create_transaction(&self, request: &PaymentRequest) -> Result<PaymentLink, ServiceError> {
        let body = SnapRequest {
            transaction_details: SnapTransactionDetails {
                order_id: &request.order_id,
                gross_amount: gross_amount_units(request.gross_amount),
            },
            customer_details: &request.customer,
        };

        let response = self
            .http
            .post(format!("{}{}", self.base_url, SNAP_TRANSACTIONS_PATH))
            .header(reqwest::header::AUTHORIZATION, self.authorization())
            .header(reqwest::header::ACCEPT, "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                ServiceError::ExternalServiceError(format!("payment request failed: {}", e))
            })?;

        let status = response.status();
        let text = response.text().await.unwrap_or_default();
        if !status.is_success() {
            let detail = serde_json::from_str::<SnapErrorBody>(&text)
                .ok()
                .filter(|body| !body.error_messages.is_empty())
                .map(|body| body.error_messages.join(", "))
                .unwrap_or(text);
            warn!(%status, "payment gateway rejected the transaction");
            return Err(ServiceError::ExternalServiceError(format!(
                "payment gateway error: {}",
                detail
            )));
        }

        serde_json::from_str(&text).map_err(|e| {
            ServiceError::ExternalServiceError(format!("invalid payment gateway response: {}", e))
        })
    }
}
