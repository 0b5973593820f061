//! Courier aggregator client (Biteship REST API).

use async_trait::async_trait;
use reqwest::{Client, Response};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, instrument, warn};
use utoipa::ToSchema;

use crate::errors::ServiceError;

const RATES_PATH: &str = "/v1/rates/couriers";
const ORDERS_PATH: &str = "/v1/orders";
const TRACKINGS_PATH: &str = "/v1/trackings";

/// Declared value of the synthetic parcel sent with rate requests
const QUOTE_ITEM_VALUE: i64 = 100_000;
/// Dimensions of the synthetic parcel, centimetres
const QUOTE_ITEM_SIDE: i32 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Coordinate {
    pub latitude: f64,
    pub longitude: f64,
}

/// Area-based rate request
#[derive(Debug, Clone, PartialEq)]
pub struct ShippingFeeParams {
    pub origin: String,
    pub destination: String,
    /// Grams
    pub weight: i32,
    /// Comma separated courier codes, e.g. `jne,sicepat`
    pub couriers: String,
}

/// Coordinate-based rate request. The destination stays textual because it
/// comes straight from the checkout form.
#[derive(Debug, Clone, PartialEq)]
pub struct InstantFeeParams {
    pub origin: Coordinate,
    pub destination_latitude: String,
    pub destination_longitude: String,
    pub weight: i32,
    pub couriers: String,
}

/// One priced courier service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Pricing {
    pub courier_name: String,
    pub courier_service_name: String,
    #[serde(default)]
    pub duration: String,
    pub price: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub company: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub courier_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shipment_duration_unit: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct RateLocation {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub postal_code: Option<i64>,
    #[serde(default, rename = "country_name", skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    #[serde(
        default,
        rename = "administrative_division_level_2_name",
        skip_serializing_if = "Option::is_none"
    )]
    pub city: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RateQuote {
    #[serde(default)]
    pub pricing: Vec<Pricing>,
    #[serde(default)]
    pub origin: Option<RateLocation>,
    #[serde(default)]
    pub destination: Option<RateLocation>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CourierItem {
    pub name: String,
    pub description: String,
    pub value: i64,
    pub quantity: i32,
    /// Grams
    pub weight: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub length: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<i32>,
}

/// Delivery order sent to the courier after checkout.
///
/// Stored on the order as JSON so a failed registration can be replayed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CourierOrderRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference_id: Option<String>,
    pub shipper_contact_name: String,
    pub shipper_contact_phone: String,
    pub shipper_contact_email: String,
    pub shipper_organization: String,
    pub origin_contact_name: String,
    pub origin_contact_phone: String,
    pub origin_address: String,
    pub origin_note: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub origin_postal_code: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub origin_coordinate: Option<Coordinate>,
    pub destination_contact_name: String,
    pub destination_contact_phone: String,
    pub destination_contact_email: String,
    pub destination_address: String,
    pub destination_note: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub destination_postal_code: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub destination_coordinate: Option<Coordinate>,
    pub courier_company: String,
    pub courier_type: String,
    pub courier_insurance: i64,
    pub delivery_type: String,
    pub order_note: String,
    pub items: Vec<CourierItem>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct CourierAssignment {
    #[serde(default)]
    pub tracking_id: Option<String>,
    #[serde(default)]
    pub waybill_id: Option<String>,
    #[serde(default)]
    pub company: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub link: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CourierOrderResponse {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub courier: CourierAssignment,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub price: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct TrackingParty {
    #[serde(default)]
    pub contact_name: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct TrackingCourier {
    #[serde(default)]
    pub company: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub driver_name: Option<String>,
    #[serde(default)]
    pub driver_phone: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct TrackingEvent {
    #[serde(default)]
    pub note: String,
    #[serde(default)]
    pub service_type: Option<String>,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub updated_at: Option<String>,
}

/// Courier tracking history for a waybill
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct TrackingInfo {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub waybill_id: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub link: Option<String>,
    #[serde(default)]
    pub order_id: Option<String>,
    #[serde(default)]
    pub courier: TrackingCourier,
    #[serde(default)]
    pub origin: TrackingParty,
    #[serde(default)]
    pub destination: TrackingParty,
    #[serde(default)]
    pub history: Vec<TrackingEvent>,
}

/// Every response carries `success` and `message` next to the payload.
#[derive(Debug, Deserialize)]
struct Envelope<T> {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    message: String,
    #[serde(flatten)]
    payload: T,
}

#[derive(Debug, Serialize)]
struct RatesByArea<'a> {
    origin_area_id: &'a str,
    destination_area_id: &'a str,
    couriers: &'a str,
    items: Vec<CourierItem>,
}

#[derive(Debug, Serialize)]
struct RatesByCoordinate<'a> {
    origin_latitude: f64,
    origin_longitude: f64,
    destination_latitude: f64,
    destination_longitude: f64,
    couriers: &'a str,
    items: Vec<CourierItem>,
}

/// Courier aggregator operations used by shipping and checkout.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CourierClient: Send + Sync {
    /// Rates between two courier areas
    async fn quote_regular(&self, params: &ShippingFeeParams) -> Result<RateQuote, ServiceError>;
    /// Rates between two coordinates
    async fn quote_instant(&self, params: &InstantFeeParams) -> Result<RateQuote, ServiceError>;
    /// Registers a delivery order
    async fn create_order(
        &self,
        request: &CourierOrderRequest,
    ) -> Result<CourierOrderResponse, ServiceError>;
    async fn track(&self, waybill: &str) -> Result<TrackingInfo, ServiceError>;
}

#[derive(Debug, Clone)]
pub struct BiteshipClient {
    http: Client,
    base_url: String,
    api_key: String,
    /// Stands in for whichever instant destination part cannot be parsed
    fallback_coordinate: Coordinate,
}

/// Parses a destination coordinate, replacing each unparsable part with the
/// matching part of `fallback`. The service layer rejects such input before
/// it gets here; direct client callers get the lenient behaviour.
fn destination_or_fallback(latitude: &str, longitude: &str, fallback: Coordinate) -> Coordinate {
    let parse_part = |raw: &str, default: f64, name: &str| match raw.trim().parse::<f64>() {
        Ok(value) if value.is_finite() => value,
        _ => {
            warn!(part = name, "unparsable destination coordinate, using the store location");
            default
        }
    };
    Coordinate {
        latitude: parse_part(latitude, fallback.latitude, "latitude"),
        longitude: parse_part(longitude, fallback.longitude, "longitude"),
    }
}

impl BiteshipClient {
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        fallback_coordinate: Coordinate,
        timeout: Option<Duration>,
    ) -> Result<Self, ServiceError> {
        let mut builder = Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let http = builder.build().map_err(|e| {
            ServiceError::InternalError(format!("failed to build courier client: {}", e))
        })?;

        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            fallback_coordinate,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn quote_item(weight: i32) -> CourierItem {
        CourierItem {
            name: "Cart Items".to_string(),
            description: "Combined items from shopping cart".to_string(),
            value: QUOTE_ITEM_VALUE,
            quantity: 1,
            weight,
            length: Some(QUOTE_ITEM_SIDE),
            width: Some(QUOTE_ITEM_SIDE),
            height: Some(QUOTE_ITEM_SIDE),
        }
    }

    async fn post<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ServiceError> {
        let response = self
            .http
            .post(self.url(path))
            .bearer_auth(&self.api_key)
            .json(body)
            .send()
            .await
            .map_err(transport_error)?;
        Self::read_envelope(response).await
    }

    async fn read_envelope<T: DeserializeOwned>(response: Response) -> Result<T, ServiceError> {
        let status = response.status();
        let text = response.text().await.unwrap_or_default();

        if !status.is_success() {
            warn!(%status, "courier API returned an error");
            return Err(ServiceError::ExternalServiceError(format!(
                "API error: {}",
                text
            )));
        }

        let envelope: Envelope<T> = serde_json::from_str(&text).map_err(|e| {
            ServiceError::ExternalServiceError(format!("invalid courier response: {}", e))
        })?;
        if !envelope.success {
            return Err(ServiceError::ExternalServiceError(envelope.message));
        }
        Ok(envelope.payload)
    }
}

fn transport_error(err: reqwest::Error) -> ServiceError {
    ServiceError::ExternalServiceError(format!("courier request failed: {}", err))
}

fn require(value: &str, message: &str) -> Result<(), ServiceError> {
    if value.trim().is_empty() {
        return Err(ServiceError::ValidationError(message.to_string()));
    }
    Ok(())
}

#[async_trait]
impl CourierClient for BiteshipClient {
    #[instrument(skip(self), fields(origin = %params.origin, destination = %params.destination))]
    async fn quote_regular(&self, params: &ShippingFeeParams) -> Result<RateQuote, ServiceError> {
        require(&params.origin, "origin area ID cannot be empty")?;
        require(&params.destination, "destination area ID cannot be empty")?;
        require(&params.couriers, "couriers cannot be empty")?;

        let body = RatesByArea {
            origin_area_id: &params.origin,
            destination_area_id: &params.destination,
            couriers: &params.couriers,
            items: vec![Self::quote_item(params.weight)],
        };
        let quote: RateQuote = self.post(RATES_PATH, &body).await?;
        debug!(options = quote.pricing.len(), "regular rates received");
        Ok(quote)
    }

    #[instrument(skip(self))]
    async fn quote_instant(&self, params: &InstantFeeParams) -> Result<RateQuote, ServiceError> {
        require(&params.couriers, "couriers cannot be empty")?;

        let destination = destination_or_fallback(
            &params.destination_latitude,
            &params.destination_longitude,
            self.fallback_coordinate,
        );

        let body = RatesByCoordinate {
            origin_latitude: params.origin.latitude,
            origin_longitude: params.origin.longitude,
            destination_latitude: destination.latitude,
            destination_longitude: destination.longitude,
            couriers: &params.couriers,
            items: vec![Self::quote_item(params.weight)],
        };
        self.post(RATES_PATH, &body).await
    }

    #[instrument(skip(self, request), fields(courier = %request.courier_company))]
    async fn create_order(
        &self,
        request: &CourierOrderRequest,
    ) -> Result<CourierOrderResponse, ServiceError> {
        self.post(ORDERS_PATH, request).await
    }

    #[instrument(skip(self))]
    async fn track(&self, waybill: &str) -> Result<TrackingInfo, ServiceError> {
        require(waybill, "tracking number cannot be empty")?;

        let response = self
            .http
            .get(self.url(&format!("{}/{}", TRACKINGS_PATH, waybill.trim())))
            .bearer_auth(&self.api_key)
            .send()
            .await
            .map_err(transport_error)?;
        Self::read_envelope(response).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn client() -> BiteshipClient {
        BiteshipClient::new(
            "http://127.0.0.1:9",
            "test-key",
            Coordinate {
                latitude: -0.5,
                longitude: 117.1,
            },
            Some(Duration::from_secs(1)),
        )
        .unwrap()
    }

    fn params() -> ShippingFeeParams {
        ShippingFeeParams {
            origin: "IDNC383".into(),
            destination: "IDNC384".into(),
            weight: 1000,
            couriers: "jne".into(),
        }
    }

    #[tokio::test]
    async fn regular_quote_requires_origin() {
        let err = client()
            .quote_regular(&ShippingFeeParams {
                origin: " ".into(),
                ..params()
            })
            .await
            .unwrap_err();
        assert_matches!(err, ServiceError::ValidationError(msg) if msg == "origin area ID cannot be empty");
    }

    #[tokio::test]
    async fn regular_quote_requires_destination() {
        let err = client()
            .quote_regular(&ShippingFeeParams {
                destination: String::new(),
                ..params()
            })
            .await
            .unwrap_err();
        assert_matches!(err, ServiceError::ValidationError(msg) if msg == "destination area ID cannot be empty");
    }

    #[tokio::test]
    async fn regular_quote_requires_couriers() {
        let err = client()
            .quote_regular(&ShippingFeeParams {
                couriers: String::new(),
                ..params()
            })
            .await
            .unwrap_err();
        assert_matches!(err, ServiceError::ValidationError(msg) if msg == "couriers cannot be empty");
    }

    #[test]
    fn envelope_flattens_payload() {
        let raw = r#"{
            "success": true,
            "message": "Success to retrieve courier pricing",
            "pricing": [
                {"courier_name": "JNE", "courier_service_name": "REG", "duration": "2 - 3 days", "price": 5000}
            ]
        }"#;
        let envelope: Envelope<RateQuote> = serde_json::from_str(raw).unwrap();
        assert!(envelope.success);
        assert_eq!(envelope.payload.pricing.len(), 1);
        assert_eq!(envelope.payload.pricing[0].price, 5000);
        assert!(envelope.payload.pricing[0].company.is_none());
    }

    #[test]
    fn unparsable_destination_parts_fall_back_one_by_one() {
        let store = Coordinate {
            latitude: -0.52,
            longitude: 117.13,
        };

        let only_latitude = destination_or_fallback("-0.49", "east", store);
        assert_eq!(only_latitude.latitude, -0.49);
        assert_eq!(only_latitude.longitude, 117.13);

        let only_longitude = destination_or_fallback(" ", "117.2", store);
        assert_eq!(only_longitude.latitude, -0.52);
        assert_eq!(only_longitude.longitude, 117.2);

        assert_eq!(destination_or_fallback("NaN", "x", store), store);
    }

    #[test]
    fn quote_item_is_a_single_parcel() {
        let item = BiteshipClient::quote_item(2500);
        assert_eq!(item.quantity, 1);
        assert_eq!(item.weight, 2500);
        assert_eq!(item.value, QUOTE_ITEM_VALUE);
    }
}
