//! Shipping quotes, option selection and courier order assembly.

pub mod area_mapper;
pub mod client;

pub use area_mapper::{AreaMapper, AreaMode, AreaTable};
pub use client::{
    BiteshipClient, Coordinate, CourierClient, CourierItem, CourierOrderRequest,
    CourierOrderResponse, InstantFeeParams, Pricing, ShippingFeeParams, TrackingInfo,
};

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use strum::{Display, EnumString};
use tracing::{info, instrument};
use utoipa::ToSchema;

use crate::{
    config::ShippingConfig,
    entities::{order_customer, order_item},
    errors::ServiceError,
};

pub const PICKUP_COURIER: &str = "Pickup";
pub const PICKUP_DESTINATION: &str = "Pickup di Toko";

/// How the order leaves the store
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    ToSchema,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum DeliveryMode {
    #[default]
    Regular,
    Instant,
    Pickup,
}

impl DeliveryMode {
    /// Reads the mode from the form's `cour_type` and `courier` fields.
    /// A courier named `pickup` selects pickup whatever the type says.
    pub fn from_form(cour_type: Option<&str>, courier: Option<&str>) -> Self {
        if courier.is_some_and(|c| c.trim().eq_ignore_ascii_case("pickup")) {
            return DeliveryMode::Pickup;
        }
        cour_type
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .and_then(|t| t.parse().ok())
            .unwrap_or_default()
    }
}

/// Where and how the caller wants the cart delivered
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DeliverySelection {
    pub mode: DeliveryMode,
    pub city_id: String,
    pub courier: String,
    pub latitude: Option<String>,
    pub longitude: Option<String>,
}

impl DeliverySelection {
    /// Destination coordinate for instant delivery; both parts must parse.
    pub fn coordinate(&self) -> Result<Coordinate, ServiceError> {
        let latitude = parse_coordinate_part(self.latitude.as_deref());
        let longitude = parse_coordinate_part(self.longitude.as_deref());
        match (latitude, longitude) {
            (Some(latitude), Some(longitude)) => Ok(Coordinate {
                latitude,
                longitude,
            }),
            _ => Err(ServiceError::ValidationError(
                "latitude and longitude required for instant delivery".to_string(),
            )),
        }
    }
}

fn parse_coordinate_part(value: Option<&str>) -> Option<f64> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .and_then(|v| v.parse::<f64>().ok())
        .filter(|v| v.is_finite())
}

/// Display metadata for one end of a shipment
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct AreaInfo {
    pub area_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub area_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub city_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latitude: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub longitude: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ShippingQuote {
    pub pricing: Vec<Pricing>,
    pub origin: AreaInfo,
    pub destination: AreaInfo,
}

/// Cart totals with a chosen shipping option applied
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ShippingApplication {
    #[schema(value_type = String)]
    pub total_order: Decimal,
    #[schema(value_type = String)]
    pub shipping_fee: Decimal,
    #[schema(value_type = String)]
    pub grand_total: Decimal,
    pub total_weight: i32,
    pub origin: AreaInfo,
    pub destination: AreaInfo,
    pub courier_info: CourierInfo,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct CourierInfo {
    pub courier_name: String,
    pub service_name: String,
    pub duration: String,
}

impl From<&Pricing> for CourierInfo {
    fn from(option: &Pricing) -> Self {
        Self {
            courier_name: option.courier_name.clone(),
            service_name: option.courier_service_name.clone(),
            duration: option.duration.clone(),
        }
    }
}

/// Picks the first option whose courier name equals `label`.
///
/// A courier quoting several services matches on its first entry.
pub fn select_option<'a>(options: &'a [Pricing], label: &str) -> Result<&'a Pricing, ServiceError> {
    options
        .iter()
        .find(|option| option.courier_name == label)
        .ok_or_else(|| ServiceError::SelectedOptionNotFound(label.to_string()))
}

/// Price of an option as a money amount
pub fn option_fee(option: &Pricing) -> Decimal {
    Decimal::from(option.price)
}

#[derive(Clone)]
pub struct ShippingService {
    client: Arc<dyn CourierClient>,
    areas: Arc<AreaMapper>,
    config: ShippingConfig,
}

impl ShippingService {
    pub fn new(
        client: Arc<dyn CourierClient>,
        areas: Arc<AreaMapper>,
        config: ShippingConfig,
    ) -> Self {
        Self {
            client,
            areas,
            config,
        }
    }

    pub fn areas(&self) -> &AreaMapper {
        &self.areas
    }

    fn store_coordinate(&self) -> Coordinate {
        Coordinate {
            latitude: self.config.store.latitude,
            longitude: self.config.store.longitude,
        }
    }

    /// Quotes delivery of `total_weight` grams for the caller's selection.
    ///
    /// Pickup never reaches the courier. An empty `city_id` falls back to the
    /// default origin area.
    #[instrument(skip(self), fields(mode = %selection.mode))]
    pub async fn quote(
        &self,
        total_weight: i32,
        selection: &DeliverySelection,
    ) -> Result<ShippingQuote, ServiceError> {
        match selection.mode {
            DeliveryMode::Pickup => Ok(self.pickup_quote()),
            DeliveryMode::Instant => self.instant_quote(total_weight, selection).await,
            DeliveryMode::Regular => self.regular_quote(total_weight, selection).await,
        }
    }

    fn pickup_quote(&self) -> ShippingQuote {
        ShippingQuote {
            pricing: vec![Pricing {
                courier_name: PICKUP_COURIER.to_string(),
                courier_service_name: PICKUP_COURIER.to_string(),
                duration: String::new(),
                price: 0,
                company: None,
                courier_code: Some("pickup".to_string()),
                shipment_duration_unit: None,
            }],
            origin: self.store_area(),
            destination: AreaInfo {
                area_name: PICKUP_DESTINATION.to_string(),
                ..AreaInfo::default()
            },
        }
    }

    fn store_area(&self) -> AreaInfo {
        AreaInfo {
            area_name: self.config.store.display_name.clone(),
            latitude: Some(self.config.store.latitude),
            longitude: Some(self.config.store.longitude),
            ..AreaInfo::default()
        }
    }

    async fn instant_quote(
        &self,
        total_weight: i32,
        selection: &DeliverySelection,
    ) -> Result<ShippingQuote, ServiceError> {
        let destination = selection.coordinate()?;
        let params = InstantFeeParams {
            origin: self.store_coordinate(),
            destination_latitude: destination.latitude.to_string(),
            destination_longitude: destination.longitude.to_string(),
            weight: total_weight,
            couriers: selection.courier.clone(),
        };
        let quote = self.client.quote_instant(&params).await?;

        Ok(ShippingQuote {
            pricing: quote.pricing,
            origin: self.store_area(),
            destination: AreaInfo {
                area_name: format!(
                    "Koordinat: {}, {}",
                    destination.latitude, destination.longitude
                ),
                latitude: Some(destination.latitude),
                longitude: Some(destination.longitude),
                ..AreaInfo::default()
            },
        })
    }

    async fn regular_quote(
        &self,
        total_weight: i32,
        selection: &DeliverySelection,
    ) -> Result<ShippingQuote, ServiceError> {
        let origin = self.config.default_origin_area_id.trim().to_string();
        let city_id = match selection.city_id.trim() {
            "" => origin.clone(),
            city => city.to_string(),
        };
        if city_id.is_empty() {
            return Err(ServiceError::ValidationError(
                "invalid destination: no city_id provided and no default location configured"
                    .to_string(),
            ));
        }

        let destination_area = self.areas.resolve_area_id(&city_id);
        let params = ShippingFeeParams {
            origin: origin.clone(),
            destination: destination_area.clone(),
            weight: total_weight,
            couriers: selection.courier.clone(),
        };
        let quote = self.client.quote_regular(&params).await?;

        Ok(ShippingQuote {
            pricing: quote.pricing,
            origin: AreaInfo {
                area_name: self.areas.resolve_area_name(&origin),
                area_id: Some(origin),
                ..AreaInfo::default()
            },
            destination: AreaInfo {
                area_name: self.areas.resolve_area_name(&city_id),
                area_id: Some(destination_area),
                city_id: Some(city_id),
                ..AreaInfo::default()
            },
        })
    }

    /// Quotes, then applies the option labelled `shipping_package` to the cart totals.
    #[instrument(skip(self))]
    pub async fn apply(
        &self,
        cart_grand_total: Decimal,
        total_weight: i32,
        selection: &DeliverySelection,
        shipping_package: &str,
    ) -> Result<ShippingApplication, ServiceError> {
        let quote = self.quote(total_weight, selection).await?;
        let label = match selection.mode {
            DeliveryMode::Pickup => PICKUP_COURIER,
            _ => shipping_package,
        };
        let chosen = select_option(&quote.pricing, label)?;
        let shipping_fee = option_fee(chosen);

        Ok(ShippingApplication {
            total_order: cart_grand_total,
            shipping_fee,
            grand_total: cart_grand_total + shipping_fee,
            total_weight,
            origin: quote.origin,
            destination: quote.destination,
            courier_info: CourierInfo::from(chosen),
        })
    }

    /// Assembles the delivery order for a placed order.
    pub fn build_courier_order(
        &self,
        order_id: &str,
        mode: DeliveryMode,
        courier_company: &str,
        customer: &order_customer::Model,
        destination: Option<Coordinate>,
        items: &[order_item::Model],
    ) -> CourierOrderRequest {
        let store = &self.config.store;
        let instant = mode == DeliveryMode::Instant;

        let address = match customer.address2.as_deref().map(str::trim) {
            Some(extra) if !extra.is_empty() => format!("{}, {}", customer.address1, extra),
            _ => customer.address1.clone(),
        };

        CourierOrderRequest {
            reference_id: Some(order_id.to_string()),
            shipper_contact_name: store.contact_name.clone(),
            shipper_contact_phone: store.contact_phone.clone(),
            shipper_contact_email: store.contact_email.clone(),
            shipper_organization: store.name.clone(),
            origin_contact_name: store.contact_name.clone(),
            origin_contact_phone: store.contact_phone.clone(),
            origin_address: store.address.clone(),
            origin_note: store.note.clone(),
            origin_postal_code: (!instant).then_some(store.postal_code),
            origin_coordinate: instant.then(|| self.store_coordinate()),
            destination_contact_name: format!("{} {}", customer.first_name, customer.last_name)
                .trim()
                .to_string(),
            destination_contact_phone: customer.phone.clone(),
            destination_contact_email: customer.email.clone(),
            destination_address: address,
            destination_note: String::new(),
            destination_postal_code: if instant {
                None
            } else {
                customer.post_code.trim().parse().ok()
            },
            destination_coordinate: if instant { destination } else { None },
            courier_company: if instant {
                "grab".to_string()
            } else {
                courier_company.to_lowercase()
            },
            courier_type: if instant { "instant" } else { "reg" }.to_string(),
            courier_insurance: store.insurance_value,
            delivery_type: "now".to_string(),
            order_note: store.order_note.clone(),
            items: items
                .iter()
                .map(|item| CourierItem {
                    name: item.name.clone(),
                    description: item.sku.clone(),
                    value: item.base_price.trunc().to_i64().unwrap_or_default(),
                    quantity: item.qty,
                    weight: item.weight.ceil().to_i32().unwrap_or_default(),
                    length: None,
                    width: None,
                    height: None,
                })
                .collect(),
        }
    }

    #[instrument(skip(self, request), fields(reference = ?request.reference_id))]
    pub async fn register_courier_order(
        &self,
        request: &CourierOrderRequest,
    ) -> Result<CourierOrderResponse, ServiceError> {
        let response = self.client.create_order(request).await?;
        info!(courier_order = %response.id, "courier order registered");
        Ok(response)
    }

    pub async fn track(&self, waybill: &str) -> Result<TrackingInfo, ServiceError> {
        self.client.track(waybill).await
    }
}
