use crate::handlers::common::{map_service_error, success_response};
use crate::{errors::ApiError, services::shipping::TrackingInfo, AppState};
use axum::{
    extract::{Path, State},
    response::IntoResponse,
    routing::get,
    Router,
};

pub fn tracking_routes() -> Router<AppState> {
    Router::new().route("/:resi", get(track_shipment))
}

/// Shipment history for a waybill number
#[utoipa::path(
    get,
    path = "/api/v1/tracking/{resi}",
    params(("resi" = String, Path, description = "Waybill (resi) number")),
    responses(
        (status = 200, description = "Tracking history", body = TrackingInfo),
        (status = 400, description = "Empty waybill number", body = crate::errors::ErrorResponse),
        (status = 500, description = "Courier aggregator error", body = crate::errors::ErrorResponse)
    ),
    tag = "Tracking"
)]
pub async fn track_shipment(
    State(state): State<AppState>,
    Path(resi): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let tracking = state
        .services
        .shipping
        .track(&resi)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(tracking))
}
