use axum::{
    Json,
    extract::{Path, Query, State, rejection::JsonRejection},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::{IntoParams, ToSchema};

use crate::availability::{ResourceAvailability, SlotAvailability};

use super::{ApiError, AppState, Reservation};

/// Availability of one slot
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct SlotStatus {
    pub slot: DateTime<Utc>,
    pub available: bool,
    /// Reservation occupying the slot
    pub reservation_id: Option<u64>,
}

impl From<SlotAvailability> for SlotStatus {
    fn from(s: SlotAvailability) -> Self {
        Self {
            slot: s.slot,
            available: s.available,
            reservation_id: s.reservation_id,
        }
    }
}

/// Availability row for one resource
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ResourceAvailabilityRow {
    pub resource_id: String,
    pub slots: Vec<SlotStatus>,
}

impl From<ResourceAvailability> for ResourceAvailabilityRow {
    fn from(row: ResourceAvailability) -> Self {
        Self {
            resource_id: row.resource_id,
            slots: row.slots.into_iter().map(SlotStatus::from).collect(),
        }
    }
}

/// Query parameters for range availability
#[derive(Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct AvailabilityRangeQuery {
    /// Range start (floored to the slot grid)
    pub start: DateTime<Utc>,
    /// Exclusive range end
    pub end: DateTime<Utc>,
}

/// Availability of a resource over a time range
#[derive(Serialize, Deserialize, ToSchema)]
pub struct AvailabilityRangeResponse {
    pub resource_id: String,
    pub slots: Vec<SlotStatus>,
    /// Reservations intersecting the range
    pub reservations: Vec<Reservation>,
}

/// Request for an availability grid
#[derive(Deserialize, ToSchema)]
pub struct AvailabilityGridRequest {
    pub resource_ids: Vec<String>,
    /// Slot instants, each on the 30-minute grid
    pub slots: Vec<DateTime<Utc>>,
}

/// Availability grid, one row per requested resource
#[derive(Serialize, Deserialize, ToSchema)]
pub struct AvailabilityGridResponse {
    pub resources: Vec<ResourceAvailabilityRow>,
}

/// Slot availability of a resource over a time range
#[utoipa::path(
    get,
    path = "/v1/availability/{resource_id}",
    params(
        ("resource_id" = String, Path, description = "Resource ID"),
        AvailabilityRangeQuery
    ),
    responses(
        (status = 200, description = "Availability per slot", body = AvailabilityRangeResponse),
        (status = 400, description = "Invalid range", body = ApiError),
        (status = 404, description = "Resource not found", body = ApiError)
    ),
    tag = "availability"
)]
pub async fn get_resource_availability(
    State(state): State<Arc<AppState>>,
    Path(resource_id): Path<String>,
    Query(query): Query<AvailabilityRangeQuery>,
) -> Result<Json<AvailabilityRangeResponse>, ApiError> {
    let result = state
        .store
        .range_availability(&resource_id, query.start, query.end)
        .await?;

    Ok(Json(AvailabilityRangeResponse {
        resource_id: result.availability.resource_id,
        slots: result
            .availability
            .slots
            .into_iter()
            .map(SlotStatus::from)
            .collect(),
        reservations: result
            .reservations
            .into_iter()
            .map(Reservation::from)
            .collect(),
    }))
}

/// Availability for explicit resources and slots
#[utoipa::path(
    post,
    path = "/v1/availability",
    request_body = AvailabilityGridRequest,
    responses(
        (status = 200, description = "Availability grid", body = AvailabilityGridResponse),
        (status = 400, description = "Misaligned slot or too many slots", body = ApiError),
        (status = 404, description = "Resource not found", body = ApiError)
    ),
    tag = "availability"
)]
pub async fn compute_availability(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<AvailabilityGridRequest>, JsonRejection>,
) -> Result<Json<AvailabilityGridResponse>, ApiError> {
    let Json(req) = payload.map_err(|e| ApiError::bad_request(e.body_text()))?;

    let rows = state
        .store
        .compute_availability(&req.resource_ids, &req.slots)
        .await?;
    Ok(Json(AvailabilityGridResponse {
        resources: rows.into_iter().map(ResourceAvailabilityRow::from).collect(),
    }))
}
