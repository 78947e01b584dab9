use axum::{
    Json,
    extract::{Path, Query, State, rejection::JsonRejection},
    http::StatusCode,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::{IntoParams, ToSchema};

use crate::command::{ReservationData, ReservationId};
use crate::store::{
    CreateReservationRequest as StoreCreateReservationRequest, ReservationFilter,
};

use super::{ApiError, AppState};

/// Committed reservation
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Reservation {
    pub id: u64,
    pub resource_id: String,
    /// Start of the reservation (RFC 3339, UTC)
    pub start_time: DateTime<Utc>,
    /// Exclusive end of the reservation (RFC 3339, UTC)
    pub end_time: DateTime<Utc>,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<ReservationData> for Reservation {
    fn from(data: ReservationData) -> Self {
        Self {
            id: data.id,
            resource_id: data.resource_id,
            start_time: data.start_time,
            end_time: data.end_time,
            description: data.description,
            created_at: data.created_at,
        }
    }
}

impl From<&ReservationData> for Reservation {
    fn from(data: &ReservationData) -> Self {
        data.clone().into()
    }
}

/// Request to reserve a resource
#[derive(Deserialize, ToSchema)]
pub struct CreateReservationRequest {
    /// ID of the resource to reserve
    pub resource_id: String,
    /// Start time, must lie on the 30-minute grid
    pub start_time: DateTime<Utc>,
    /// Duration in minutes, rounded up to a multiple of 30
    pub duration_minutes: i64,
    /// Optional free-text description (max 200 characters)
    pub description: Option<String>,
    /// Optional idempotency key; retries with the same key return the first result
    pub request_id: Option<String>,
}

/// Query parameters for listing reservations
#[derive(Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ListReservationsQuery {
    /// Only reservations ending after this instant
    pub start: Option<DateTime<Utc>>,
    /// Only reservations starting before this instant
    pub end: Option<DateTime<Utc>>,
    /// Only reservations of this resource
    pub resource_id: Option<String>,
}

/// Response for cancel reservation
#[derive(Serialize, Deserialize, ToSchema)]
pub struct CancelReservationResponse {
    pub message: String,
    pub reservation: Reservation,
}

/// List reservations
#[utoipa::path(
    get,
    path = "/v1/reservations",
    params(ListReservationsQuery),
    responses(
        (status = 200, description = "Reservations ordered by start time", body = Vec<Reservation>),
        (status = 400, description = "Invalid range", body = ApiError),
        (status = 404, description = "Resource not found", body = ApiError)
    ),
    tag = "reservations"
)]
pub async fn list_reservations(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListReservationsQuery>,
) -> Result<Json<Vec<Reservation>>, ApiError> {
    let filter = ReservationFilter {
        resource_id: query.resource_id,
        start: query.start,
        end: query.end,
    };
    let reservations = state.store.list_reservations(filter).await?;
    Ok(Json(reservations.into_iter().map(Reservation::from).collect()))
}

/// Get a reservation by ID
#[utoipa::path(
    get,
    path = "/v1/reservations/{id}",
    params(
        ("id" = u64, Path, description = "Reservation ID")
    ),
    responses(
        (status = 200, description = "Reservation found", body = Reservation),
        (status = 404, description = "Reservation not found", body = ApiError)
    ),
    tag = "reservations"
)]
pub async fn get_reservation(
    State(state): State<Arc<AppState>>,
    Path(id): Path<ReservationId>,
) -> Result<Json<Reservation>, ApiError> {
    match state.store.get_reservation(id).await? {
        Some(data) => Ok(Json(data.into())),
        None => Err(ApiError::not_found("Reservation not found")),
    }
}

/// Reserve a resource
#[utoipa::path(
    post,
    path = "/v1/reservations",
    request_body = CreateReservationRequest,
    responses(
        (status = 201, description = "Reservation created", body = Reservation),
        (status = 400, description = "Invalid request or misaligned start time", body = ApiError),
        (status = 404, description = "Resource not found", body = ApiError),
        (status = 409, description = "Time slot conflict", body = ApiError)
    ),
    tag = "reservations"
)]
pub async fn create_reservation(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<CreateReservationRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Reservation>), ApiError> {
    let Json(req) = payload.map_err(|e| ApiError::bad_request(e.body_text()))?;

    let store_req = StoreCreateReservationRequest {
        resource_id: req.resource_id,
        start_time: req.start_time,
        duration_minutes: req.duration_minutes,
        description: req.description,
        request_id: req.request_id,
    };

    let data = state.store.create_reservation(store_req).await?;
    Ok((StatusCode::CREATED, Json(data.into())))
}

/// Cancel a reservation
#[utoipa::path(
    delete,
    path = "/v1/reservations/{id}",
    params(
        ("id" = u64, Path, description = "Reservation ID")
    ),
    responses(
        (status = 200, description = "Reservation cancelled", body = CancelReservationResponse),
        (status = 404, description = "Reservation not found", body = ApiError)
    ),
    tag = "reservations"
)]
pub async fn cancel_reservation(
    State(state): State<Arc<AppState>>,
    Path(id): Path<ReservationId>,
) -> Result<Json<CancelReservationResponse>, ApiError> {
    let result = state.store.cancel_reservation(id).await?;
    Ok(Json(CancelReservationResponse {
        message: "Reservation cancelled successfully".to_string(),
        reservation: result.reservation.into(),
    }))
}
