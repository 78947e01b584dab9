use axum::{
    Json,
    extract::{Path, State, rejection::JsonRejection},
    http::StatusCode,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::ToSchema;

use crate::command::ResourceData;
use crate::store::RegisterResourceRequest as StoreRegisterResourceRequest;

use super::{ApiError, AppState};

/// Bookable resource (lab device)
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct Resource {
    /// Unique resource ID
    pub id: String,
    /// Display name
    pub name: String,
    /// Management IP address
    pub ip_address: Option<String>,
    /// SSH port
    pub ssh_port: Option<u16>,
    /// Web UI port
    pub web_port: Option<u16>,
}

impl From<ResourceData> for Resource {
    fn from(data: ResourceData) -> Self {
        Self {
            id: data.id,
            name: data.name,
            ip_address: data.ip_address,
            ssh_port: data.ssh_port,
            web_port: data.web_port,
        }
    }
}

/// Request to register a resource
#[derive(Deserialize, ToSchema)]
pub struct RegisterResourceRequest {
    /// Unique resource ID (generated if omitted)
    pub id: Option<String>,
    pub name: String,
    pub ip_address: Option<String>,
    pub ssh_port: Option<u16>,
    pub web_port: Option<u16>,
}

impl From<RegisterResourceRequest> for StoreRegisterResourceRequest {
    fn from(req: RegisterResourceRequest) -> Self {
        Self {
            id: req
                .id
                .unwrap_or_else(|| uuid::Uuid::new_v4().to_string()),
            name: req.name,
            ip_address: req.ip_address,
            ssh_port: req.ssh_port,
            web_port: req.web_port,
        }
    }
}

/// List all resources
#[utoipa::path(
    get,
    path = "/v1/resources",
    responses(
        (status = 200, description = "List of resources", body = Vec<Resource>)
    ),
    tag = "resources"
)]
pub async fn list_resources(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<Resource>>, ApiError> {
    let resources = state.store.list_resources().await?;
    Ok(Json(resources.into_iter().map(Resource::from).collect()))
}

/// Get a resource by ID
#[utoipa::path(
    get,
    path = "/v1/resources/{id}",
    params(
        ("id" = String, Path, description = "Resource ID")
    ),
    responses(
        (status = 200, description = "Resource found", body = Resource),
        (status = 404, description = "Resource not found", body = ApiError)
    ),
    tag = "resources"
)]
pub async fn get_resource(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Resource>, ApiError> {
    match state.store.get_resource(&id).await? {
        Some(data) => Ok(Json(data.into())),
        None => Err(ApiError::not_found("Resource not found")),
    }
}

/// Register a resource (administrative)
#[utoipa::path(
    post,
    path = "/v1/resources",
    request_body = RegisterResourceRequest,
    responses(
        (status = 201, description = "Resource registered", body = Resource),
        (status = 400, description = "Invalid resource", body = ApiError),
        (status = 409, description = "Resource ID already exists", body = ApiError)
    ),
    tag = "resources"
)]
pub async fn register_resource(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<RegisterResourceRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Resource>), ApiError> {
    let Json(req) = payload.map_err(|e| ApiError::bad_request(e.body_text()))?;
    let data = state.store.register_resource(req.into()).await?;
    Ok((StatusCode::CREATED, Json(data.into())))
}

/// Response for remove resource
#[derive(Serialize, ToSchema)]
pub struct RemoveResourceResponse {
    pub removed: bool,
}

/// Remove a resource (administrative)
#[utoipa::path(
    delete,
    path = "/v1/resources/{id}",
    params(
        ("id" = String, Path, description = "Resource ID")
    ),
    responses(
        (status = 200, description = "Resource removed", body = RemoveResourceResponse),
        (status = 404, description = "Resource not found", body = ApiError),
        (status = 409, description = "Resource still has reservations", body = ApiError)
    ),
    tag = "resources"
)]
pub async fn remove_resource(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<RemoveResourceResponse>, ApiError> {
    state.store.remove_resource(&id).await?;
    Ok(Json(RemoveResourceResponse { removed: true }))
}
