use axum::{
    Router,
    routing::{delete, get, post},
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use super::handlers::{self, AppState};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "labslot API Server",
        version = "0.1.0",
        description = "REST API for booking lab resources in 30-minute slots. Provides conflict-free reservations, slot availability and a live stream of schedule changes.",
        license(name = "MIT")
    ),
    tags(
        (name = "system", description = "System information"),
        (name = "resources", description = "Bookable resources"),
        (name = "reservations", description = "Reservation creation, lookup and cancellation"),
        (name = "availability", description = "Slot availability queries")
    ),
    paths(
        // System
        handlers::get_version,
        // Resources
        handlers::list_resources,
        handlers::get_resource,
        handlers::register_resource,
        handlers::remove_resource,
        // Reservations
        handlers::list_reservations,
        handlers::get_reservation,
        handlers::create_reservation,
        handlers::cancel_reservation,
        // Availability
        handlers::get_resource_availability,
        handlers::compute_availability,
    ),
    components(schemas(
        handlers::VersionInfo,
        handlers::ApiError,
        // Resources
        handlers::Resource,
        handlers::RegisterResourceRequest,
        handlers::RemoveResourceResponse,
        // Reservations
        handlers::Reservation,
        handlers::CreateReservationRequest,
        handlers::CancelReservationResponse,
        // Availability
        handlers::SlotStatus,
        handlers::ResourceAvailabilityRow,
        handlers::AvailabilityRangeResponse,
        handlers::AvailabilityGridRequest,
        handlers::AvailabilityGridResponse,
    ))
)]
pub struct ApiDoc;

pub fn create_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let api_routes = Router::new()
        // System
        .route("/version", get(handlers::get_version))
        // Resources
        .route("/resources", get(handlers::list_resources))
        .route("/resources", post(handlers::register_resource))
        .route("/resources/{id}", get(handlers::get_resource))
        .route("/resources/{id}", delete(handlers::remove_resource))
        // Reservations
        .route("/reservations", get(handlers::list_reservations))
        .route("/reservations", post(handlers::create_reservation))
        .route("/reservations/{id}", get(handlers::get_reservation))
        .route("/reservations/{id}", delete(handlers::cancel_reservation))
        // Availability
        .route("/availability", post(handlers::compute_availability))
        .route(
            "/availability/{resource_id}",
            get(handlers::get_resource_availability),
        )
        // Live updates
        .route("/events", get(handlers::schedule_events));

    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .nest("/v1", api_routes)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
