//! DataStore trait definitions.
//!
//! Handlers work against these traits rather than the concrete store, so
//! the transport layer never touches the schedule state or its lock.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::availability::ResourceAvailability;
use crate::command::{ReservationData, ReservationId, ResourceData};
use crate::notifier::{SubscriberId, Subscription};

use super::error::Result;

// =============================================================================
// Request DTOs
// =============================================================================

/// Request to register a bookable resource.
#[derive(Debug, Clone)]
pub struct RegisterResourceRequest {
    pub id: String,
    pub name: String,
    pub ip_address: Option<String>,
    pub ssh_port: Option<u16>,
    pub web_port: Option<u16>,
}

/// Request to create a reservation.
#[derive(Debug, Clone)]
pub struct CreateReservationRequest {
    pub resource_id: String,
    pub start_time: DateTime<Utc>,
    /// Requested length; rounded up to the slot size.
    pub duration_minutes: i64,
    pub description: Option<String>,
    /// Optional client key; repeating it returns the first outcome.
    pub request_id: Option<String>,
}

/// Optional scope for listing reservations.
#[derive(Debug, Clone, Default)]
pub struct ReservationFilter {
    pub resource_id: Option<String>,
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
}

/// Confirmation of a cancelled reservation.
#[derive(Debug, Clone)]
pub struct CancelResult {
    pub reservation: ReservationData,
}

/// Availability of a resource over a time range.
#[derive(Debug, Clone)]
pub struct RangeAvailability {
    pub availability: ResourceAvailability,
    /// Reservations intersecting the range, ordered by start time.
    pub reservations: Vec<ReservationData>,
}

// =============================================================================
// Domain Store Traits
// =============================================================================

/// Store trait for the resource registry.
#[async_trait]
pub trait ResourceStore: Send + Sync {
    /// List all resources.
    async fn list_resources(&self) -> Result<Vec<ResourceData>>;

    /// Get a resource by ID.
    async fn get_resource(&self, id: &str) -> Result<Option<ResourceData>>;

    /// Register a new resource (administrative).
    async fn register_resource(&self, req: RegisterResourceRequest) -> Result<ResourceData>;

    /// Remove a resource without reservations (administrative).
    async fn remove_resource(&self, id: &str) -> Result<()>;
}

/// Store trait for reservation operations.
#[async_trait]
pub trait ReservationStore: Send + Sync {
    /// List reservations, optionally scoped by resource and time range.
    async fn list_reservations(&self, filter: ReservationFilter) -> Result<Vec<ReservationData>>;

    /// Get a reservation by ID.
    async fn get_reservation(&self, id: ReservationId) -> Result<Option<ReservationData>>;

    /// Validate and atomically commit a reservation.
    async fn create_reservation(&self, req: CreateReservationRequest) -> Result<ReservationData>;

    /// Atomically cancel a reservation.
    async fn cancel_reservation(&self, id: ReservationId) -> Result<CancelResult>;
}

/// Store trait for availability queries.
#[async_trait]
pub trait AvailabilityStore: Send + Sync {
    /// Availability for every `(resource, slot)` pair.
    async fn compute_availability(
        &self,
        resource_ids: &[String],
        slots: &[DateTime<Utc>],
    ) -> Result<Vec<ResourceAvailability>>;

    /// Availability of one resource over the slots of `[start, end)`.
    async fn range_availability(
        &self,
        resource_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<RangeAvailability>;
}

// =============================================================================
// Composite DataStore Trait
// =============================================================================

/// Composite data store trait combining all domain stores.
///
/// This is the trait handlers use. It provides:
/// - Resource registry reads and administrative writes
/// - Reservation reads, creation, and cancellation
/// - Availability computation
/// - Subscription to change events
pub trait DataStore: ResourceStore + ReservationStore + AvailabilityStore + Send + Sync {
    /// Register a subscriber for change events.
    fn subscribe(&self) -> Subscription;

    /// Remove a subscriber.
    fn unsubscribe(&self, id: SubscriberId);
}
