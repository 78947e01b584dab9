use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::store::StoreError;

/// Reservation identifier, assigned by the schedule state.
pub type ReservationId = u64;

/// Mutations applied to the schedule state.
///
/// The coordinator validates input and stamps `created_at` before building a
/// command, so `apply()` only performs the atomic check-then-act part.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Command {
    // Resource operations (administrative)
    RegisterResource {
        resource: ResourceData,
    },
    RemoveResource {
        id: String,
    },

    // Reservation operations
    CreateReservation {
        /// Client-supplied key for request deduplication
        request_id: Option<String>,
        resource_id: String,
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
        description: Option<String>,
        created_at: DateTime<Utc>,
    },
    CancelReservation {
        id: ReservationId,
    },
}

impl Command {
    pub fn request_id(&self) -> Option<&str> {
        match self {
            Command::CreateReservation { request_id, .. } => request_id.as_deref(),
            _ => None,
        }
    }
}

/// A bookable resource (lab device)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceData {
    pub id: String,
    pub name: String,
    pub ip_address: Option<String>,
    pub ssh_port: Option<u16>,
    pub web_port: Option<u16>,
}

/// A committed booking of one resource for `[start_time, end_time)`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReservationData {
    pub id: ReservationId,
    pub resource_id: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl ReservationData {
    /// Half-open interval intersection test.
    pub fn overlaps(&self, start: &DateTime<Utc>, end: &DateTime<Utc>) -> bool {
        self.start_time < *end && self.end_time > *start
    }

    /// True if the instant `t` lies in `[start_time, end_time)`.
    pub fn covers(&self, t: &DateTime<Utc>) -> bool {
        self.start_time <= *t && *t < self.end_time
    }

    pub fn duration_minutes(&self) -> i64 {
        (self.end_time - self.start_time).num_minutes()
    }
}

/// Outcome of applying a [`Command`]
#[derive(Debug, Clone)]
pub enum Response {
    Resource(ResourceData),
    ResourceRemoved { id: String },
    Reservation(ReservationData),
    Cancelled(ReservationData),
    Rejected(StoreError),
}
