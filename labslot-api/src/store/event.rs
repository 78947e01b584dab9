//! Events emitted after schedule mutations commit.

use serde::Serialize;

use crate::command::{ReservationData, ResourceData};

/// Kind of a change event, as seen by subscribers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    ReservationCreated,
    ReservationCancelled,
    ResourceRegistered,
    ResourceRemoved,
}

impl EventKind {
    /// Short action name carried in the wire payload.
    pub fn action(&self) -> &'static str {
        match self {
            EventKind::ReservationCreated | EventKind::ResourceRegistered => "created",
            EventKind::ReservationCancelled => "cancelled",
            EventKind::ResourceRemoved => "removed",
        }
    }
}

/// Events emitted when schedule state changes.
///
/// Events are both the change log written to the durable store and the
/// messages fanned out by the change notifier. They are only published after
/// the change is visible to readers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// A reservation was committed.
    ReservationCreated(ReservationData),
    /// A reservation was cancelled.
    ReservationCancelled(ReservationData),
    /// A resource was registered.
    ResourceRegistered(ResourceData),
    /// A resource was removed.
    ResourceRemoved(ResourceData),
}

impl Event {
    pub fn kind(&self) -> EventKind {
        match self {
            Event::ReservationCreated(_) => EventKind::ReservationCreated,
            Event::ReservationCancelled(_) => EventKind::ReservationCancelled,
            Event::ResourceRegistered(_) => EventKind::ResourceRegistered,
            Event::ResourceRemoved(_) => EventKind::ResourceRemoved,
        }
    }

    /// The reservation this event refers to, for reservation events.
    pub fn reservation(&self) -> Option<&ReservationData> {
        match self {
            Event::ReservationCreated(r) | Event::ReservationCancelled(r) => Some(r),
            Event::ResourceRegistered(_) | Event::ResourceRemoved(_) => None,
        }
    }

    /// Resource whose schedule or registration changed.
    pub fn resource_id(&self) -> &str {
        match self {
            Event::ReservationCreated(r) | Event::ReservationCancelled(r) => &r.resource_id,
            Event::ResourceRegistered(r) | Event::ResourceRemoved(r) => &r.id,
        }
    }
}
