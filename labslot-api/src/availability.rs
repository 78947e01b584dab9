//! Availability engine - free/busy computation per resource and slot.
//!
//! A slot is unavailable iff it falls inside `[start, end)` of a reservation
//! on that resource. The engine only reads [`ScheduleState`]; callers hold a
//! shared lock for the duration of one computation so every row sees the
//! same snapshot.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashSet;

use crate::command::ReservationId;
use crate::slot::{self, MAX_SLOTS_PER_QUERY};
use crate::state::ScheduleState;
use crate::store::StoreError;

/// Upper bound on distinct resources in one availability query.
pub const MAX_RESOURCES_PER_QUERY: usize = 256;

/// Upper bound on `(resource, slot)` cells in one availability query.
pub const MAX_CELLS_PER_QUERY: usize = 50_000;

/// Availability of a single slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SlotAvailability {
    pub slot: DateTime<Utc>,
    pub available: bool,
    /// Reservation occupying the slot, if any.
    pub reservation_id: Option<ReservationId>,
}

/// Availability of one resource over a set of slots.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResourceAvailability {
    pub resource_id: String,
    pub slots: Vec<SlotAvailability>,
}

/// Availability engine.
pub struct AvailabilityEngine;

impl AvailabilityEngine {
    pub fn new() -> Self {
        Self
    }

    /// Compute availability for every `(resource, slot)` pair.
    ///
    /// Rows follow the order of `resource_ids`, columns the order of `slots`.
    /// Fails if a resource is unknown or repeated, a slot is off the grid, or
    /// the grid exceeds [`MAX_SLOTS_PER_QUERY`] slots,
    /// [`MAX_RESOURCES_PER_QUERY`] resources or [`MAX_CELLS_PER_QUERY`] cells.
    pub fn compute(
        &self,
        state: &ScheduleState,
        resource_ids: &[String],
        slots: &[DateTime<Utc>],
    ) -> Result<Vec<ResourceAvailability>, StoreError> {
        if slots.len() > MAX_SLOTS_PER_QUERY {
            return Err(StoreError::Validation(format!(
                "at most {} slots per query, got {}",
                MAX_SLOTS_PER_QUERY,
                slots.len()
            )));
        }
        if resource_ids.len() > MAX_RESOURCES_PER_QUERY {
            return Err(StoreError::Validation(format!(
                "at most {} resources per query, got {}",
                MAX_RESOURCES_PER_QUERY,
                resource_ids.len()
            )));
        }
        let cells = resource_ids.len().saturating_mul(slots.len());
        if cells > MAX_CELLS_PER_QUERY {
            return Err(StoreError::Validation(format!(
                "at most {} resource slots per query, got {}",
                MAX_CELLS_PER_QUERY, cells
            )));
        }
        let mut seen = HashSet::with_capacity(resource_ids.len());
        if let Some(dup) = resource_ids.iter().find(|id| !seen.insert(id.as_str())) {
            return Err(StoreError::Validation(format!(
                "resource '{}' listed more than once",
                dup
            )));
        }
        if let Some(bad) = slots.iter().find(|s| !slot::is_aligned(s)) {
            return Err(StoreError::InvalidAlignment(format!(
                "slot {} is not on the {}-minute grid",
                bad.to_rfc3339(),
                slot::SLOT_MINUTES
            )));
        }
        if let Some(missing) = resource_ids
            .iter()
            .find(|id| state.get_resource(id).is_none())
        {
            return Err(StoreError::NotFound(format!(
                "Resource '{}' not found",
                missing
            )));
        }

        Ok(resource_ids
            .iter()
            .map(|resource_id| ResourceAvailability {
                resource_id: resource_id.clone(),
                slots: slots
                    .iter()
                    .map(|s| self.slot_availability(state, resource_id, s))
                    .collect(),
            })
            .collect())
    }

    /// Availability of `resource_id` at a single slot.
    pub fn slot_availability(
        &self,
        state: &ScheduleState,
        resource_id: &str,
        slot: &DateTime<Utc>,
    ) -> SlotAvailability {
        let occupant = state.reservation_at(resource_id, slot);
        SlotAvailability {
            slot: *slot,
            available: occupant.is_none(),
            reservation_id: occupant.map(|r| r.id),
        }
    }
}

impl Default for AvailabilityEngine {
    fn default() -> Self {
        Self::new()
    }
}
