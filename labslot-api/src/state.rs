//! Schedule state - resource registry and authoritative reservation set.

use chrono::{DateTime, Utc};
use lru::LruCache;
use std::collections::{BTreeMap, HashMap};
use std::num::NonZeroUsize;

use crate::command::{Command, ReservationData, ReservationId, ResourceData, Response};
use crate::slot;
use crate::store::{Event, StoreError};

const IDEMPOTENCY_CACHE_SIZE: NonZeroUsize = match NonZeroUsize::new(1000) {
    Some(n) => n,
    None => unreachable!(),
};

/// Schedule state, owned exclusively by the coordinator.
///
/// Reservations are indexed twice: by id, and per resource by start time.
/// Reservations of one resource never overlap, so in start order their end
/// times are increasing too. Overlap checks and range queries rely on that.
#[derive(Debug)]
pub struct ScheduleState {
    resources: HashMap<String, ResourceData>,
    reservations: HashMap<ReservationId, ReservationData>,
    by_resource: HashMap<String, BTreeMap<DateTime<Utc>, ReservationId>>,
    next_reservation_id: ReservationId,
    /// Idempotency cache for request deduplication
    applied_requests: LruCache<String, Response>,
}

impl Default for ScheduleState {
    fn default() -> Self {
        Self {
            resources: HashMap::new(),
            reservations: HashMap::new(),
            by_resource: HashMap::new(),
            next_reservation_id: 1,
            applied_requests: LruCache::new(IDEMPOTENCY_CACHE_SIZE),
        }
    }
}

impl ScheduleState {
    /// Rebuild state from persisted records.
    ///
    /// Records that violate the non-overlap invariant are rejected rather
    /// than silently loaded.
    pub fn restore(
        resources: Vec<ResourceData>,
        reservations: Vec<ReservationData>,
        next_reservation_id: ReservationId,
    ) -> Result<Self, StoreError> {
        let mut state = Self::default();
        for resource in resources {
            state.resources.insert(resource.id.clone(), resource);
        }
        for reservation in reservations {
            state.next_reservation_id = state.next_reservation_id.max(reservation.id + 1);
            state.insert(reservation)?;
        }
        state.next_reservation_id = state.next_reservation_id.max(next_reservation_id);
        Ok(state)
    }

    // =========================================================================
    // Resource registry
    // =========================================================================

    pub fn get_resource(&self, id: &str) -> Option<&ResourceData> {
        self.resources.get(id)
    }

    /// All resources, ordered by id.
    pub fn list_resources(&self) -> Vec<&ResourceData> {
        let mut resources: Vec<_> = self.resources.values().collect();
        resources.sort_by(|a, b| a.id.cmp(&b.id));
        resources
    }

    // =========================================================================
    // Reservation store
    // =========================================================================

    pub fn get_reservation(&self, id: ReservationId) -> Option<&ReservationData> {
        self.reservations.get(&id)
    }

    pub fn reservation_count(&self) -> usize {
        self.reservations.len()
    }

    /// Id the next committed reservation will receive.
    pub fn next_reservation_id(&self) -> ReservationId {
        self.next_reservation_id
    }

    /// First reservation on `resource_id` overlapping `[start, end)`, if any.
    pub fn find_overlap(
        &self,
        resource_id: &str,
        start: &DateTime<Utc>,
        end: &DateTime<Utc>,
    ) -> Option<&ReservationData> {
        // The latest reservation starting before `end` has the largest end
        // among all candidates; if it ends at or before `start`, nothing
        // overlaps.
        let (_, id) = self.by_resource.get(resource_id)?.range(..*end).next_back()?;
        self.reservations
            .get(id)
            .filter(|r| r.overlaps(start, end))
    }

    /// Reservation on `resource_id` whose interval contains instant `t`.
    pub fn reservation_at(&self, resource_id: &str, t: &DateTime<Utc>) -> Option<&ReservationData> {
        let (_, id) = self.by_resource.get(resource_id)?.range(..=*t).next_back()?;
        self.reservations.get(id).filter(|r| r.covers(t))
    }

    /// Insert a reservation, enforcing non-overlap per resource.
    pub fn insert(&mut self, reservation: ReservationData) -> Result<(), StoreError> {
        if reservation.end_time <= reservation.start_time {
            return Err(StoreError::Validation(
                "reservation must end after it starts".to_string(),
            ));
        }
        if self.reservations.contains_key(&reservation.id) {
            return Err(StoreError::Conflict(format!(
                "Reservation {} already exists",
                reservation.id
            )));
        }
        if let Some(existing) = self.find_overlap(
            &reservation.resource_id,
            &reservation.start_time,
            &reservation.end_time,
        ) {
            return Err(StoreError::Conflict(format!(
                "Time slot overlaps reservation {} on resource '{}' ({} - {})",
                existing.id,
                existing.resource_id,
                existing.start_time.to_rfc3339(),
                existing.end_time.to_rfc3339()
            )));
        }

        self.by_resource
            .entry(reservation.resource_id.clone())
            .or_default()
            .insert(reservation.start_time, reservation.id);
        self.reservations.insert(reservation.id, reservation);
        Ok(())
    }

    /// Remove a reservation by id.
    pub fn remove(&mut self, id: ReservationId) -> Result<ReservationData, StoreError> {
        let reservation = self
            .reservations
            .remove(&id)
            .ok_or_else(|| StoreError::NotFound(format!("Reservation {} not found", id)))?;

        if let Some(index) = self.by_resource.get_mut(&reservation.resource_id) {
            index.remove(&reservation.start_time);
            if index.is_empty() {
                self.by_resource.remove(&reservation.resource_id);
            }
        }
        Ok(reservation)
    }

    /// Reservations of `resource_id` intersecting `[range_start, range_end)`,
    /// ordered by start time.
    pub fn query_by_resource(
        &self,
        resource_id: &str,
        range_start: &DateTime<Utc>,
        range_end: &DateTime<Utc>,
    ) -> Vec<&ReservationData> {
        let Some(index) = self.by_resource.get(resource_id) else {
            return Vec::new();
        };

        let mut hits: Vec<&ReservationData> = index
            .range(..*range_end)
            .rev()
            .filter_map(|(_, id)| self.reservations.get(id))
            .take_while(|r| r.end_time > *range_start)
            .collect();
        hits.reverse();
        hits
    }

    /// All reservations, optionally restricted to those intersecting a range,
    /// ordered by start time then resource id.
    pub fn list_reservations(
        &self,
        range: Option<(&DateTime<Utc>, &DateTime<Utc>)>,
    ) -> Vec<&ReservationData> {
        let mut reservations: Vec<_> = match range {
            Some((start, end)) => self
                .by_resource
                .keys()
                .flat_map(|resource_id| self.query_by_resource(resource_id, start, end))
                .collect(),
            None => self.reservations.values().collect(),
        };
        reservations.sort_by(|a, b| {
            a.start_time
                .cmp(&b.start_time)
                .then_with(|| a.resource_id.cmp(&b.resource_id))
        });
        reservations
    }

    // =========================================================================
    // Command application
    // =========================================================================

    /// Apply a command, returning the response and the events to publish
    /// once the change is committed.
    pub fn apply(&mut self, cmd: Command) -> (Response, Vec<Event>) {
        if let Some(request_id) = cmd.request_id()
            && let Some(response) = self.applied_requests.peek(request_id)
        {
            let replayed = match response {
                Response::Reservation(r) if !self.reservations.contains_key(&r.id) => {
                    Response::Rejected(StoreError::Conflict(format!(
                        "Request '{}' was already applied; reservation {} has since been cancelled",
                        request_id, r.id
                    )))
                }
                other => other.clone(),
            };
            return (replayed, vec![]);
        }

        let request_id = cmd.request_id().map(str::to_string);
        let (response, events) = match cmd {
            Command::RegisterResource { resource } => {
                if self.resources.contains_key(&resource.id) {
                    (
                        Response::Rejected(StoreError::Conflict(format!(
                            "Resource '{}' already exists",
                            resource.id
                        ))),
                        vec![],
                    )
                } else {
                    self.resources.insert(resource.id.clone(), resource.clone());
                    (
                        Response::Resource(resource.clone()),
                        vec![Event::ResourceRegistered(resource)],
                    )
                }
            }

            Command::RemoveResource { id } => {
                if self.by_resource.contains_key(&id) {
                    (
                        Response::Rejected(StoreError::Conflict(format!(
                            "Resource '{}' still has reservations",
                            id
                        ))),
                        vec![],
                    )
                } else {
                    match self.resources.remove(&id) {
                        Some(resource) => (
                            Response::ResourceRemoved { id },
                            vec![Event::ResourceRemoved(resource)],
                        ),
                        None => (
                            Response::Rejected(StoreError::NotFound(format!(
                                "Resource '{}' not found",
                                id
                            ))),
                            vec![],
                        ),
                    }
                }
            }

            Command::CreateReservation {
                resource_id,
                start_time,
                end_time,
                description,
                created_at,
                ..
            } => self.create_reservation(resource_id, start_time, end_time, description, created_at),

            Command::CancelReservation { id } => match self.remove(id) {
                Ok(reservation) => (
                    Response::Cancelled(reservation.clone()),
                    vec![Event::ReservationCancelled(reservation)],
                ),
                Err(e) => (Response::Rejected(e), vec![]),
            },
        };

        if let Some(request_id) = request_id {
            self.applied_requests.put(request_id, response.clone());
        }
        (response, events)
    }

    fn create_reservation(
        &mut self,
        resource_id: String,
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
        description: Option<String>,
        created_at: DateTime<Utc>,
    ) -> (Response, Vec<Event>) {
        if !self.resources.contains_key(&resource_id) {
            return (
                Response::Rejected(StoreError::NotFound(format!(
                    "Resource '{}' not found",
                    resource_id
                ))),
                vec![],
            );
        }
        if !slot::is_aligned(&start_time) || !slot::is_aligned(&end_time) {
            return (
                Response::Rejected(StoreError::InvalidAlignment(format!(
                    "Reservation {} - {} is not on the {}-minute grid",
                    start_time.to_rfc3339(),
                    end_time.to_rfc3339(),
                    slot::SLOT_MINUTES
                ))),
                vec![],
            );
        }

        let reservation = ReservationData {
            id: self.next_reservation_id,
            resource_id,
            start_time,
            end_time,
            description,
            created_at,
        };

        match self.insert(reservation.clone()) {
            Ok(()) => {
                self.next_reservation_id += 1;
                (
                    Response::Reservation(reservation.clone()),
                    vec![Event::ReservationCreated(reservation)],
                )
            }
            Err(e) => (Response::Rejected(e), vec![]),
        }
    }

    /// Undo the effect of committed events (used when persisting them fails).
    pub fn revert(&mut self, events: &[Event]) {
        for event in events.iter().rev() {
            match event {
                Event::ReservationCreated(r) => {
                    if self.remove(r.id).is_ok() && self.next_reservation_id == r.id + 1 {
                        self.next_reservation_id = r.id;
                    }
                }
                Event::ReservationCancelled(r) => {
                    // The slot was ours a moment ago and the lock is still held
                    let _ = self.insert(r.clone());
                }
                Event::ResourceRegistered(r) => {
                    self.resources.remove(&r.id);
                }
                Event::ResourceRemoved(r) => {
                    self.resources.insert(r.id.clone(), r.clone());
                }
            }
        }
    }

    /// Forget a cached response (used when the command it belongs to was rolled back).
    pub fn forget_request(&mut self, request_id: &str) {
        self.applied_requests.pop(request_id);
    }

    /// Check the non-overlap invariant across all resources.
    #[cfg(test)]
    pub fn assert_no_overlaps(&self) {
        for (resource_id, index) in &self.by_resource {
            let mut prev_end: Option<DateTime<Utc>> = None;
            for id in index.values() {
                let r = &self.reservations[id];
                assert_eq!(&r.resource_id, resource_id);
                if let Some(end) = prev_end {
                    assert!(end <= r.start_time, "overlap on {}", resource_id);
                }
                prev_end = Some(r.end_time);
            }
        }
        let indexed: usize = self.by_resource.values().map(|i| i.len()).sum();
        assert_eq!(indexed, self.reservations.len());
    }
}
