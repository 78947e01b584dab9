//! LocalStore - the reservation coordinator behind the DataStore traits.
//!
//! All mutations funnel through [`LocalStore::execute`]: the schedule write
//! lock is taken with a bounded wait, the command is applied, the resulting
//! events are persisted, and only after the lock is released are they handed
//! to the change notifier.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{debug, warn};

use crate::audit::AuditLogger;
use crate::availability::{AvailabilityEngine, ResourceAvailability};
use crate::command::{Command, ReservationData, ReservationId, ResourceData, Response};
use crate::notifier::{ChangeNotifier, DEFAULT_SUBSCRIBER_BUFFER, SubscriberId, Subscription};
use crate::slot;
use crate::state::ScheduleState;

use super::error::{Result, StoreError};
use super::event::Event;
use super::persist::Persistence;
use super::traits::{
    AvailabilityStore, CancelResult, CreateReservationRequest, DataStore, RangeAvailability,
    RegisterResourceRequest, ReservationFilter, ReservationStore, ResourceStore,
};

/// Maximum length of a reservation description.
pub const MAX_DESCRIPTION_LEN: usize = 200;

/// Tunables for the coordinator.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Longest a writer waits for the schedule lock before giving up.
    pub lock_timeout: Duration,
    /// Queue depth per change subscriber.
    pub subscriber_buffer: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            lock_timeout: Duration::from_secs(2),
            subscriber_buffer: DEFAULT_SUBSCRIBER_BUFFER,
        }
    }
}

/// In-process schedule store with optional redb durability.
pub struct LocalStore {
    state: RwLock<ScheduleState>,
    persistence: Option<Persistence>,
    notifier: ChangeNotifier,
    engine: AvailabilityEngine,
    audit: Arc<AuditLogger>,
    config: StoreConfig,
}

impl LocalStore {
    /// Create an ephemeral store (nothing survives a restart).
    pub fn in_memory(config: StoreConfig, audit: Arc<AuditLogger>) -> Self {
        Self::with_state(ScheduleState::default(), None, config, audit)
    }

    /// Open a durable store in `data_dir`, loading any existing schedule.
    pub fn open(
        data_dir: impl AsRef<Path>,
        config: StoreConfig,
        audit: Arc<AuditLogger>,
    ) -> Result<Self> {
        let persistence = Persistence::open(data_dir)?;
        let state = persistence.load()?;
        Ok(Self::with_state(state, Some(persistence), config, audit))
    }

    fn with_state(
        state: ScheduleState,
        persistence: Option<Persistence>,
        config: StoreConfig,
        audit: Arc<AuditLogger>,
    ) -> Self {
        Self {
            state: RwLock::new(state),
            persistence,
            notifier: ChangeNotifier::new(config.subscriber_buffer),
            engine: AvailabilityEngine::new(),
            audit,
            config,
        }
    }

    /// Number of registered change subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.notifier.subscriber_count()
    }

    async fn read(&self) -> RwLockReadGuard<'_, ScheduleState> {
        self.state.read().await
    }

    async fn write(&self) -> Result<RwLockWriteGuard<'_, ScheduleState>> {
        tokio::time::timeout(self.config.lock_timeout, self.state.write())
            .await
            .map_err(|_| {
                warn!(
                    timeout_ms = self.config.lock_timeout.as_millis() as u64,
                    "Timed out waiting for schedule lock"
                );
                StoreError::Conflict("schedule is busy, try again".to_string())
            })
    }

    /// Apply a command atomically, persist it, then publish its events.
    ///
    /// The flag is true only if the command produced committed events;
    /// rejections and idempotent replays leave it false.
    async fn execute(&self, cmd: Command) -> Result<(Response, bool)> {
        let request_id = cmd.request_id().map(str::to_string);

        let (response, events) = {
            let mut state = self.write().await?;
            let (response, events) = state.apply(cmd);

            if !events.is_empty()
                && let Some(persistence) = &self.persistence
                && let Err(e) =
                    Self::persist(persistence, &events, state.next_reservation_id()).await
            {
                state.revert(&events);
                if let Some(request_id) = &request_id {
                    state.forget_request(request_id);
                }
                return Err(e);
            }
            (response, events)
        };

        for event in &events {
            self.notifier.notify(event);
        }
        Ok((response, !events.is_empty()))
    }

    /// Run the redb commit on the blocking pool; the caller keeps the
    /// write lock until it returns.
    async fn persist(
        persistence: &Persistence,
        events: &[Event],
        next_reservation_id: ReservationId,
    ) -> Result<()> {
        let persistence = persistence.clone();
        let events = events.to_vec();
        tokio::task::spawn_blocking(move || persistence.commit(&events, next_reservation_id))
            .await
            .map_err(|e| StoreError::Internal(format!("persistence task failed: {}", e)))?
    }

    fn validate_create(&self, req: &CreateReservationRequest) -> Result<(i64, DateTime<Utc>)> {
        if req.duration_minutes <= 0 {
            return Err(StoreError::Validation(format!(
                "Duration must be positive, got {} minutes",
                req.duration_minutes
            )));
        }
        let minutes = slot::round_up_minutes(req.duration_minutes).ok_or_else(|| {
            StoreError::Validation(format!(
                "Duration of {} minutes is out of range",
                req.duration_minutes
            ))
        })?;

        if !slot::is_aligned(&req.start_time) {
            return Err(StoreError::InvalidAlignment(format!(
                "Start time {} is not on the {}-minute grid",
                req.start_time.to_rfc3339(),
                slot::SLOT_MINUTES
            )));
        }

        if let Some(description) = &req.description
            && description.chars().count() > MAX_DESCRIPTION_LEN
        {
            return Err(StoreError::Validation(format!(
                "Description exceeds {} characters",
                MAX_DESCRIPTION_LEN
            )));
        }

        let end_time = slot::end_after(&req.start_time, minutes).ok_or_else(|| {
            StoreError::Validation("Reservation end time is out of range".to_string())
        })?;
        Ok((minutes, end_time))
    }
}

#[async_trait]
impl ResourceStore for LocalStore {
    async fn list_resources(&self) -> Result<Vec<ResourceData>> {
        let state = self.read().await;
        Ok(state.list_resources().into_iter().cloned().collect())
    }

    async fn get_resource(&self, id: &str) -> Result<Option<ResourceData>> {
        let state = self.read().await;
        Ok(state.get_resource(id).cloned())
    }

    async fn register_resource(&self, req: RegisterResourceRequest) -> Result<ResourceData> {
        if req.id.trim().is_empty() {
            return Err(StoreError::Validation("Resource id must not be empty".into()));
        }
        if req.name.trim().is_empty() {
            return Err(StoreError::Validation("Resource name must not be empty".into()));
        }

        let cmd = Command::RegisterResource {
            resource: ResourceData {
                id: req.id,
                name: req.name,
                ip_address: req.ip_address,
                ssh_port: req.ssh_port,
                web_port: req.web_port,
            },
        };

        match self.execute(cmd).await? {
            (Response::Resource(data), _) => {
                self.audit.resource_registered(&data);
                Ok(data)
            }
            (Response::Rejected(e), _) => Err(e),
            _ => Err(StoreError::Internal("unexpected response".into())),
        }
    }

    async fn remove_resource(&self, id: &str) -> Result<()> {
        let cmd = Command::RemoveResource { id: id.to_string() };

        match self.execute(cmd).await? {
            (Response::ResourceRemoved { id }, _) => {
                self.audit.resource_removed(&id);
                Ok(())
            }
            (Response::Rejected(e), _) => Err(e),
            _ => Err(StoreError::Internal("unexpected response".into())),
        }
    }
}

#[async_trait]
impl ReservationStore for LocalStore {
    async fn list_reservations(&self, filter: ReservationFilter) -> Result<Vec<ReservationData>> {
        let range = match (filter.start, filter.end) {
            (Some(start), Some(end)) => Some((start, end)),
            (Some(start), None) => Some((start, DateTime::<Utc>::MAX_UTC)),
            (None, Some(end)) => Some((DateTime::<Utc>::MIN_UTC, end)),
            (None, None) => None,
        };
        if let Some((start, end)) = &range
            && end <= start
        {
            return Err(StoreError::Validation(
                "Range end must be after range start".to_string(),
            ));
        }

        let state = self.read().await;
        let reservations = match (&filter.resource_id, &range) {
            (Some(resource_id), _) => {
                if state.get_resource(resource_id).is_none() {
                    return Err(StoreError::NotFound(format!(
                        "Resource '{}' not found",
                        resource_id
                    )));
                }
                let (start, end) =
                    range.unwrap_or((DateTime::<Utc>::MIN_UTC, DateTime::<Utc>::MAX_UTC));
                state.query_by_resource(resource_id, &start, &end)
            }
            (None, Some((start, end))) => state.list_reservations(Some((start, end))),
            (None, None) => state.list_reservations(None),
        };
        Ok(reservations.into_iter().cloned().collect())
    }

    async fn get_reservation(&self, id: ReservationId) -> Result<Option<ReservationData>> {
        let state = self.read().await;
        Ok(state.get_reservation(id).cloned())
    }

    async fn create_reservation(&self, req: CreateReservationRequest) -> Result<ReservationData> {
        // Unknown resources are reported before input errors; `apply` checks
        // again under the write lock.
        if self.read().await.get_resource(&req.resource_id).is_none() {
            return Err(StoreError::NotFound(format!(
                "Resource '{}' not found",
                req.resource_id
            )));
        }
        let (minutes, end_time) = self.validate_create(&req)?;
        debug!(
            resource_id = %req.resource_id,
            start = %req.start_time.to_rfc3339(),
            requested_minutes = req.duration_minutes,
            minutes,
            "Creating reservation"
        );

        let cmd = Command::CreateReservation {
            request_id: req.request_id,
            resource_id: req.resource_id,
            start_time: req.start_time,
            end_time,
            description: req.description,
            created_at: Utc::now(),
        };

        match self.execute(cmd).await? {
            (Response::Reservation(data), committed) => {
                if committed {
                    self.audit.reservation_created(&data);
                }
                Ok(data)
            }
            (Response::Rejected(e), _) => Err(e),
            _ => Err(StoreError::Internal("unexpected response".into())),
        }
    }

    async fn cancel_reservation(&self, id: ReservationId) -> Result<CancelResult> {
        match self.execute(Command::CancelReservation { id }).await? {
            (Response::Cancelled(reservation), _) => {
                self.audit.reservation_cancelled(&reservation);
                Ok(CancelResult { reservation })
            }
            (Response::Rejected(e), _) => Err(e),
            _ => Err(StoreError::Internal("unexpected response".into())),
        }
    }
}

#[async_trait]
impl AvailabilityStore for LocalStore {
    async fn compute_availability(
        &self,
        resource_ids: &[String],
        slots: &[DateTime<Utc>],
    ) -> Result<Vec<ResourceAvailability>> {
        let state = self.read().await;
        self.engine.compute(&state, resource_ids, slots)
    }

    async fn range_availability(
        &self,
        resource_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<RangeAvailability> {
        if end <= start {
            return Err(StoreError::Validation(
                "Range end must be after range start".to_string(),
            ));
        }
        let slots = slot::slots_in_range(&start, &end).ok_or_else(|| {
            StoreError::Validation(format!(
                "Range covers more than {} slots",
                slot::MAX_SLOTS_PER_QUERY
            ))
        })?;

        // One read guard for both parts so they describe the same snapshot
        let state = self.read().await;
        let mut rows = self
            .engine
            .compute(&state, &[resource_id.to_string()], &slots)?;
        let reservations = state
            .query_by_resource(resource_id, &start, &end)
            .into_iter()
            .cloned()
            .collect();

        let availability = rows
            .pop()
            .ok_or_else(|| StoreError::Internal("empty availability result".into()))?;
        Ok(RangeAvailability {
            availability,
            reservations,
        })
    }
}

impl DataStore for LocalStore {
    fn subscribe(&self) -> Subscription {
        self.notifier.subscribe()
    }

    fn unsubscribe(&self, id: SubscriberId) {
        self.notifier.unsubscribe(id);
    }
}
