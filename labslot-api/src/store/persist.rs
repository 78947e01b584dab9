//! Durable schedule storage backed by redb.
//!
//! Layout:
//! - `reservations`: reservation id -> JSON record
//! - `idx_resource_start`: (resource id, start unix seconds, reservation id) -> ()
//! - `resources`: resource id -> JSON record
//! - `meta`: `next_reservation_id` -> u64

use std::path::Path;
use std::sync::Arc;

use redb::{Database, ReadableTable, TableDefinition, WriteTransaction};
use tracing::{debug, info};

use crate::command::{ReservationData, ReservationId, ResourceData};
use crate::state::ScheduleState;

use super::error::{Result, StoreError};
use super::event::Event;

const TABLE_RESERVATIONS: TableDefinition<u64, &[u8]> = TableDefinition::new("reservations");
const TABLE_IDX_RESOURCE_START: TableDefinition<(&str, i64, u64), ()> =
    TableDefinition::new("idx_resource_start");
const TABLE_RESOURCES: TableDefinition<&str, &[u8]> = TableDefinition::new("resources");
const TABLE_META: TableDefinition<&str, u64> = TableDefinition::new("meta");

const META_NEXT_RESERVATION_ID: &str = "next_reservation_id";

/// File name of the schedule database inside the data directory.
pub const DB_FILE_NAME: &str = "labslot.redb";

/// Handle to the schedule database. Clones share one `Database`.
#[derive(Clone)]
pub struct Persistence {
    db: Arc<Database>,
}

impl Persistence {
    /// Open (or create) the schedule database in `data_dir`.
    pub fn open(data_dir: impl AsRef<Path>) -> Result<Self> {
        let db_path = data_dir.as_ref().join(DB_FILE_NAME);
        let db = Database::create(&db_path).map_err(redb::Error::from)?;

        let txn = db.begin_write().map_err(redb::Error::from)?;
        Self::open_tables(&txn).map_err(|e| StoreError::Internal(e.to_string()))?;
        txn.commit().map_err(redb::Error::from)?;

        info!(path = %db_path.display(), "Opened schedule database");
        Ok(Self { db: Arc::new(db) })
    }

    fn open_tables(txn: &WriteTransaction) -> std::result::Result<(), redb::TableError> {
        txn.open_table(TABLE_RESERVATIONS)?;
        txn.open_table(TABLE_IDX_RESOURCE_START)?;
        txn.open_table(TABLE_RESOURCES)?;
        txn.open_table(TABLE_META)?;
        Ok(())
    }

    /// Load the persisted schedule into memory.
    pub fn load(&self) -> Result<ScheduleState> {
        let (resources, reservations, next_id) = self
            .read_all()
            .map_err(|e| StoreError::Internal(e.to_string()))?;
        debug!(
            resources = resources.len(),
            reservations = reservations.len(),
            next_id,
            "Loaded schedule"
        );
        ScheduleState::restore(resources, reservations, next_id)
    }

    fn read_all(
        &self,
    ) -> std::result::Result<(Vec<ResourceData>, Vec<ReservationData>, ReservationId), redb::Error>
    {
        let txn = self.db.begin_read()?;

        let mut resources = Vec::new();
        for entry in txn.open_table(TABLE_RESOURCES)?.iter()? {
            let (_, value) = entry?;
            resources.push(decode(value.value())?);
        }

        // Walk the index so records come back in (resource, start) order
        let reservation_table = txn.open_table(TABLE_RESERVATIONS)?;
        let mut reservations = Vec::new();
        for entry in txn.open_table(TABLE_IDX_RESOURCE_START)?.iter()? {
            let (key, _) = entry?;
            let (_, _, id) = key.value();
            if let Some(value) = reservation_table.get(id)? {
                reservations.push(decode(value.value())?);
            }
        }

        let next_id = txn
            .open_table(TABLE_META)?
            .get(META_NEXT_RESERVATION_ID)?
            .map(|v| v.value())
            .unwrap_or(1);

        Ok((resources, reservations, next_id))
    }

    /// Durably record committed events in a single transaction.
    pub fn commit(&self, events: &[Event], next_reservation_id: ReservationId) -> Result<()> {
        self.write_events(events, next_reservation_id)
            .map_err(|e| StoreError::Internal(format!("failed to persist schedule: {}", e)))
    }

    fn write_events(
        &self,
        events: &[Event],
        next_reservation_id: ReservationId,
    ) -> std::result::Result<(), redb::Error> {
        let txn = self.db.begin_write()?;
        {
            let mut reservations = txn.open_table(TABLE_RESERVATIONS)?;
            let mut idx = txn.open_table(TABLE_IDX_RESOURCE_START)?;
            let mut resources = txn.open_table(TABLE_RESOURCES)?;
            let mut meta = txn.open_table(TABLE_META)?;

            for event in events {
                match event {
                    Event::ReservationCreated(r) => {
                        let encoded = encode(r)?;
                        reservations.insert(r.id, encoded.as_slice())?;
                        idx.insert(
                            (r.resource_id.as_str(), r.start_time.timestamp(), r.id),
                            (),
                        )?;
                    }
                    Event::ReservationCancelled(r) => {
                        reservations.remove(r.id)?;
                        idx.remove((r.resource_id.as_str(), r.start_time.timestamp(), r.id))?;
                    }
                    Event::ResourceRegistered(r) => {
                        let encoded = encode(r)?;
                        resources.insert(r.id.as_str(), encoded.as_slice())?;
                    }
                    Event::ResourceRemoved(r) => {
                        resources.remove(r.id.as_str())?;
                    }
                }
            }

            meta.insert(META_NEXT_RESERVATION_ID, next_reservation_id)?;
        }
        txn.commit()?;
        Ok(())
    }
}

fn encode<T: serde::Serialize>(value: &T) -> std::result::Result<Vec<u8>, redb::Error> {
    serde_json::to_vec(value).map_err(|e| redb::Error::Corrupted(e.to_string()))
}

fn decode<T: serde::de::DeserializeOwned>(bytes: &[u8]) -> std::result::Result<T, redb::Error> {
    serde_json::from_slice(bytes).map_err(|e| redb::Error::Corrupted(e.to_string()))
}
