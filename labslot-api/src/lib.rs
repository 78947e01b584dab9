pub mod audit;
pub mod availability;
pub mod command;
pub mod notifier;
pub mod rest;
pub mod seed;
pub mod slot;
pub mod state;
pub mod store;

pub use audit::{AuditLogger, create_audit_logger};
pub use availability::AvailabilityEngine;
pub use command::{Command, ReservationData, ReservationId, ResourceData, Response};
pub use notifier::ChangeNotifier;
pub use state::ScheduleState;
pub use store::{DataStore, Event, LocalStore, StoreConfig, StoreError};
