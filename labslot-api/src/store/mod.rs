//! Data store abstraction layer.
//!
//! Handlers talk to the [`DataStore`] traits; [`LocalStore`] implements them
//! on top of the in-memory schedule state with optional redb durability.

mod error;
mod event;
mod local_store;
mod persist;
mod traits;

pub use error::{Result, StoreError};
pub use event::{Event, EventKind};
pub use local_store::{LocalStore, MAX_DESCRIPTION_LEN, StoreConfig};
pub use persist::{DB_FILE_NAME, Persistence};
pub use traits::*;
