//! Change notifier - explicit registry of live-update subscribers.
//!
//! Delivery is fire-and-forget: `notify` never blocks and never fails. A
//! subscriber whose queue is full misses the event; one whose receiver is
//! gone is dropped from the registry. Clients recover by refetching.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::store::Event;

/// Identifier of a registered subscriber.
pub type SubscriberId = u64;

/// Default per-subscriber queue depth.
pub const DEFAULT_SUBSCRIBER_BUFFER: usize = 64;

/// A live subscription handed to a connected client.
pub struct Subscription {
    pub id: SubscriberId,
    pub receiver: mpsc::Receiver<Event>,
}

/// Subscriber registry plus publish operation.
pub struct ChangeNotifier {
    subscribers: Mutex<HashMap<SubscriberId, mpsc::Sender<Event>>>,
    next_id: AtomicU64,
    buffer: usize,
}

impl ChangeNotifier {
    pub fn new(buffer: usize) -> Self {
        Self {
            subscribers: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            buffer: buffer.max(1),
        }
    }

    /// Register a new subscriber.
    pub fn subscribe(&self) -> Subscription {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, receiver) = mpsc::channel(self.buffer);
        self.lock().insert(id, tx);
        debug!(subscriber = id, "Subscriber registered");
        Subscription { id, receiver }
    }

    /// Remove a subscriber. Returns false if it was not registered.
    pub fn unsubscribe(&self, id: SubscriberId) -> bool {
        let removed = self.lock().remove(&id).is_some();
        if removed {
            debug!(subscriber = id, "Subscriber removed");
        }
        removed
    }

    pub fn subscriber_count(&self) -> usize {
        self.lock().len()
    }

    /// Deliver `event` to every current subscriber without waiting.
    pub fn notify(&self, event: &Event) {
        let mut subscribers = self.lock();
        subscribers.retain(|id, tx| match tx.try_send(event.clone()) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) => {
                warn!(
                    subscriber = *id,
                    kind = ?event.kind(),
                    resource_id = event.resource_id(),
                    "Subscriber queue full, dropping event"
                );
                true
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                debug!(subscriber = *id, "Subscriber disconnected");
                false
            }
        });
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<SubscriberId, mpsc::Sender<Event>>> {
        // A panic while holding the lock cannot leave the map half-updated
        self.subscribers
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Default for ChangeNotifier {
    fn default() -> Self {
        Self::new(DEFAULT_SUBSCRIBER_BUFFER)
    }
}
