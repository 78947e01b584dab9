use axum::{
    extract::State,
    response::{
        Sse,
        sse::{Event as SseEvent, KeepAlive},
    },
};
use futures::stream::Stream;
use serde::Serialize;
use std::{convert::Infallible, sync::Arc, time::Duration};
use tracing::debug;

use crate::notifier::SubscriberId;
use crate::store::Event;

use super::{AppState, Reservation, Resource};

/// Payload of a `reservation_update` event
#[derive(Serialize)]
pub struct ReservationUpdate {
    /// `created` or `cancelled`
    pub action: &'static str,
    pub reservation: Reservation,
}

/// Payload of a `resource_update` event
#[derive(Serialize)]
pub struct ResourceUpdate {
    /// `created` or `removed`
    pub action: &'static str,
    pub resource: Resource,
}

/// Removes the subscriber when the client's stream is dropped.
struct SubscriberGuard {
    state: Arc<AppState>,
    id: SubscriberId,
}

impl Drop for SubscriberGuard {
    fn drop(&mut self) {
        debug!(subscriber = self.id, "Event stream closed");
        self.state.store.unsubscribe(self.id);
    }
}

fn to_sse(event: &Event) -> Option<SseEvent> {
    let action = event.kind().action();
    let (name, data) = match event {
        Event::ReservationCreated(r) | Event::ReservationCancelled(r) => (
            "reservation_update",
            serde_json::to_string(&ReservationUpdate {
                action,
                reservation: r.into(),
            }),
        ),
        Event::ResourceRegistered(r) | Event::ResourceRemoved(r) => (
            "resource_update",
            serde_json::to_string(&ResourceUpdate {
                action,
                resource: r.clone().into(),
            }),
        ),
    };
    data.ok().map(|data| SseEvent::default().event(name).data(data))
}

/// SSE stream of schedule change events
pub async fn schedule_events(
    State(state): State<Arc<AppState>>,
) -> Sse<impl Stream<Item = Result<SseEvent, Infallible>>> {
    let mut subscription = state.store.subscribe();
    let guard = SubscriberGuard {
        state: state.clone(),
        id: subscription.id,
    };

    let stream = async_stream::stream! {
        let _guard = guard;
        while let Some(event) = subscription.receiver.recv().await {
            if let Some(sse) = to_sse(&event) {
                yield Ok(sse);
            }
        }
    };

    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(30))
            .text("ping"),
    )
}
