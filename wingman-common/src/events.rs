//! Store change notifications
//!
//! Every write through the artifact store or identity repository emits a
//! [`StoreEvent`] on the shared [`EventBus`]. Observers (the virtues11
//! auto-generation watcher, UI refreshers) subscribe instead of polling.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Change to a stored record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum StoreEvent {
    /// New match profile saved
    MatchProfileAdded { id: i64 },

    /// Match profile fields merged
    MatchProfileUpdated { id: i64 },

    /// Match profile removed
    MatchProfileDeleted { id: i64 },

    /// The singleton identity record was written
    IdentityChanged,

    /// Coaching session saved for a profile
    CoachingSessionAdded { id: i64, profile_id: i64 },

    /// Outcome recorded on a coaching session
    CoachingSessionUpdated { id: i64 },

    /// Inference audit entry appended
    InferenceRecorded { id: i64 },
}

impl StoreEvent {
    /// Event name as serialized in the `type` tag
    pub fn event_type(&self) -> &str {
        match self {
            StoreEvent::MatchProfileAdded { .. } => "MatchProfileAdded",
            StoreEvent::MatchProfileUpdated { .. } => "MatchProfileUpdated",
            StoreEvent::MatchProfileDeleted { .. } => "MatchProfileDeleted",
            StoreEvent::IdentityChanged => "IdentityChanged",
            StoreEvent::CoachingSessionAdded { .. } => "CoachingSessionAdded",
            StoreEvent::CoachingSessionUpdated { .. } => "CoachingSessionUpdated",
            StoreEvent::InferenceRecorded { .. } => "InferenceRecorded",
        }
    }

    /// Match profile this event concerns, if any
    pub fn profile_id(&self) -> Option<i64> {
        match self {
            StoreEvent::MatchProfileAdded { id }
            | StoreEvent::MatchProfileUpdated { id }
            | StoreEvent::MatchProfileDeleted { id } => Some(*id),
            StoreEvent::CoachingSessionAdded { profile_id, .. } => Some(*profile_id),
            StoreEvent::IdentityChanged
            | StoreEvent::CoachingSessionUpdated { .. }
            | StoreEvent::InferenceRecorded { .. } => None,
        }
    }
}

/// Fan-out of store events
///
/// Backed by `tokio::sync::broadcast`: publishing never blocks, slow
/// subscribers observe `RecvError::Lagged` instead of stalling writers.
///
/// # Examples
///
/// ```
/// use wingman_common::events::{EventBus, StoreEvent};
///
/// let bus = EventBus::new(64);
/// let mut rx = bus.subscribe();
/// bus.emit_lossy(StoreEvent::IdentityChanged);
/// assert_eq!(rx.try_recv().unwrap(), StoreEvent::IdentityChanged);
/// ```
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<StoreEvent>,
    capacity: usize,
}

impl EventBus {
    /// Create a bus buffering up to `capacity` events per subscriber
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, capacity }
    }

    /// Subscribe to all future events
    pub fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
        self.tx.subscribe()
    }

    /// Emit an event to all subscribers
    ///
    /// Returns `Err` if no subscribers are listening.
    #[allow(clippy::result_large_err)]
    pub fn emit(&self, event: StoreEvent) -> Result<usize, broadcast::error::SendError<StoreEvent>> {
        self.tx.send(event)
    }

    /// Emit an event, ignoring if no subscribers are listening
    pub fn emit_lossy(&self, event: StoreEvent) {
        let _ = self.tx.send(event);
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_eventbus_subscribe() {
        let bus = EventBus::new(10);
        let _rx = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 1);

        let _rx2 = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 2);
    }

    #[test]
    fn test_eventbus_emit_without_subscribers() {
        let bus = EventBus::new(10);
        assert!(bus.emit(StoreEvent::IdentityChanged).is_err());
        // lossy variant swallows the same condition
        bus.emit_lossy(StoreEvent::IdentityChanged);
    }

    #[test]
    fn test_eventbus_multiple_subscribers() {
        let bus = EventBus::new(10);
        let mut rx1 = bus.subscribe();
        let mut rx2 = bus.subscribe();

        bus.emit(StoreEvent::MatchProfileAdded { id: 4 }).unwrap();

        assert_eq!(rx1.try_recv().unwrap(), StoreEvent::MatchProfileAdded { id: 4 });
        assert_eq!(rx2.try_recv().unwrap().profile_id(), Some(4));
    }

    #[test]
    fn test_event_serialization_tag() {
        let event = StoreEvent::CoachingSessionAdded { id: 2, profile_id: 9 };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"type\":\"CoachingSessionAdded\""));
        assert_eq!(event.event_type(), "CoachingSessionAdded");

        let back: StoreEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(back, event);
    }
}
