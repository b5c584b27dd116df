//! Topic-based event bus between the game core and its host.
//!
//! Topics are plain strings. Delivery is synchronous and in subscription
//! order, to the subscribers present when `publish` is called. Publishing
//! to a topic nobody listens on is a silent no-op. Subscriptions are never
//! removed; the bus lives as long as the host.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex, MutexGuard},
};

use serde::Serialize;

use crate::scene::PhaseHandle;

/// Published on every phase entry. Payload: [`BusPayload::Phase`].
pub const PHASE_READY: &str = "phase-ready";
/// Published when the core wants the host to surface UI outside the game canvas.
pub const OVERLAY_REQUESTED: &str = "overlay-requested";

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum BusPayload {
    None,
    Phase(PhaseHandle),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Handler = Arc<dyn Fn(&BusPayload) + Send + Sync>;

#[derive(Default)]
struct Subscribers {
    by_topic: HashMap<String, Vec<(SubscriptionId, Handler)>>,
    next_id: u64,
}

/// Cheap to clone; every clone shares the same subscribers.
#[derive(Clone, Default)]
pub struct EventBus {
    inner: Arc<Mutex<Subscribers>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler for `topic`.
    pub fn subscribe<F>(&self, topic: &str, handler: F) -> SubscriptionId
    where
        F: Fn(&BusPayload) + Send + Sync + 'static,
    {
        let mut subs = self.lock();
        subs.next_id += 1;
        let id = SubscriptionId(subs.next_id);
        let handler: Handler = Arc::new(handler);
        subs.by_topic.entry(topic.to_string()).or_default().push((id, handler));
        tracing::trace!(target: "reef_quiz", topic, ?id, "Bus subscription added");
        id
    }

    /// Deliver `payload` to every current subscriber of `topic`.
    /// Returns how many handlers ran.
    pub fn publish(&self, topic: &str, payload: BusPayload) -> usize {
        // Snapshot, then call outside the lock so handlers may publish or subscribe.
        let handlers: Vec<Handler> = match self.lock().by_topic.get(topic) {
            Some(list) => list.iter().map(|(_, h)| Arc::clone(h)).collect(),
            None => Vec::new(),
        };

        if handlers.is_empty() {
            tracing::trace!(target: "reef_quiz", topic, "No subscribers for topic");
            return 0;
        }

        for handler in &handlers {
            handler(&payload);
        }
        handlers.len()
    }

    #[cfg(test)]
    pub fn subscriber_count(&self, topic: &str) -> usize {
        self.lock().by_topic.get(topic).map_or(0, Vec::len)
    }

    fn lock(&self) -> MutexGuard<'_, Subscribers> {
        // A handler panicking mid-publish does not hold the lock, so poisoning
        // only comes from subscribe; the map is still consistent.
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let subs = self.lock();
        f.debug_struct("EventBus")
            .field("topics", &subs.by_topic.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn recorder(bus: &EventBus, topic: &str, tag: &'static str, log: &Arc<Mutex<Vec<String>>>) {
        let log = Arc::clone(log);
        bus.subscribe(topic, move |payload| {
            log.lock().unwrap().push(format!("{tag}:{payload:?}"));
        });
    }

    #[test]
    fn publish_without_subscribers_is_a_no_op() {
        let bus = EventBus::new();
        assert_eq!(bus.publish(OVERLAY_REQUESTED, BusPayload::None), 0);
    }

    #[test]
    fn delivery_follows_subscription_order() {
        let bus = EventBus::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        recorder(&bus, OVERLAY_REQUESTED, "first", &log);
        recorder(&bus, OVERLAY_REQUESTED, "second", &log);

        assert_eq!(bus.publish(OVERLAY_REQUESTED, BusPayload::None), 2);
        assert_eq!(*log.lock().unwrap(), vec!["first:None", "second:None"]);
    }

    #[test]
    fn topics_are_isolated() {
        let bus = EventBus::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        recorder(&bus, PHASE_READY, "phase", &log);

        bus.publish(OVERLAY_REQUESTED, BusPayload::None);
        assert!(log.lock().unwrap().is_empty());
        assert_eq!(bus.subscriber_count(PHASE_READY), 1);
        assert_eq!(bus.subscriber_count(OVERLAY_REQUESTED), 0);
    }

    #[test]
    fn clones_share_subscribers() {
        let bus = EventBus::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        recorder(&bus, OVERLAY_REQUESTED, "a", &log);

        let other = bus.clone();
        assert_eq!(other.publish(OVERLAY_REQUESTED, BusPayload::None), 1);
    }

    #[test]
    fn handlers_may_publish_reentrantly() {
        let bus = EventBus::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        recorder(&bus, "inner", "inner", &log);

        let relay = bus.clone();
        bus.subscribe("outer", move |_| {
            relay.publish("inner", BusPayload::None);
        });

        assert_eq!(bus.publish("outer", BusPayload::None), 1);
        assert_eq!(*log.lock().unwrap(), vec!["inner:None"]);
    }

    #[test]
    fn late_subscribers_miss_earlier_events() {
        let bus = EventBus::new();
        bus.publish(OVERLAY_REQUESTED, BusPayload::None);

        let log = Arc::new(Mutex::new(Vec::new()));
        recorder(&bus, OVERLAY_REQUESTED, "late", &log);
        assert!(log.lock().unwrap().is_empty());
    }
}
