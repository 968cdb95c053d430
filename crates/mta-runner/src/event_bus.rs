//! Per-test event fan-out (`§6.2`), grounded on `hi-youichi-loom`'s `try_send`/drop-on-full
//! stream forwarding: a slow or stalled WebSocket subscriber must never block the loop that
//! produced the event, so publishing never awaits backpressure — it drops and counts instead.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use mta_contracts::events::DomainEvent;
use tokio::sync::{mpsc, RwLock};
use uuid::Uuid;

/// Bounded so a subscriber that never reads cannot grow memory unbounded; sized generously
/// relative to the fastest loop tick (`§6.7` minimum 3s polling interval).
const SUBSCRIBER_QUEUE_CAPACITY: usize = 256;

struct Subscriber {
    id: Uuid,
    tx: mpsc::Sender<DomainEvent>,
    dropped: Arc<AtomicUsize>,
}

#[derive(Default)]
pub struct EventBus {
    subscribers: Arc<RwLock<HashMap<Uuid, Vec<Subscriber>>>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a new subscriber for `test_id`'s event stream. The returned `dropped`
    /// counter lets the caller surface backpressure (e.g. in a ping frame) without needing
    /// a second round trip through the bus.
    pub async fn subscribe(&self, test_id: Uuid) -> (Uuid, mpsc::Receiver<DomainEvent>, Arc<AtomicUsize>) {
        let (tx, rx) = mpsc::channel(SUBSCRIBER_QUEUE_CAPACITY);
        let subscriber_id = Uuid::now_v7();
        let dropped = Arc::new(AtomicUsize::new(0));

        let mut subscribers = self.subscribers.write().await;
        subscribers.entry(test_id).or_default().push(Subscriber {
            id: subscriber_id,
            tx,
            dropped: dropped.clone(),
        });

        (subscriber_id, rx, dropped)
    }

    pub async fn unsubscribe(&self, test_id: Uuid, subscriber_id: Uuid) {
        let mut subscribers = self.subscribers.write().await;
        if let Some(subs) = subscribers.get_mut(&test_id) {
            subs.retain(|s| s.id != subscriber_id);
            if subs.is_empty() {
                subscribers.remove(&test_id);
            }
        }
    }

    /// Removes every subscriber for `test_id` (called when a run is deleted, `§6.1`).
    pub async fn drop_test(&self, test_id: Uuid) {
        self.subscribers.write().await.remove(&test_id);
    }

    /// Fans `event` out to every live subscriber of its `test_id`. A full or disconnected
    /// channel is dropped silently (counted, never retried) — this must never block the
    /// caller, which is usually a hot loop.
    pub async fn publish(&self, event: DomainEvent) {
        let test_id = event.test_id();
        let subscribers = self.subscribers.read().await;
        let Some(subs) = subscribers.get(&test_id) else { return };
        for sub in subs {
            if sub.tx.try_send(event.clone()).is_err() {
                sub.dropped.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    pub async fn subscriber_count(&self, test_id: Uuid) -> usize {
        self.subscribers.read().await.get(&test_id).map(Vec::len).unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mta_contracts::run::TestRunStatus;

    fn status_event(test_id: Uuid) -> DomainEvent {
        DomainEvent::TestStatusChanged {
            test_id,
            previous_status: TestRunStatus::Coordination,
            new_status: TestRunStatus::Executing,
            timestamp: chrono::Utc::now(),
        }
    }

    #[tokio::test]
    async fn subscriber_receives_published_events_for_its_test() {
        let bus = EventBus::new();
        let test_id = Uuid::now_v7();
        let (_id, mut rx, _dropped) = bus.subscribe(test_id).await;

        bus.publish(status_event(test_id)).await;

        let event = rx.recv().await.unwrap();
        assert_eq!(event.test_id(), test_id);
    }

    #[tokio::test]
    async fn events_for_other_tests_are_not_delivered() {
        let bus = EventBus::new();
        let subscribed = Uuid::now_v7();
        let other = Uuid::now_v7();
        let (_id, mut rx, _dropped) = bus.subscribe(subscribed).await;

        bus.publish(status_event(other)).await;

        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn full_queue_increments_dropped_counter_instead_of_blocking() {
        let bus = EventBus::new();
        let test_id = Uuid::now_v7();
        let (_id, _rx, dropped) = bus.subscribe(test_id).await;

        for _ in 0..(SUBSCRIBER_QUEUE_CAPACITY + 10) {
            bus.publish(status_event(test_id)).await;
        }

        assert!(dropped.load(Ordering::Relaxed) > 0);
    }

    #[tokio::test]
    async fn unsubscribe_stops_delivery_and_cleans_up_empty_entry() {
        let bus = EventBus::new();
        let test_id = Uuid::now_v7();
        let (id, _rx, _dropped) = bus.subscribe(test_id).await;

        bus.unsubscribe(test_id, id).await;
        assert_eq!(bus.subscriber_count(test_id).await, 0);
    }
}
