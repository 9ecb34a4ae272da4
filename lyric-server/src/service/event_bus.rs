//! Event bus
//!
//! Process-wide fan-out of job events. Every subscriber owns a bounded channel;
//! the bus keeps the most recent events in a ring buffer so a late or
//! reconnecting observer can catch up from a snapshot.
//!
//! Publishing never blocks: a subscriber whose channel is full or closed is
//! dropped on the spot.

use lyric_core::domain::event::{Event, EventKind};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::debug;

/// Identifier of a live subscription
pub type SubscriptionId = u64;

/// Broadcasts events to subscribers and retains the last K of them
pub struct EventBus {
    state: Mutex<BusState>,
    buffer_capacity: usize,
    subscriber_capacity: usize,
}

struct BusState {
    next_seq: u64,
    next_subscription: SubscriptionId,
    buffer: VecDeque<Event>,
    subscribers: HashMap<SubscriptionId, mpsc::Sender<Event>>,
}

impl EventBus {
    /// Creates a bus retaining `buffer_capacity` events, with
    /// `subscriber_capacity` slots per subscriber channel
    pub fn new(buffer_capacity: usize, subscriber_capacity: usize) -> Arc<Self> {
        let buffer_capacity = buffer_capacity.max(1);
        Arc::new(Self {
            state: Mutex::new(BusState {
                next_seq: 1,
                next_subscription: 1,
                buffer: VecDeque::with_capacity(buffer_capacity),
                subscribers: HashMap::new(),
            }),
            buffer_capacity,
            subscriber_capacity: subscriber_capacity.max(1),
        })
    }

    fn lock(&self) -> MutexGuard<'_, BusState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Publishes an event to the ring buffer and every live subscriber
    ///
    /// Returns the event with its assigned sequence number.
    pub fn publish(&self, kind: EventKind) -> Event {
        let mut state = self.lock();

        let event = Event {
            seq: state.next_seq,
            timestamp: chrono::Utc::now(),
            kind,
        };
        state.next_seq += 1;

        if state.buffer.len() == self.buffer_capacity {
            state.buffer.pop_front();
        }
        state.buffer.push_back(event.clone());

        state
            .subscribers
            .retain(|id, tx| match tx.try_send(event.clone()) {
                Ok(()) => true,
                Err(TrySendError::Full(_)) => {
                    debug!("Dropping subscriber {}: channel full", id);
                    false
                }
                Err(TrySendError::Closed(_)) => {
                    debug!("Dropping subscriber {}: channel closed", id);
                    false
                }
            });

        event
    }

    /// Returns the buffered events and registers a new subscriber
    ///
    /// Both happen under the same lock as `publish`, so the subscriber's live
    /// channel starts exactly where the snapshot ends.
    pub fn subscribe(self: &Arc<Self>) -> (Vec<Event>, Subscription) {
        let (tx, rx) = mpsc::channel(self.subscriber_capacity);

        let mut state = self.lock();
        let id = state.next_subscription;
        state.next_subscription += 1;
        state.subscribers.insert(id, tx);
        let snapshot = state.buffer.iter().cloned().collect();
        drop(state);

        debug!("Subscriber {} registered", id);

        let subscription = Subscription {
            id,
            receiver: rx,
            bus: Arc::downgrade(self),
        };
        (snapshot, subscription)
    }

    /// Removes a subscriber. Returns false if it was already gone.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let removed = self.lock().subscribers.remove(&id).is_some();
        if removed {
            debug!("Subscriber {} unsubscribed", id);
        }
        removed
    }

    /// Current ring buffer contents, oldest first
    pub fn snapshot(&self) -> Vec<Event> {
        self.lock().buffer.iter().cloned().collect()
    }

    /// Clears the buffer and restarts sequence numbers for a new job
    ///
    /// Live subscribers stay registered.
    pub fn reset(&self) {
        let mut state = self.lock();
        state.buffer.clear();
        state.next_seq = 1;
    }

    pub fn subscriber_count(&self) -> usize {
        self.lock().subscribers.len()
    }
}

/// Outcome of waiting on a subscription
#[derive(Debug, Clone, PartialEq)]
pub enum Delivery {
    Event(Event),
    /// Nothing was published within the keepalive interval
    Keepalive,
    /// The bus dropped this subscriber (too slow) or went away
    Closed,
}

/// A live subscriber's receiving end
///
/// Dropping it unsubscribes from the bus.
pub struct Subscription {
    id: SubscriptionId,
    receiver: mpsc::Receiver<Event>,
    bus: Weak<EventBus>,
}

impl Subscription {
    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    /// Waits for the next event; `None` once the bus dropped this subscriber
    pub async fn recv(&mut self) -> Option<Event> {
        self.receiver.recv().await
    }

    /// Waits for the next event, giving up with `Keepalive` after `interval`
    pub async fn next_or_keepalive(&mut self, interval: Duration) -> Delivery {
        match tokio::time::timeout(interval, self.receiver.recv()).await {
            Ok(Some(event)) => Delivery::Event(event),
            Ok(None) => Delivery::Closed,
            Err(_) => Delivery::Keepalive,
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(bus) = self.bus.upgrade() {
            bus.unsubscribe(self.id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(n: usize) -> EventKind {
        EventKind::LineProduced {
            time: format!("[00:{:02}.00]", n % 60),
            text: format!("line {}", n),
        }
    }

    fn seqs(events: &[Event]) -> Vec<u64> {
        events.iter().map(|e| e.seq).collect()
    }

    fn drain(subscription: &mut Subscription) -> Vec<Event> {
        let mut events = Vec::new();
        while let Ok(event) = subscription.receiver.try_recv() {
            events.push(event);
        }
        events
    }

    #[test]
    fn test_ring_buffer_evicts_oldest() {
        let bus = EventBus::new(3, 10);
        for n in 0..4 {
            bus.publish(line(n));
        }

        let snapshot = bus.snapshot();
        assert_eq!(snapshot.len(), 3);
        assert_eq!(seqs(&snapshot), vec![2, 3, 4]);
    }

    #[test]
    fn test_sequence_numbers_restart_after_reset() {
        let bus = EventBus::new(10, 10);
        assert_eq!(bus.publish(line(0)).seq, 1);
        assert_eq!(bus.publish(line(1)).seq, 2);

        bus.reset();
        assert!(bus.snapshot().is_empty());
        assert_eq!(bus.publish(line(2)).seq, 1);
    }

    #[test]
    fn test_snapshot_and_live_are_contiguous() {
        let bus = EventBus::new(10, 10);
        for n in 0..3 {
            bus.publish(line(n));
        }

        let (snapshot, mut subscription) = bus.subscribe();
        for n in 3..5 {
            bus.publish(line(n));
        }

        let mut all = snapshot;
        all.extend(drain(&mut subscription));
        assert_eq!(seqs(&all), vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn test_late_joiner_loses_only_evicted_prefix() {
        let bus = EventBus::new(4, 10);
        for n in 0..10 {
            bus.publish(line(n));
        }

        let (snapshot, mut subscription) = bus.subscribe();
        bus.publish(line(10));

        let mut all = snapshot;
        all.extend(drain(&mut subscription));
        assert_eq!(seqs(&all), vec![7, 8, 9, 10, 11]);
    }

    #[test]
    fn test_slow_subscriber_is_dropped_without_affecting_others() {
        let bus = EventBus::new(100, 2);
        let (_, mut slow) = bus.subscribe();
        let (_, mut fast) = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 2);

        let mut received = Vec::new();
        for n in 0..5 {
            bus.publish(line(n));
            received.extend(drain(&mut fast));
        }

        assert_eq!(seqs(&received), vec![1, 2, 3, 4, 5]);
        assert_eq!(bus.subscriber_count(), 1);

        // The slow subscriber keeps what fit, then sees the channel closed
        assert_eq!(seqs(&drain(&mut slow)), vec![1, 2]);
        assert!(slow.receiver.try_recv().is_err());
    }

    #[test]
    fn test_unsubscribe_is_idempotent() {
        let bus = EventBus::new(10, 10);
        let (_, subscription) = bus.subscribe();
        let id = subscription.id();

        assert!(bus.unsubscribe(id));
        assert!(!bus.unsubscribe(id));
        drop(subscription);
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[test]
    fn test_drop_unsubscribes() {
        let bus = EventBus::new(10, 10);
        let (_, subscription) = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 1);

        drop(subscription);
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[test]
    fn test_subscribers_observe_global_order() {
        let bus = EventBus::new(1000, 1000);
        let (_, mut first) = bus.subscribe();
        let (_, mut second) = bus.subscribe();

        let publishers: Vec<_> = (0..4)
            .map(|t| {
                let bus = Arc::clone(&bus);
                std::thread::spawn(move || {
                    for n in 0..50 {
                        bus.publish(line(t * 100 + n));
                    }
                })
            })
            .collect();
        for handle in publishers {
            handle.join().unwrap();
        }

        let first = drain(&mut first);
        let second = drain(&mut second);
        assert_eq!(first.len(), 200);
        assert_eq!(first, second);
        assert_eq!(seqs(&first), (1..=200).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn test_next_or_keepalive() {
        let bus = EventBus::new(10, 10);
        let (_, mut subscription) = bus.subscribe();
        let interval = Duration::from_millis(20);

        assert_eq!(
            subscription.next_or_keepalive(interval).await,
            Delivery::Keepalive
        );

        let published = bus.publish(EventKind::JobCancelled);
        assert_eq!(
            subscription.next_or_keepalive(interval).await,
            Delivery::Event(published)
        );

        bus.unsubscribe(subscription.id());
        assert_eq!(
            subscription.next_or_keepalive(interval).await,
            Delivery::Closed
        );
    }
}
