//! Fan-out of room notification events to connected sockets.
//!
//! Delivery is best effort and never blocks a publisher: each subscriber
//! owns a bounded queue, and when a slow consumer overflows it the oldest
//! notification is dropped. That is safe because events are hints, not
//! state; a client that misses one reconciles on its next snapshot fetch.

use dashmap::DashMap;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::Notify;
use tracing::{debug, info, warn};

use crate::models::{ConnectionId, RoomEvent, RoomId, UserId};

pub const DEFAULT_SUBSCRIBER_QUEUE: usize = 64;

#[derive(Debug)]
struct QueueState {
    events: VecDeque<RoomEvent>,
    closed: bool,
    dropped: u64,
}

/// One subscriber's bounded mailbox.
#[derive(Debug)]
struct Queue {
    state: Mutex<QueueState>,
    notify: Notify,
    capacity: usize,
}

impl Queue {
    fn new(capacity: usize) -> Self {
        Self {
            state: Mutex::new(QueueState {
                events: VecDeque::with_capacity(capacity),
                closed: false,
                dropped: 0,
            }),
            notify: Notify::new(),
            capacity,
        }
    }

    /// Enqueue without blocking. On overflow the oldest event is dropped.
    /// Returns false once the queue has been closed.
    fn push(&self, event: RoomEvent) -> bool {
        let mut state = self.state.lock();
        if state.closed {
            return false;
        }
        if state.events.len() >= self.capacity {
            state.events.pop_front();
            state.dropped += 1;
        }
        state.events.push_back(event);
        drop(state);
        self.notify.notify_one();
        true
    }

    fn close(&self) {
        self.state.lock().closed = true;
        self.notify.notify_one();
    }
}

/// Receiving half handed to the socket task. Yields events in order until
/// the subscription is closed.
#[derive(Debug)]
pub struct EventReceiver {
    queue: Arc<Queue>,
}

impl EventReceiver {
    /// Next event, or `None` once unsubscribed and drained.
    pub async fn recv(&mut self) -> Option<RoomEvent> {
        loop {
            {
                let mut state = self.queue.state.lock();
                if let Some(event) = state.events.pop_front() {
                    return Some(event);
                }
                if state.closed {
                    return None;
                }
            }
            // notify_one stores a permit when no task is waiting, so a
            // push between the check above and this await still wakes us.
            self.queue.notify.notified().await;
        }
    }

    #[must_use]
    pub fn try_recv(&mut self) -> Option<RoomEvent> {
        self.queue.state.lock().events.pop_front()
    }

    /// Events discarded so far because this consumer fell behind.
    #[must_use]
    pub fn dropped(&self) -> u64 {
        self.queue.state.lock().dropped
    }
}

#[derive(Debug, Clone)]
struct Subscriber {
    connection_id: ConnectionId,
    user_id: UserId,
    queue: Arc<Queue>,
}

/// In-memory hub routing room events to subscribed connections.
#[derive(Clone)]
pub struct BroadcastHub {
    /// room_id -> subscribers
    rooms: Arc<DashMap<RoomId, Vec<Subscriber>>>,

    /// connection_id -> (room_id, user_id) for cleanup
    connections: Arc<DashMap<ConnectionId, (RoomId, UserId)>>,

    queue_capacity: usize,
}

impl BroadcastHub {
    #[must_use]
    pub fn new() -> Self {
        Self::with_queue_capacity(DEFAULT_SUBSCRIBER_QUEUE)
    }

    #[must_use]
    pub fn with_queue_capacity(queue_capacity: usize) -> Self {
        Self {
            rooms: Arc::new(DashMap::new()),
            connections: Arc::new(DashMap::new()),
            queue_capacity: queue_capacity.max(1),
        }
    }

    /// Subscribe a connection to a room's events.
    pub fn subscribe(
        &self,
        room_id: RoomId,
        user_id: UserId,
        connection_id: ConnectionId,
    ) -> EventReceiver {
        let queue = Arc::new(Queue::new(self.queue_capacity));

        let subscriber = Subscriber {
            connection_id: connection_id.clone(),
            user_id: user_id.clone(),
            queue: queue.clone(),
        };

        self.rooms
            .entry(room_id.clone())
            .or_default()
            .push(subscriber);
        self.connections
            .insert(connection_id.clone(), (room_id.clone(), user_id.clone()));

        info!(
            room_id = %room_id,
            user_id = %user_id,
            connection_id = %connection_id,
            "Client subscribed to room"
        );

        EventReceiver { queue }
    }

    /// Unsubscribe a connection. Idempotent; closes the receiver so a
    /// pending `recv` resolves to `None`.
    pub fn unsubscribe(&self, connection_id: &ConnectionId) {
        if let Some((_, (room_id, user_id))) = self.connections.remove(connection_id) {
            if let Some(mut subscribers) = self.rooms.get_mut(&room_id) {
                if let Some(pos) = subscribers
                    .iter()
                    .position(|sub| sub.connection_id == *connection_id)
                {
                    subscribers.remove(pos).queue.close();
                }
                if subscribers.is_empty() {
                    drop(subscribers); // release the RefMut before removing
                    self.rooms.remove(&room_id);
                    debug!(room_id = %room_id, "Room has no more subscribers, removed");
                }
            }

            info!(
                room_id = %room_id,
                user_id = %user_id,
                connection_id = %connection_id,
                "Client unsubscribed from room"
            );
        } else {
            warn!(
                connection_id = %connection_id,
                "Attempted to unsubscribe unknown connection"
            );
        }
    }

    /// Broadcast an event to every subscriber of a room. Returns the
    /// number of live queues the event was placed on.
    pub fn publish(&self, room_id: &RoomId, event: &RoomEvent) -> usize {
        let mut sent_count = 0;
        let mut closed_connections = Vec::new();

        if let Some(subscribers) = self.rooms.get(room_id) {
            for subscriber in subscribers.iter() {
                if subscriber.queue.push(event.clone()) {
                    sent_count += 1;
                } else {
                    warn!(
                        room_id = %room_id,
                        user_id = %subscriber.user_id,
                        connection_id = %subscriber.connection_id,
                        "Subscriber queue closed, marking for cleanup"
                    );
                    closed_connections.push(subscriber.connection_id.clone());
                }
            }
        }

        for connection_id in closed_connections {
            self.unsubscribe(&connection_id);
        }

        if sent_count > 0 {
            debug!(
                room_id = %room_id,
                sent_count,
                event_type = %event.event_type(),
                "Event broadcast complete"
            );
        }

        sent_count
    }

    /// Deliver an event to one connection only, e.g. telling a late
    /// joiner the room has already ended.
    pub fn send_to(
        &self,
        room_id: &RoomId,
        connection_id: &ConnectionId,
        event: &RoomEvent,
    ) -> bool {
        let delivered = self
            .rooms
            .get(room_id)
            .is_some_and(|subscribers| {
                subscribers
                    .iter()
                    .find(|sub| sub.connection_id == *connection_id)
                    .is_some_and(|sub| sub.queue.push(event.clone()))
            });
        if !delivered {
            debug!(
                room_id = %room_id,
                connection_id = %connection_id,
                event_type = %event.event_type(),
                "Point-to-point event had no live target"
            );
        }
        delivered
    }

    #[must_use]
    pub fn subscriber_count(&self, room_id: &RoomId) -> usize {
        self.rooms
            .get(room_id)
            .map_or(0, |subscribers| subscribers.len())
    }

    #[must_use]
    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }
}

impl Default for BroadcastHub {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn joined(name: &str) -> RoomEvent {
        RoomEvent::UserJoined {
            user_id: UserId::from(name),
        }
    }

    #[tokio::test]
    async fn subscribe_and_publish() {
        let hub = BroadcastHub::new();
        let room_id = RoomId::from_string("test_room".to_string());

        let mut rx = hub.subscribe(room_id.clone(), UserId::from("u1"), ConnectionId::new());
        assert_eq!(hub.subscriber_count(&room_id), 1);
        assert_eq!(hub.connection_count(), 1);

        let sent = hub.publish(&room_id, &joined("u1"));
        assert_eq!(sent, 1);

        let received = rx.recv().await.expect("event");
        assert_eq!(received.event_type(), "liveroom:user_joined");
    }

    #[tokio::test]
    async fn publish_reaches_all_subscribers() {
        let hub = BroadcastHub::new();
        let room_id = RoomId::from_string("test_room".to_string());

        let mut receivers: Vec<EventReceiver> = (0..3)
            .map(|i| {
                hub.subscribe(
                    room_id.clone(),
                    UserId::from(format!("u{i}").as_str()),
                    ConnectionId::new(),
                )
            })
            .collect();

        let sent = hub.publish(&room_id, &joined("u0"));
        assert_eq!(sent, 3);

        for rx in &mut receivers {
            let received = rx.recv().await.expect("event");
            assert_eq!(received.event_type(), "liveroom:user_joined");
        }
    }

    #[tokio::test]
    async fn unsubscribe_closes_receiver() {
        let hub = BroadcastHub::new();
        let room_id = RoomId::from_string("test_room".to_string());
        let connection_id = ConnectionId::new();

        let mut rx = hub.subscribe(room_id.clone(), UserId::from("u1"), connection_id.clone());
        hub.unsubscribe(&connection_id);

        assert_eq!(hub.subscriber_count(&room_id), 0);
        assert_eq!(hub.connection_count(), 0);
        assert!(rx.recv().await.is_none());

        // Publishing to the now-empty room reaches nobody.
        assert_eq!(hub.publish(&room_id, &joined("u1")), 0);
    }

    #[tokio::test]
    async fn unsubscribe_drains_pending_events_first() {
        let hub = BroadcastHub::new();
        let room_id = RoomId::from_string("test_room".to_string());
        let connection_id = ConnectionId::new();

        let mut rx = hub.subscribe(room_id.clone(), UserId::from("u1"), connection_id.clone());
        hub.publish(&room_id, &joined("u1"));
        hub.unsubscribe(&connection_id);

        assert!(rx.recv().await.is_some());
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn overflow_drops_oldest() {
        let hub = BroadcastHub::with_queue_capacity(2);
        let room_id = RoomId::from_string("test_room".to_string());

        let mut rx = hub.subscribe(room_id.clone(), UserId::from("u1"), ConnectionId::new());
        hub.publish(&room_id, &joined("first"));
        hub.publish(&room_id, &joined("second"));
        hub.publish(&room_id, &joined("third"));

        // "first" was dropped; the two newest remain in order.
        assert_eq!(
            rx.recv().await,
            Some(RoomEvent::UserJoined {
                user_id: UserId::from("second")
            })
        );
        assert_eq!(
            rx.recv().await,
            Some(RoomEvent::UserJoined {
                user_id: UserId::from("third")
            })
        );
        assert_eq!(rx.dropped(), 1);
    }

    #[tokio::test]
    async fn send_to_targets_single_connection() {
        let hub = BroadcastHub::new();
        let room_id = RoomId::from_string("test_room".to_string());
        let conn1 = ConnectionId::new();
        let conn2 = ConnectionId::new();

        let mut rx1 = hub.subscribe(room_id.clone(), UserId::from("u1"), conn1.clone());
        let mut rx2 = hub.subscribe(room_id.clone(), UserId::from("u2"), conn2);

        assert!(hub.send_to(&room_id, &conn1, &RoomEvent::RoomEnded));

        let received = rx1.recv().await.expect("event");
        assert_eq!(received.event_type(), "liveroom:ended");
        assert!(rx2.try_recv().is_none());
    }

    #[tokio::test]
    async fn send_to_unknown_connection_is_noop() {
        let hub = BroadcastHub::new();
        let room_id = RoomId::from_string("test_room".to_string());
        assert!(!hub.send_to(&room_id, &ConnectionId::new(), &RoomEvent::RoomEnded));
    }
}
