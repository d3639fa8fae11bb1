//! Intent application and event fan-out.
//!
//! The coordinator owns the registry, the hub, and the rate limiter. An
//! intent is applied under its room's lock, the resulting events are
//! snapshotted, the lock is released, and only then are the events
//! published. Publishing never happens while a room lock is held, so a
//! slow subscriber can never stall mutation.

use std::sync::Arc;
use tracing::info;

use crate::config::Config;
use crate::error::Result;
use crate::hub::BroadcastHub;
use crate::limits::RateLimiter;
use crate::models::{
    RoomCategory, RoomEvent, RoomId, RoomMetadata, RoomSnapshot, RoomSummary, UserId,
};
use crate::registry::RoomRegistry;
use crate::room::Room;

#[derive(Clone)]
pub struct PresenceCoordinator {
    registry: Arc<RoomRegistry>,
    hub: BroadcastHub,
    limiter: RateLimiter,
    speaker_cap: Option<usize>,
    raise_hand_max: u32,
    raise_hand_window_seconds: u64,
}

impl PresenceCoordinator {
    #[must_use]
    pub fn new(config: &Config) -> Self {
        Self {
            registry: Arc::new(RoomRegistry::new()),
            hub: BroadcastHub::with_queue_capacity(config.rooms.subscriber_queue),
            limiter: RateLimiter::new("liveroom:".to_string()),
            speaker_cap: config.rooms.speaker_cap(),
            raise_hand_max: config.limits.raise_hand_max,
            raise_hand_window_seconds: config.limits.raise_hand_window_seconds,
        }
    }

    #[must_use]
    pub fn hub(&self) -> &BroadcastHub {
        &self.hub
    }

    /// Apply one intent under the room's lock, then publish the resulting
    /// events with the lock released. A room that ended during the intent
    /// is dropped from the registry after the terminal event goes out.
    fn apply<F>(&self, room_id: &RoomId, intent: F) -> Result<Vec<RoomEvent>>
    where
        F: FnOnce(&mut Room) -> Result<Vec<RoomEvent>>,
    {
        let handle = self.registry.get(room_id)?;
        let events = {
            let mut room = handle.lock();
            intent(&mut room)?
        };

        let ended = events.iter().any(|e| matches!(e, RoomEvent::RoomEnded));
        for event in &events {
            self.hub.publish(room_id, event);
        }
        if ended {
            self.registry.remove(room_id);
            info!(room_id = %room_id, "Room ended and removed");
        }
        Ok(events)
    }

    pub fn create_room(&self, host: UserId, metadata: RoomMetadata) -> Result<RoomSnapshot> {
        let (room_id, handle) = self.registry.create(host.clone(), metadata)?;
        info!(room_id = %room_id, host = %host, "Room created");
        let snapshot = handle.lock().snapshot();
        Ok(snapshot)
    }

    pub fn snapshot(&self, room_id: &RoomId) -> Result<RoomSnapshot> {
        Ok(self.registry.get(room_id)?.lock().snapshot())
    }

    #[must_use]
    pub fn list_rooms(&self, category: Option<RoomCategory>) -> Vec<RoomSummary> {
        self.registry.list(category)
    }

    pub fn join(&self, room_id: &RoomId, user_id: &UserId) -> Result<()> {
        self.apply(room_id, |room| room.join(user_id.clone()).map(|e| vec![e]))?;
        Ok(())
    }

    pub fn leave(&self, room_id: &RoomId, user_id: &UserId) -> Result<()> {
        self.apply(room_id, |room| room.leave(user_id))?;
        Ok(())
    }

    pub fn raise_hand(&self, room_id: &RoomId, user_id: &UserId) -> Result<()> {
        self.limiter.check(
            &format!("user:{user_id}:raise_hand"),
            self.raise_hand_max,
            self.raise_hand_window_seconds,
        )?;
        self.apply(room_id, |room| room.raise_hand(user_id).map(|e| vec![e]))?;
        Ok(())
    }

    pub fn lower_hand(&self, room_id: &RoomId, user_id: &UserId) -> Result<()> {
        self.apply(room_id, |room| room.lower_hand(user_id).map(|e| vec![e]))?;
        Ok(())
    }

    pub fn make_speaker(&self, room_id: &RoomId, caller: &UserId, target: &UserId) -> Result<()> {
        let cap = self.speaker_cap;
        self.apply(room_id, |room| {
            room.make_speaker(caller, target, cap).map(|e| vec![e])
        })?;
        Ok(())
    }

    pub fn remove_speaker(&self, room_id: &RoomId, caller: &UserId, target: &UserId) -> Result<()> {
        self.apply(room_id, |room| {
            room.remove_speaker(caller, target).map(|e| vec![e])
        })?;
        Ok(())
    }

    pub fn toggle_mute(&self, room_id: &RoomId, user_id: &UserId) -> Result<()> {
        self.apply(room_id, |room| room.toggle_mute(user_id).map(|e| vec![e]))?;
        Ok(())
    }

    pub fn end(&self, room_id: &RoomId, caller: &UserId) -> Result<()> {
        self.apply(room_id, |room| room.end(caller))?;
        Ok(())
    }

    /// Socket-close path. Same semantics as an explicit leave, but a
    /// vanished room (already ended) is fine rather than an error.
    pub fn disconnect(&self, room_id: &RoomId, user_id: &UserId) {
        match self.leave(room_id, user_id) {
            Ok(()) | Err(crate::error::Error::NotFound(_)) => {}
            Err(err) => {
                info!(room_id = %room_id, user_id = %user_id, error = %err, "Disconnect cleanup failed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{Error, RejectReason};
    use crate::models::ConnectionId;

    fn coordinator() -> PresenceCoordinator {
        PresenceCoordinator::new(&Config::default())
    }

    fn metadata(category: RoomCategory) -> RoomMetadata {
        RoomMetadata {
            title: "room".to_string(),
            description: String::new(),
            category,
            is_private: false,
        }
    }

    #[tokio::test]
    async fn mutation_then_broadcast_then_refetch() {
        let coordinator = coordinator();
        let host = UserId::from("host");
        let snapshot = coordinator
            .create_room(host.clone(), metadata(RoomCategory::Chat))
            .expect("create");
        let room_id = snapshot.id;

        let mut rx = coordinator.hub().subscribe(
            room_id.clone(),
            UserId::from("watcher"),
            ConnectionId::new(),
        );

        coordinator.join(&room_id, &UserId::from("a")).expect("join");

        // The subscriber gets the notification...
        let event = rx.recv().await.expect("event");
        assert_eq!(event.event_type(), "liveroom:user_joined");

        // ...and the refetched snapshot reflects the mutation.
        let snapshot = coordinator.snapshot(&room_id).expect("snapshot");
        assert_eq!(snapshot.listeners, vec![UserId::from("a")]);
    }

    #[tokio::test]
    async fn full_lifecycle() {
        let coordinator = coordinator();
        let (host, a) = (UserId::from("host"), UserId::from("a"));
        let room_id = coordinator
            .create_room(host.clone(), metadata(RoomCategory::Chat))
            .expect("create")
            .id;

        coordinator.join(&room_id, &a).expect("join");
        coordinator.raise_hand(&room_id, &a).expect("raise");
        coordinator.make_speaker(&room_id, &host, &a).expect("promote");
        coordinator.toggle_mute(&room_id, &a).expect("mute");

        let snapshot = coordinator.snapshot(&room_id).expect("snapshot");
        assert_eq!(snapshot.speakers.len(), 1);
        assert!(snapshot.speakers[0].is_muted);

        coordinator.end(&room_id, &host).expect("end");
        // Ended rooms leave the registry at once.
        assert!(matches!(
            coordinator.snapshot(&room_id),
            Err(Error::NotFound(_))
        ));
        assert!(coordinator.list_rooms(None).is_empty());
    }

    #[tokio::test]
    async fn end_event_reaches_subscribers_before_removal() {
        let coordinator = coordinator();
        let host = UserId::from("host");
        let room_id = coordinator
            .create_room(host.clone(), metadata(RoomCategory::Music))
            .expect("create")
            .id;

        let mut rx =
            coordinator
                .hub()
                .subscribe(room_id.clone(), host.clone(), ConnectionId::new());

        coordinator.end(&room_id, &host).expect("end");
        let event = rx.recv().await.expect("event");
        assert_eq!(event, RoomEvent::RoomEnded);
    }

    #[tokio::test]
    async fn duplicate_room_per_host_rejected() {
        let coordinator = coordinator();
        let host = UserId::from("host");
        coordinator
            .create_room(host.clone(), metadata(RoomCategory::Chat))
            .expect("create");
        assert!(matches!(
            coordinator.create_room(host, metadata(RoomCategory::Music)),
            Err(Error::DuplicateRoom)
        ));
    }

    #[tokio::test]
    async fn disconnect_is_idempotent_and_race_safe() {
        let coordinator = coordinator();
        let (host, a) = (UserId::from("host"), UserId::from("a"));
        let room_id = coordinator
            .create_room(host.clone(), metadata(RoomCategory::Chat))
            .expect("create")
            .id;
        coordinator.join(&room_id, &a).expect("join");

        coordinator.disconnect(&room_id, &a);
        coordinator.disconnect(&room_id, &a);

        // The promotion that raced the disconnect finds the user absent
        // and rejects without mutating anything.
        let err = coordinator
            .make_speaker(&room_id, &host, &a)
            .expect_err("promote after disconnect");
        assert!(matches!(
            err,
            Error::InvalidTransition(RejectReason::TargetNotInRoom)
        ));
        assert!(coordinator.snapshot(&room_id).expect("snapshot").speakers.is_empty());
    }

    #[tokio::test]
    async fn host_disconnect_ends_room() {
        let coordinator = coordinator();
        let host = UserId::from("host");
        let room_id = coordinator
            .create_room(host.clone(), metadata(RoomCategory::Chat))
            .expect("create")
            .id;

        coordinator.disconnect(&room_id, &host);
        assert!(coordinator.snapshot(&room_id).is_err());
        // Disconnecting again, with the room gone, is still a no-op.
        coordinator.disconnect(&room_id, &host);
    }

    #[tokio::test]
    async fn raise_hand_is_rate_limited() {
        let mut config = Config::default();
        config.limits.raise_hand_max = 2;
        config.limits.raise_hand_window_seconds = 60;
        let coordinator = PresenceCoordinator::new(&config);

        let host = UserId::from("host");
        let a = UserId::from("a");
        let room_id = coordinator
            .create_room(host, metadata(RoomCategory::Chat))
            .expect("create")
            .id;
        coordinator.join(&room_id, &a).expect("join");

        coordinator.raise_hand(&room_id, &a).expect("first");
        coordinator.lower_hand(&room_id, &a).expect("lower");
        coordinator.raise_hand(&room_id, &a).expect("second");
        coordinator.lower_hand(&room_id, &a).expect("lower");

        let err = coordinator.raise_hand(&room_id, &a).expect_err("third");
        assert!(matches!(err, Error::RateLimited { .. }));
        // The rejected intent left no state behind.
        assert!(coordinator
            .snapshot(&room_id)
            .expect("snapshot")
            .hand_raised
            .is_empty());
    }

    #[tokio::test]
    async fn concurrent_joins_keep_membership_disjoint() {
        let coordinator = Arc::new(coordinator());
        let host = UserId::from("host");
        let room_id = coordinator
            .create_room(host, metadata(RoomCategory::Chat))
            .expect("create")
            .id;

        let mut tasks = Vec::new();
        for i in 0..16 {
            let coordinator = coordinator.clone();
            let room_id = room_id.clone();
            tasks.push(tokio::spawn(async move {
                coordinator.join(&room_id, &UserId::from(format!("u{i}").as_str()))
            }));
        }
        for task in tasks {
            task.await.expect("task").expect("join");
        }

        let snapshot = coordinator.snapshot(&room_id).expect("snapshot");
        assert_eq!(snapshot.listeners.len(), 16);
    }
}
