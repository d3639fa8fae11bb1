//! In-memory room registry.
//!
//! Rooms live entirely in process memory; an ended room is removed
//! immediately and its id never resolves again. Lookups and membership in
//! one room never contend with another room: the registry maps are sharded
//! (`DashMap`) and each room serializes its own mutations behind its own
//! mutex.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use parking_lot::{Mutex, MutexGuard};
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::models::{RoomCategory, RoomId, RoomMetadata, RoomSummary, UserId};
use crate::room::Room;

/// Shared handle to one room. All state access goes through [`lock`],
/// which serializes intents for that room.
///
/// [`lock`]: RoomHandle::lock
#[derive(Debug)]
pub struct RoomHandle {
    inner: Mutex<Room>,
}

impl RoomHandle {
    fn new(room: Room) -> Self {
        Self {
            inner: Mutex::new(room),
        }
    }

    pub fn lock(&self) -> MutexGuard<'_, Room> {
        self.inner.lock()
    }
}

#[derive(Debug, Default)]
pub struct RoomRegistry {
    rooms: DashMap<RoomId, Arc<RoomHandle>>,
    // Host -> open room, enforcing one open room per host.
    hosts: DashMap<UserId, RoomId>,
}

impl RoomRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a room with `host` as its host.
    ///
    /// The host index entry is claimed first, so two concurrent creates by
    /// the same host resolve to exactly one room and one `DuplicateRoom`.
    pub fn create(
        &self,
        host: UserId,
        metadata: RoomMetadata,
    ) -> Result<(RoomId, Arc<RoomHandle>)> {
        let room_id = RoomId::new();
        match self.hosts.entry(host.clone()) {
            Entry::Occupied(_) => return Err(Error::DuplicateRoom),
            Entry::Vacant(entry) => {
                entry.insert(room_id.clone());
            }
        }
        let handle = Arc::new(RoomHandle::new(Room::new(room_id.clone(), host, metadata)));
        self.rooms.insert(room_id.clone(), handle.clone());
        Ok((room_id, handle))
    }

    pub fn get(&self, room_id: &RoomId) -> Result<Arc<RoomHandle>> {
        self.rooms
            .get(room_id)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| Error::NotFound(format!("Room not found: {room_id}")))
    }

    /// Read-only projection for discovery, optionally narrowed to one
    /// category. Only open rooms appear; a room mid-removal may still show
    /// up and resolves to `NotFound` on the follow-up fetch.
    #[must_use]
    pub fn list(&self, category: Option<RoomCategory>) -> Vec<RoomSummary> {
        let mut summaries: Vec<RoomSummary> = self
            .rooms
            .iter()
            .filter_map(|entry| {
                let room = entry.value().lock();
                if !room.status().is_open() {
                    return None;
                }
                if let Some(category) = category {
                    if room.category() != category {
                        return None;
                    }
                }
                Some(room.summary())
            })
            .collect();
        summaries.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        summaries
    }

    /// Drop an ended room and release its host's slot. Idempotent.
    pub fn remove(&self, room_id: &RoomId) {
        if let Some((_, handle)) = self.rooms.remove(room_id) {
            let host = handle.lock().host().clone();
            self.hosts
                .remove_if(&host, |_, owned| owned == room_id);
        }
    }

    #[must_use]
    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metadata(title: &str, category: RoomCategory) -> RoomMetadata {
        RoomMetadata {
            title: title.to_string(),
            description: String::new(),
            category,
            is_private: false,
        }
    }

    #[test]
    fn create_then_get() {
        let registry = RoomRegistry::new();
        let (room_id, _) = registry
            .create(UserId::from("h"), metadata("a", RoomCategory::Chat))
            .expect("create");
        let handle = registry.get(&room_id).expect("get");
        assert_eq!(handle.lock().host(), &UserId::from("h"));
    }

    #[test]
    fn one_open_room_per_host() {
        let registry = RoomRegistry::new();
        registry
            .create(UserId::from("h"), metadata("a", RoomCategory::Chat))
            .expect("create");
        let err = registry
            .create(UserId::from("h"), metadata("b", RoomCategory::Music))
            .expect_err("duplicate");
        assert!(matches!(err, Error::DuplicateRoom));
        assert_eq!(registry.room_count(), 1);
    }

    #[test]
    fn remove_releases_host_slot() {
        let registry = RoomRegistry::new();
        let (room_id, _) = registry
            .create(UserId::from("h"), metadata("a", RoomCategory::Chat))
            .expect("create");
        registry.remove(&room_id);
        assert!(registry.get(&room_id).is_err());
        // The host may open a new room once the old one is gone.
        registry
            .create(UserId::from("h"), metadata("b", RoomCategory::Chat))
            .expect("create after remove");
    }

    #[test]
    fn remove_is_idempotent() {
        let registry = RoomRegistry::new();
        let (room_id, _) = registry
            .create(UserId::from("h"), metadata("a", RoomCategory::Chat))
            .expect("create");
        registry.remove(&room_id);
        registry.remove(&room_id);
        assert_eq!(registry.room_count(), 0);
    }

    #[test]
    fn list_filters_by_category() {
        let registry = RoomRegistry::new();
        registry
            .create(UserId::from("h1"), metadata("chat", RoomCategory::Chat))
            .expect("create");
        registry
            .create(UserId::from("h2"), metadata("music", RoomCategory::Music))
            .expect("create");

        assert_eq!(registry.list(None).len(), 2);
        let music = registry.list(Some(RoomCategory::Music));
        assert_eq!(music.len(), 1);
        assert_eq!(music[0].title, "music");
    }

    #[test]
    fn list_skips_ended_rooms() {
        let registry = RoomRegistry::new();
        let (_, handle) = registry
            .create(UserId::from("h"), metadata("a", RoomCategory::Chat))
            .expect("create");
        handle.lock().end(&UserId::from("h")).expect("end");
        assert!(registry.list(None).is_empty());
    }

    #[test]
    fn concurrent_creates_by_same_host_yield_one_room() {
        let registry = Arc::new(RoomRegistry::new());
        let mut handles = Vec::new();
        for _ in 0..8 {
            let registry = registry.clone();
            handles.push(std::thread::spawn(move || {
                registry
                    .create(UserId::from("h"), metadata("a", RoomCategory::Chat))
                    .is_ok()
            }));
        }
        let created = handles
            .into_iter()
            .map(|h| h.join().expect("thread"))
            .filter(|ok| *ok)
            .count();
        assert_eq!(created, 1);
        assert_eq!(registry.room_count(), 1);
    }
}
