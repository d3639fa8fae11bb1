//! Per-room authoritative state machine.
//!
//! All mutation flows through the methods on [`Room`]. Each transition is a
//! total function over the current state plus caller identity: it either
//! returns the resulting notification events, or a typed rejection with no
//! partial mutation. Locking lives one level up (the registry hands out the
//! room behind a mutex); this type is purely synchronous state.

use chrono::{DateTime, Utc};
use std::collections::VecDeque;

use crate::error::{Error, RejectReason, Result};
use crate::models::{
    Role, RoomCategory, RoomEvent, RoomId, RoomMetadata, RoomSnapshot, RoomStatus, RoomSummary,
    Speaker, UserId,
};

#[derive(Debug)]
pub struct Room {
    id: RoomId,
    host: UserId,
    metadata: RoomMetadata,
    status: RoomStatus,
    speakers: Vec<Speaker>,
    listeners: Vec<UserId>,
    hand_raised: VecDeque<UserId>,
    created_at: DateTime<Utc>,
}

impl Room {
    #[must_use]
    pub fn new(id: RoomId, host: UserId, metadata: RoomMetadata) -> Self {
        Self {
            id,
            host,
            metadata,
            status: RoomStatus::Open,
            speakers: Vec::new(),
            listeners: Vec::new(),
            hand_raised: VecDeque::new(),
            created_at: Utc::now(),
        }
    }

    #[must_use]
    pub fn id(&self) -> &RoomId {
        &self.id
    }

    #[must_use]
    pub fn host(&self) -> &UserId {
        &self.host
    }

    #[must_use]
    pub fn status(&self) -> RoomStatus {
        self.status
    }

    #[must_use]
    pub fn category(&self) -> RoomCategory {
        self.metadata.category
    }

    /// Role computed from the membership sets. The host is tracked
    /// separately and is never a member of any set.
    #[must_use]
    pub fn role_of(&self, user_id: &UserId) -> Role {
        if *user_id == self.host && self.status.is_open() {
            return Role::Host;
        }
        if self.speakers.iter().any(|s| s.user_id == *user_id) {
            return Role::Speaker;
        }
        if self.hand_raised.contains(user_id) {
            return Role::HandRaised;
        }
        if self.listeners.contains(user_id) {
            return Role::Listener;
        }
        Role::Absent
    }

    /// O(participants) projection of the full state.
    #[must_use]
    pub fn snapshot(&self) -> RoomSnapshot {
        RoomSnapshot {
            id: self.id.clone(),
            host: self.host.clone(),
            title: self.metadata.title.clone(),
            description: self.metadata.description.clone(),
            category: self.metadata.category,
            is_private: self.metadata.is_private,
            status: self.status,
            speakers: self.speakers.clone(),
            listeners: self.listeners.clone(),
            hand_raised: self.hand_raised.iter().cloned().collect(),
            created_at: self.created_at,
        }
    }

    #[must_use]
    pub fn summary(&self) -> RoomSummary {
        RoomSummary {
            id: self.id.clone(),
            host: self.host.clone(),
            title: self.metadata.title.clone(),
            category: self.metadata.category,
            is_private: self.metadata.is_private,
            speaker_count: self.speakers.len(),
            listener_count: self.listeners.len(),
            created_at: self.created_at,
        }
    }

    fn ensure_open(&self) -> Result<()> {
        if self.status.is_ended() {
            return Err(Error::RoomEnded);
        }
        Ok(())
    }

    /// Remove `user_id` from whichever set holds them. Returns false if
    /// the user was not a member.
    fn evict(&mut self, user_id: &UserId) -> bool {
        let before =
            self.speakers.len() + self.listeners.len() + self.hand_raised.len();
        self.speakers.retain(|s| s.user_id != *user_id);
        self.listeners.retain(|u| u != user_id);
        self.hand_raised.retain(|u| u != user_id);
        before != self.speakers.len() + self.listeners.len() + self.hand_raised.len()
    }

    /// Join: add the user to `listeners`.
    pub fn join(&mut self, user_id: UserId) -> Result<RoomEvent> {
        self.ensure_open()?;
        if self.role_of(&user_id).is_present() {
            return Err(Error::InvalidTransition(RejectReason::AlreadyInRoom));
        }
        self.listeners.push(user_id.clone());
        Ok(RoomEvent::UserJoined { user_id })
    }

    /// Leave: remove the user from whichever set holds them.
    ///
    /// Idempotent: leaving while absent (or after the room ended) is a
    /// success no-op, so a disconnect racing any other intent is always
    /// safe. A leave by the host ends the room, the same as a host
    /// disconnect.
    pub fn leave(&mut self, user_id: &UserId) -> Result<Vec<RoomEvent>> {
        if self.status.is_ended() {
            return Ok(Vec::new());
        }
        if *user_id == self.host {
            return self.terminate();
        }
        if self.evict(user_id) {
            Ok(vec![RoomEvent::UserLeft {
                user_id: user_id.clone(),
            }])
        } else {
            Ok(Vec::new())
        }
    }

    /// RaiseHand: move a listener to the tail of the hand-raised queue.
    pub fn raise_hand(&mut self, user_id: &UserId) -> Result<RoomEvent> {
        self.ensure_open()?;
        match self.role_of(user_id) {
            Role::Listener => {
                self.listeners.retain(|u| u != user_id);
                self.hand_raised.push_back(user_id.clone());
                Ok(RoomEvent::HandRaised {
                    user_id: user_id.clone(),
                })
            }
            Role::Absent => Err(Error::InvalidTransition(RejectReason::NotInRoom)),
            _ => Err(Error::InvalidTransition(RejectReason::NotListener)),
        }
    }

    /// LowerHand: move the user back to `listeners`.
    pub fn lower_hand(&mut self, user_id: &UserId) -> Result<RoomEvent> {
        self.ensure_open()?;
        if !self.hand_raised.contains(user_id) {
            return Err(Error::InvalidTransition(RejectReason::NotHandRaised));
        }
        self.hand_raised.retain(|u| u != user_id);
        self.listeners.push(user_id.clone());
        Ok(RoomEvent::HandLowered {
            user_id: user_id.clone(),
        })
    }

    /// MakeSpeaker: host-only promotion of a listener or hand-raised user.
    ///
    /// The host is the sole promotion authority, so two hand-raised users
    /// can never both claim a slot; `max_speakers` is the optional
    /// configured cap.
    pub fn make_speaker(
        &mut self,
        caller: &UserId,
        target: &UserId,
        max_speakers: Option<usize>,
    ) -> Result<RoomEvent> {
        self.ensure_open()?;
        if *caller != self.host {
            return Err(Error::InvalidTransition(RejectReason::NotHost));
        }
        if *target == self.host {
            return Err(Error::InvalidTransition(RejectReason::TargetIsHost));
        }
        match self.role_of(target) {
            Role::Listener | Role::HandRaised => {
                if let Some(cap) = max_speakers {
                    if self.speakers.len() >= cap {
                        return Err(Error::InvalidTransition(
                            RejectReason::SpeakerLimitReached,
                        ));
                    }
                }
                self.listeners.retain(|u| u != target);
                self.hand_raised.retain(|u| u != target);
                self.speakers.push(Speaker::new(target.clone()));
                Ok(RoomEvent::SpeakerAdded {
                    user_id: target.clone(),
                })
            }
            Role::Speaker => Err(Error::InvalidTransition(RejectReason::AlreadyInRoom)),
            _ => Err(Error::InvalidTransition(RejectReason::TargetNotInRoom)),
        }
    }

    /// RemoveSpeaker: demote a speaker back to `listeners`. Allowed for
    /// the host, or for a speaker stepping down themselves.
    pub fn remove_speaker(&mut self, caller: &UserId, target: &UserId) -> Result<RoomEvent> {
        self.ensure_open()?;
        if *caller != self.host && caller != target {
            return Err(Error::InvalidTransition(RejectReason::NotHost));
        }
        if !self.speakers.iter().any(|s| s.user_id == *target) {
            return Err(Error::InvalidTransition(RejectReason::NotSpeaker));
        }
        self.speakers.retain(|s| s.user_id != *target);
        self.listeners.push(target.clone());
        Ok(RoomEvent::SpeakerRemoved {
            user_id: target.clone(),
        })
    }

    /// ToggleMute: a speaker flips their own mute flag.
    pub fn toggle_mute(&mut self, caller: &UserId) -> Result<RoomEvent> {
        self.ensure_open()?;
        let speaker = self
            .speakers
            .iter_mut()
            .find(|s| s.user_id == *caller)
            .ok_or(Error::InvalidTransition(RejectReason::NotSpeaker))?;
        speaker.is_muted = !speaker.is_muted;
        Ok(RoomEvent::MuteToggled {
            user_id: caller.clone(),
            is_muted: speaker.is_muted,
        })
    }

    /// End: host-only termination. Forces all members to Absent; the
    /// frozen snapshot afterwards has empty membership sets.
    pub fn end(&mut self, caller: &UserId) -> Result<Vec<RoomEvent>> {
        self.ensure_open()?;
        if *caller != self.host {
            return Err(Error::InvalidTransition(RejectReason::NotHost));
        }
        self.terminate()
    }

    fn terminate(&mut self) -> Result<Vec<RoomEvent>> {
        self.status = RoomStatus::Ended;
        self.speakers.clear();
        self.listeners.clear();
        self.hand_raised.clear();
        Ok(vec![RoomEvent::RoomEnded])
    }
}
