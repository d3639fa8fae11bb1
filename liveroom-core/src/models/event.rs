use serde::Serialize;

use super::id::UserId;

/// Notification event fanned out to room subscribers.
///
/// Events carry only what changed, never the full state: the authoritative
/// state is always the room snapshot, which clients refetch on receipt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", content = "data")]
pub enum RoomEvent {
    #[serde(rename = "liveroom:user_joined")]
    UserJoined { user_id: UserId },

    #[serde(rename = "liveroom:user_left")]
    UserLeft { user_id: UserId },

    #[serde(rename = "liveroom:speaker_added")]
    SpeakerAdded { user_id: UserId },

    #[serde(rename = "liveroom:speaker_removed")]
    SpeakerRemoved { user_id: UserId },

    #[serde(rename = "liveroom:hand_raised")]
    HandRaised { user_id: UserId },

    #[serde(rename = "liveroom:hand_lowered")]
    HandLowered { user_id: UserId },

    #[serde(rename = "liveroom:mute_toggled")]
    MuteToggled { user_id: UserId, is_muted: bool },

    #[serde(rename = "liveroom:ended")]
    RoomEnded,
}

impl RoomEvent {
    /// Wire name of the event, matching the client's socket listeners.
    #[must_use]
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::UserJoined { .. } => "liveroom:user_joined",
            Self::UserLeft { .. } => "liveroom:user_left",
            Self::SpeakerAdded { .. } => "liveroom:speaker_added",
            Self::SpeakerRemoved { .. } => "liveroom:speaker_removed",
            Self::HandRaised { .. } => "liveroom:hand_raised",
            Self::HandLowered { .. } => "liveroom:hand_lowered",
            Self::MuteToggled { .. } => "liveroom:mute_toggled",
            Self::RoomEnded => "liveroom:ended",
        }
    }
}
