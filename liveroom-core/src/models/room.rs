use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use super::id::{RoomId, UserId};
use crate::Error;

/// Room category (closed enum, immutable after creation)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[derive(Default)]
pub enum RoomCategory {
    Music,
    #[default]
    Chat,
    Gaming,
    Education,
    Business,
    Other,
}

impl RoomCategory {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Music => "music",
            Self::Chat => "chat",
            Self::Gaming => "gaming",
            Self::Education => "education",
            Self::Business => "business",
            Self::Other => "other",
        }
    }
}

impl FromStr for RoomCategory {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "music" => Ok(Self::Music),
            "chat" => Ok(Self::Chat),
            "gaming" => Ok(Self::Gaming),
            "education" => Ok(Self::Education),
            "business" => Ok(Self::Business),
            "other" => Ok(Self::Other),
            _ => Err(Error::Internal(format!("Unknown room category: {s}"))),
        }
    }
}

impl std::fmt::Display for RoomCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Room lifecycle status; `Ended` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[derive(Default)]
pub enum RoomStatus {
    #[default]
    Open,
    Ended,
}

impl RoomStatus {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::Ended => "ended",
        }
    }

    #[must_use]
    pub fn is_open(&self) -> bool {
        matches!(self, Self::Open)
    }

    #[must_use]
    pub fn is_ended(&self) -> bool {
        matches!(self, Self::Ended)
    }
}

/// Immutable-after-creation room metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoomMetadata {
    pub title: String,
    pub description: String,
    pub category: RoomCategory,
    pub is_private: bool,
}

/// A speaker and their mute state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Speaker {
    pub user_id: UserId,
    pub is_muted: bool,
}

impl Speaker {
    #[must_use]
    pub fn new(user_id: UserId) -> Self {
        Self {
            user_id,
            is_muted: false,
        }
    }
}

/// Role computed from the membership sets.
///
/// The single source of truth for "is this user the host / a speaker",
/// replacing ad hoc id comparisons at every call site.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Host,
    Speaker,
    Listener,
    HandRaised,
    Absent,
}

impl Role {
    #[must_use]
    pub fn is_present(&self) -> bool {
        !matches!(self, Self::Absent)
    }
}

/// Full authoritative room state, fetched by clients to reconcile after
/// every notification event. Cheap to build: O(participants).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomSnapshot {
    pub id: RoomId,
    pub host: UserId,
    pub title: String,
    pub description: String,
    pub category: RoomCategory,
    pub is_private: bool,
    pub status: RoomStatus,
    pub speakers: Vec<Speaker>,
    pub listeners: Vec<UserId>,
    pub hand_raised: Vec<UserId>,
    pub created_at: DateTime<Utc>,
}

/// Read-only projection for room discovery; never exposes mutation handles.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomSummary {
    pub id: RoomId,
    pub host: UserId,
    pub title: String,
    pub category: RoomCategory,
    pub is_private: bool,
    pub speaker_count: usize,
    pub listener_count: usize,
    pub created_at: DateTime<Utc>,
}
