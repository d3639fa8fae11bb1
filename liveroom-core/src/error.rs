use thiserror::Error;

/// Machine-readable reason for a rejected role transition.
///
/// Each variant maps to one precondition in the transition table; the wire
/// representation is the snake_case `code()` string so clients can branch
/// without parsing prose.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    /// Join while already a member
    AlreadyInRoom,
    /// Caller is not present in the room
    NotInRoom,
    /// Promotion/demotion/end attempted by a non-host
    NotHost,
    /// ToggleMute by someone who is not a speaker
    NotSpeaker,
    /// LowerHand without a raised hand
    NotHandRaised,
    /// RaiseHand by the host or a current speaker
    NotListener,
    /// Promotion/demotion target is not in the room
    TargetNotInRoom,
    /// The host's own membership cannot be changed by role intents
    TargetIsHost,
    /// Configured max_speakers cap reached
    SpeakerLimitReached,
}

impl RejectReason {
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::AlreadyInRoom => "already_in_room",
            Self::NotInRoom => "not_in_room",
            Self::NotHost => "not_host",
            Self::NotSpeaker => "not_speaker",
            Self::NotHandRaised => "not_hand_raised",
            Self::NotListener => "not_listener",
            Self::TargetNotInRoom => "target_not_in_room",
            Self::TargetIsHost => "target_is_host",
            Self::SpeakerLimitReached => "speaker_limit_reached",
        }
    }
}

impl std::fmt::Display for RejectReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.code())
    }
}

#[derive(Error, Debug)]
pub enum Error {
    #[error("Authentication error: {0}")]
    Authentication(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Host already owns an open room")]
    DuplicateRoom,

    #[error("Invalid transition: {0}")]
    InvalidTransition(RejectReason),

    #[error("Room has ended")]
    RoomEnded,

    #[error("Rate limit exceeded. Try again in {retry_after_seconds}s")]
    RateLimited { retry_after_seconds: u64 },

    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Stable wire code for the error, used by the HTTP layer.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::Authentication(_) => "auth_error",
            Self::NotFound(_) => "not_found",
            Self::DuplicateRoom => "duplicate_room",
            Self::InvalidTransition(reason) => reason.code(),
            Self::RoomEnded => "room_ended",
            Self::RateLimited { .. } => "rate_limited",
            Self::Internal(_) => "internal",
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
