pub mod event;
pub mod id;
pub mod room;

pub use event::RoomEvent;
pub use id::{ConnectionId, RoomId, UserId};
pub use room::{
    Role, RoomCategory, RoomMetadata, RoomSnapshot, RoomStatus, RoomSummary, Speaker,
};
