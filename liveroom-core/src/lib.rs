pub mod auth;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod hub;
pub mod limits;
pub mod logging;
pub mod models;
pub mod registry;
pub mod room;

pub use config::Config;
pub use coordinator::PresenceCoordinator;
pub use error::{Error, RejectReason, Result};
pub use hub::{BroadcastHub, EventReceiver};
pub use registry::RoomRegistry;
