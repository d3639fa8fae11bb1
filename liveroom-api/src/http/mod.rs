// Module: http
// REST mutations plus the WebSocket subscription endpoint

pub mod auth;
pub mod error;
pub mod health;
pub mod room;
pub mod socket;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use liveroom_core::{auth::TokenVerifier, PresenceCoordinator};

pub use error::{AppError, AppResult};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub coordinator: PresenceCoordinator,
    pub verifier: TokenVerifier,
}

/// Create the HTTP router with all routes
pub fn create_router(coordinator: PresenceCoordinator, verifier: TokenVerifier) -> Router {
    let state = AppState {
        coordinator,
        verifier,
    };

    let router = Router::new()
        // Health check endpoint (for monitoring probes)
        .merge(health::create_health_router())
        // Room discovery
        .route("/live-rooms", get(room::list_rooms))
        .route("/live-rooms/{room_id}", get(room::get_room))
        // Room lifecycle
        .route("/live-rooms/create", post(room::create_room))
        .route("/live-rooms/{room_id}/end", post(room::end_room))
        // Own membership intents
        .route("/live-rooms/{room_id}/join", post(room::join_room))
        .route("/live-rooms/{room_id}/leave", post(room::leave_room))
        .route("/live-rooms/{room_id}/raise-hand", post(room::raise_hand))
        .route("/live-rooms/{room_id}/lower-hand", post(room::lower_hand))
        .route("/live-rooms/{room_id}/toggle-mute", post(room::toggle_mute))
        // Host role management
        .route(
            "/live-rooms/{room_id}/make-speaker",
            post(room::make_speaker),
        )
        .route(
            "/live-rooms/{room_id}/remove-speaker",
            post(room::remove_speaker),
        )
        // WebSocket endpoint for the event stream
        .route("/ws/live-rooms/{room_id}", get(socket::websocket_handler));

    router
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
