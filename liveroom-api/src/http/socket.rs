//! WebSocket subscription endpoint.
//!
//! Sockets are read-only from the server's point of view: connecting
//! subscribes the client to its room's event stream, disconnecting
//! unsubscribes it and issues the leave intent. Frames the client sends
//! (intent mirrors) are accepted and discarded; REST is the sole write
//! path.

use axum::{
    extract::{
        ws::{Message, WebSocket},
        Path, Query, State, WebSocketUpgrade,
    },
    response::IntoResponse,
};
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use tracing::{debug, info};

use liveroom_core::models::{ConnectionId, RoomEvent, RoomId, UserId};

use super::{AppError, AppState};

/// Query parameters for WebSocket connection
#[derive(Debug, Deserialize)]
pub struct WsQuery {
    /// JWT token for authentication (browsers cannot set headers on
    /// WebSocket upgrades)
    pub token: Option<String>,
}

/// WebSocket handler for room event subscriptions
///
/// Clients connect to `ws://host/ws/live-rooms/{room_id}?token={jwt}`.
pub async fn websocket_handler(
    State(state): State<AppState>,
    Path(room_id): Path<String>,
    Query(query): Query<WsQuery>,
    ws: WebSocketUpgrade,
) -> Result<impl IntoResponse, AppError> {
    let token = query
        .token
        .ok_or_else(|| AppError::unauthorized("Missing token query parameter"))?;
    let claims = state.verifier.verify_token(&token)?;
    let user_id = claims.user_id();

    let room_id = RoomId::from_string(room_id);
    // Reject before upgrading when the room never existed or has ended.
    state.coordinator.snapshot(&room_id)?;

    // 64KB is plenty for signaling frames.
    Ok(ws
        .max_message_size(64 * 1024)
        .on_upgrade(move |socket| handle_socket(socket, state, room_id, user_id)))
}

async fn handle_socket(socket: WebSocket, state: AppState, room_id: RoomId, user_id: UserId) {
    let connection_id = ConnectionId::new();
    let mut rx = state
        .coordinator
        .hub()
        .subscribe(room_id.clone(), user_id.clone(), connection_id.clone());

    info!(
        room_id = %room_id,
        user_id = %user_id,
        connection_id = %connection_id,
        "WebSocket connection established"
    );

    let (mut sink, mut stream) = socket.split();

    // Forward hub events to the socket until the subscription closes.
    let forward = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            let json = match serde_json::to_string(&event) {
                Ok(json) => json,
                Err(err) => {
                    debug!(error = %err, "Failed to serialize event");
                    continue;
                }
            };
            if sink.send(Message::Text(json.into())).await.is_err() {
                break;
            }
        }
        let _ = sink.close().await;
    });

    // The room may have ended between the pre-upgrade check and the
    // subscription; tell this late joiner directly and hang up.
    if state.coordinator.snapshot(&room_id).is_err() {
        state
            .coordinator
            .hub()
            .send_to(&room_id, &connection_id, &RoomEvent::RoomEnded);
        state.coordinator.hub().unsubscribe(&connection_id);
        let _ = forward.await;
        return;
    }

    while let Some(frame) = stream.next().await {
        match frame {
            Ok(Message::Close(_)) | Err(_) => break,
            // Client intent mirrors and pings: acknowledged by ignoring.
            Ok(_) => {}
        }
    }

    state.coordinator.hub().unsubscribe(&connection_id);
    state.coordinator.disconnect(&room_id, &user_id);
    let _ = forward.await;

    info!(
        room_id = %room_id,
        user_id = %user_id,
        connection_id = %connection_id,
        "WebSocket connection closed"
    );
}
