// Room REST handlers
//
// REST is the sole write path: every mutation lands here, goes through the
// coordinator, and clients learn about it via the socket broadcast plus a
// snapshot refetch.

use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use liveroom_core::models::{
    RoomCategory, RoomId, RoomMetadata, RoomSnapshot, RoomSummary, UserId,
};

use super::{auth::AuthUser, AppError, AppResult, AppState};

/// Create room request
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateRoomRequest {
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub category: Option<String>,
    #[serde(default)]
    pub is_private: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateRoomResponse {
    pub room_id: RoomId,
}

#[derive(Debug, Deserialize)]
pub struct ListRoomsQuery {
    pub category: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ListRoomsResponse {
    pub rooms: Vec<RoomSummary>,
}

/// Target of a host promotion/demotion
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetUserRequest {
    pub user_id: UserId,
}

#[derive(Debug, Serialize)]
pub struct AckResponse {
    pub success: bool,
}

fn ack() -> Json<AckResponse> {
    Json(AckResponse { success: true })
}

fn parse_category(raw: &str) -> Result<RoomCategory, AppError> {
    RoomCategory::from_str(raw)
        .map_err(|_| AppError::bad_request(format!("Unknown room category: {raw}")))
}

/// Create a new room with the caller as host
pub async fn create_room(
    auth: AuthUser,
    State(state): State<AppState>,
    Json(req): Json<CreateRoomRequest>,
) -> AppResult<Json<CreateRoomResponse>> {
    if req.title.trim().is_empty() {
        return Err(AppError::bad_request("Room title cannot be empty"));
    }

    let category = match req.category.as_deref() {
        Some(raw) => parse_category(raw)?,
        None => RoomCategory::default(),
    };

    let metadata = RoomMetadata {
        title: req.title,
        description: req.description,
        category,
        is_private: req.is_private,
    };

    let snapshot = state.coordinator.create_room(auth.user_id, metadata)?;
    Ok(Json(CreateRoomResponse {
        room_id: snapshot.id,
    }))
}

/// List open rooms, optionally filtered by category
pub async fn list_rooms(
    _auth: AuthUser,
    State(state): State<AppState>,
    Query(query): Query<ListRoomsQuery>,
) -> AppResult<Json<ListRoomsResponse>> {
    let category = match query.category.as_deref() {
        Some(raw) => Some(parse_category(raw)?),
        None => None,
    };
    Ok(Json(ListRoomsResponse {
        rooms: state.coordinator.list_rooms(category),
    }))
}

/// Full room snapshot, the authoritative state clients reconcile against
pub async fn get_room(
    _auth: AuthUser,
    State(state): State<AppState>,
    Path(room_id): Path<String>,
) -> AppResult<Json<RoomSnapshot>> {
    let room_id = RoomId::from_string(room_id);
    Ok(Json(state.coordinator.snapshot(&room_id)?))
}

pub async fn join_room(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(room_id): Path<String>,
) -> AppResult<Json<AckResponse>> {
    let room_id = RoomId::from_string(room_id);
    state.coordinator.join(&room_id, &auth.user_id)?;
    Ok(ack())
}

pub async fn leave_room(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(room_id): Path<String>,
) -> AppResult<Json<AckResponse>> {
    let room_id = RoomId::from_string(room_id);
    state.coordinator.leave(&room_id, &auth.user_id)?;
    Ok(ack())
}

pub async fn raise_hand(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(room_id): Path<String>,
) -> AppResult<Json<AckResponse>> {
    let room_id = RoomId::from_string(room_id);
    state.coordinator.raise_hand(&room_id, &auth.user_id)?;
    Ok(ack())
}

pub async fn lower_hand(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(room_id): Path<String>,
) -> AppResult<Json<AckResponse>> {
    let room_id = RoomId::from_string(room_id);
    state.coordinator.lower_hand(&room_id, &auth.user_id)?;
    Ok(ack())
}

/// Host-only promotion of a listener or hand-raised user
pub async fn make_speaker(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(room_id): Path<String>,
    Json(req): Json<TargetUserRequest>,
) -> AppResult<Json<AckResponse>> {
    let room_id = RoomId::from_string(room_id);
    state
        .coordinator
        .make_speaker(&room_id, &auth.user_id, &req.user_id)?;
    Ok(ack())
}

/// Demote a speaker back to listener (host, or the speaker themselves)
pub async fn remove_speaker(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(room_id): Path<String>,
    Json(req): Json<TargetUserRequest>,
) -> AppResult<Json<AckResponse>> {
    let room_id = RoomId::from_string(room_id);
    state
        .coordinator
        .remove_speaker(&room_id, &auth.user_id, &req.user_id)?;
    Ok(ack())
}

pub async fn toggle_mute(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(room_id): Path<String>,
) -> AppResult<Json<AckResponse>> {
    let room_id = RoomId::from_string(room_id);
    state.coordinator.toggle_mute(&room_id, &auth.user_id)?;
    Ok(ack())
}

pub async fn end_room(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(room_id): Path<String>,
) -> AppResult<Json<AckResponse>> {
    let room_id = RoomId::from_string(room_id);
    state.coordinator.end(&room_id, &auth.user_id)?;
    Ok(ack())
}
