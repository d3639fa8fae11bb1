// Bearer-token extraction for REST handlers

use axum::{
    extract::{FromRef, FromRequestParts},
    http::request::Parts,
};
use liveroom_core::models::UserId;

use super::{AppError, AppState};

/// Authenticated user extracted from the JWT bearer token
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: UserId,
}

impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    AppState: FromRef<S>,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let app_state = AppState::from_ref(state);

        let auth_header = parts
            .headers
            .get(axum::http::header::AUTHORIZATION)
            .ok_or_else(|| AppError::unauthorized("Missing Authorization header"))?;

        let auth_str = auth_header
            .to_str()
            .map_err(|e| AppError::unauthorized(format!("Invalid Authorization header: {e}")))?;

        let token = auth_str
            .strip_prefix("Bearer ")
            .ok_or_else(|| AppError::unauthorized("Expected Bearer token"))?;

        let claims = app_state.verifier.verify_token(token)?;

        Ok(Self {
            user_id: claims.user_id(),
        })
    }
}
