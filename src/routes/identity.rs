use axum::{extract::FromRequestParts, http::request::Parts};

use crate::{dto::validation::validate_player_id, error::AppError};

/// Header carrying the caller's player id, as asserted by the identity provider in front of us.
pub const PLAYER_ID_HEADER: &str = "x-player-id";

/// Caller identity extracted from the `X-Player-Id` header.
#[derive(Debug, Clone)]
pub struct PlayerIdentity(pub String);

impl<S> FromRequestParts<S> for PlayerIdentity
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let raw = parts
            .headers
            .get(PLAYER_ID_HEADER)
            .and_then(|value| value.to_str().ok())
            .ok_or_else(|| {
                AppError::Unauthorized("missing player id header `X-Player-Id`".into())
            })?;

        let id = raw.trim();
        validate_player_id(id)
            .map_err(|_| AppError::BadRequest(format!("invalid player id `{id}`")))?;
        Ok(Self(id.to_owned()))
    }
}
