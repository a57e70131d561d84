use axum::{
    Json, Router,
    extract::{Path, State},
    routing::get,
};
use axum_valid::Valid;

use crate::{
    dto::player::{AvatarRequest, AvatarView},
    error::AppError,
    routes::identity::PlayerIdentity,
    services::player_service,
    state::SharedState,
};

/// Player-scoped endpoints living outside of any room.
pub fn router() -> Router<SharedState> {
    Router::new().route("/players/{player_id}/avatar", get(get_avatar).put(put_avatar))
}

/// Fetch the avatar drawing of a player.
#[utoipa::path(
    get,
    path = "/players/{player_id}/avatar",
    tag = "players",
    params(("player_id" = String, Path, description = "Player id")),
    responses(
        (status = 200, description = "Stored avatar", body = AvatarView),
        (status = 404, description = "No avatar saved yet")
    )
)]
pub async fn get_avatar(
    State(state): State<SharedState>,
    Path(player_id): Path<String>,
) -> Result<Json<AvatarView>, AppError> {
    Ok(Json(player_service::find_avatar(&state, &player_id).await?))
}

/// Store the caller's own avatar drawing.
#[utoipa::path(
    put,
    path = "/players/{player_id}/avatar",
    tag = "players",
    params(
        ("player_id" = String, Path, description = "Player id, must match the caller"),
        ("X-Player-Id" = String, Header, description = "Caller player id")
    ),
    request_body = AvatarRequest,
    responses(
        (status = 200, description = "Avatar saved", body = AvatarView),
        (status = 401, description = "Caller tried to replace someone else's avatar")
    )
)]
pub async fn put_avatar(
    State(state): State<SharedState>,
    Path(player_id): Path<String>,
    PlayerIdentity(caller): PlayerIdentity,
    Valid(Json(payload)): Valid<Json<AvatarRequest>>,
) -> Result<Json<AvatarView>, AppError> {
    if caller != player_id {
        return Err(AppError::Unauthorized(
            "players can only change their own avatar".into(),
        ));
    }
    Ok(Json(
        player_service::save_avatar(&state, &player_id, payload.strokes).await?,
    ))
}
