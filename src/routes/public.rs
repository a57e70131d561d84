use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
};

use crate::{
    dto::{
        public::{DrawingView, PresenceView, RoomPreviewResponse},
        room::RoundResultView,
    },
    error::AppError,
    routes::identity::PlayerIdentity,
    services::{presence_service, public_service},
    state::{SharedState, room_code::RoomCode},
};

/// Read-mostly room endpoints: previews for invite links, round history and presence.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/rooms/{code}/preview", get(get_preview))
        .route("/rooms/{code}/history", get(get_history))
        .route("/rooms/{code}/rounds/{round}/drawings", get(get_round_drawings))
        .route("/rooms/{code}/presence", get(get_presence))
        .route("/rooms/{code}/heartbeat", post(heartbeat))
}

#[utoipa::path(
    get,
    path = "/rooms/{code}/preview",
    tag = "rooms",
    params(("code" = String, Path, description = "Room code")),
    responses(
        (status = 200, description = "Lightweight room summary", body = RoomPreviewResponse),
        (status = 404, description = "Unknown room")
    )
)]
/// Return the summary shown before joining a room.
pub async fn get_preview(
    State(state): State<SharedState>,
    Path(code): Path<RoomCode>,
) -> Result<Json<RoomPreviewResponse>, AppError> {
    Ok(Json(public_service::room_preview(&state, &code).await?))
}

#[utoipa::path(
    get,
    path = "/rooms/{code}/history",
    tag = "rooms",
    params(("code" = String, Path, description = "Room code")),
    responses((status = 200, description = "Finished rounds, oldest first", body = [RoundResultView]))
)]
/// Return the results of every finished round.
pub async fn get_history(
    State(state): State<SharedState>,
    Path(code): Path<RoomCode>,
) -> Result<Json<Vec<RoundResultView>>, AppError> {
    Ok(Json(public_service::round_history(&state, &code).await?))
}

#[utoipa::path(
    get,
    path = "/rooms/{code}/rounds/{round}/drawings",
    tag = "rooms",
    params(
        ("code" = String, Path, description = "Room code"),
        ("round" = u32, Path, description = "1-based round number")
    ),
    responses(
        (status = 200, description = "Drawings handed in during the round", body = [DrawingView]),
        (status = 404, description = "Unknown room or round")
    )
)]
/// Return the stored drawings of one round in submission order.
pub async fn get_round_drawings(
    State(state): State<SharedState>,
    Path((code, round)): Path<(RoomCode, u32)>,
) -> Result<Json<Vec<DrawingView>>, AppError> {
    Ok(Json(
        public_service::round_drawings(&state, &code, round).await?,
    ))
}

#[utoipa::path(
    get,
    path = "/rooms/{code}/presence",
    tag = "rooms",
    params(("code" = String, Path, description = "Room code")),
    responses((status = 200, description = "Last heartbeat per member", body = [PresenceView]))
)]
/// Return the last heartbeat of each member, most recent first.
pub async fn get_presence(
    State(state): State<SharedState>,
    Path(code): Path<RoomCode>,
) -> Result<Json<Vec<PresenceView>>, AppError> {
    Ok(Json(presence_service::room_presence(&state, &code).await?))
}

#[utoipa::path(
    post,
    path = "/rooms/{code}/heartbeat",
    tag = "rooms",
    params(
        ("code" = String, Path, description = "Room code"),
        ("X-Player-Id" = String, Header, description = "Caller player id")
    ),
    responses(
        (status = 204, description = "Heartbeat recorded"),
        (status = 404, description = "Caller is not in the room")
    )
)]
/// Record that the caller is still connected.
pub async fn heartbeat(
    State(state): State<SharedState>,
    Path(code): Path<RoomCode>,
    PlayerIdentity(player_id): PlayerIdentity,
) -> Result<StatusCode, AppError> {
    presence_service::heartbeat(&state, &code, &player_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
