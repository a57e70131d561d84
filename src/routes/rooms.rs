use std::time::SystemTime;

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, get, patch, post},
};
use axum_valid::Valid;

use crate::{
    dto::{
        actions::{
            CreateRoomRequest, PlayerProfileInput, ReadyRequest, SabotageRequest, SetImageRequest,
            SettingsInput, SubmitDrawingRequest, VoteRequest,
        },
        room::RoomView,
    },
    error::AppError,
    routes::identity::PlayerIdentity,
    services::room_service,
    state::{SharedState, room::Room, room_code::RoomCode},
};

/// Room lifecycle and gameplay actions. Every call acts as the player named by `X-Player-Id`.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/rooms", post(create_room))
        .route("/rooms/{code}", get(get_room).delete(close_room))
        .route("/rooms/{code}/join", post(join_room))
        .route("/rooms/{code}/leave", post(leave_room))
        .route("/rooms/{code}/players/{player_id}", delete(kick_player))
        .route("/rooms/{code}/ready", post(set_ready))
        .route("/rooms/{code}/settings", patch(update_settings))
        .route("/rooms/{code}/start", post(start_round))
        .route("/rooms/{code}/next-round", post(next_round))
        .route("/rooms/{code}/image", post(set_image))
        .route("/rooms/{code}/drawings", post(submit_drawing))
        .route("/rooms/{code}/votes", post(submit_vote))
        .route("/rooms/{code}/sabotage", post(trigger_sabotage))
        .route("/rooms/{code}/force-advance", post(force_advance))
        .route("/rooms/{code}/play-again", post(play_again))
        .route("/rooms/{code}/acknowledge-rewards", post(acknowledge_rewards))
        .route("/rooms/{code}/reset", post(reset_game))
}

fn view(room: Room) -> Json<RoomView> {
    Json(RoomView::from(&room))
}

/// Open a new room hosted by the caller.
#[utoipa::path(
    post,
    path = "/rooms",
    tag = "rooms",
    params(("X-Player-Id" = String, Header, description = "Caller player id")),
    request_body = CreateRoomRequest,
    responses(
        (status = 201, description = "Room created", body = RoomView),
        (status = 503, description = "Storage unavailable")
    )
)]
pub async fn create_room(
    State(state): State<SharedState>,
    PlayerIdentity(player_id): PlayerIdentity,
    Valid(Json(payload)): Valid<Json<CreateRoomRequest>>,
) -> Result<(StatusCode, Json<RoomView>), AppError> {
    let host = payload.player.into_player(player_id, SystemTime::now());
    let settings = payload.settings.map(Into::into).unwrap_or_default();
    let room = room_service::create_room(&state, host, settings).await?;
    Ok((StatusCode::CREATED, view(room)))
}

/// Full room snapshot.
#[utoipa::path(
    get,
    path = "/rooms/{code}",
    tag = "rooms",
    params(("code" = String, Path, description = "Room code")),
    responses(
        (status = 200, description = "Room snapshot", body = RoomView),
        (status = 404, description = "Unknown or expired room")
    )
)]
pub async fn get_room(
    State(state): State<SharedState>,
    Path(code): Path<RoomCode>,
) -> Result<Json<RoomView>, AppError> {
    Ok(view(room_service::get_room(&state, &code).await?))
}

/// Join a room, or refresh the caller's profile if already in it.
#[utoipa::path(
    post,
    path = "/rooms/{code}/join",
    tag = "rooms",
    params(
        ("code" = String, Path, description = "Room code"),
        ("X-Player-Id" = String, Header, description = "Caller player id")
    ),
    request_body = PlayerProfileInput,
    responses(
        (status = 200, description = "Joined", body = RoomView),
        (status = 404, description = "Room not found")
    )
)]
pub async fn join_room(
    State(state): State<SharedState>,
    Path(code): Path<RoomCode>,
    PlayerIdentity(player_id): PlayerIdentity,
    Valid(Json(payload)): Valid<Json<PlayerProfileInput>>,
) -> Result<Json<RoomView>, AppError> {
    let player = payload.into_player(player_id, SystemTime::now());
    Ok(view(room_service::join_room(&state, &code, player).await?))
}

/// Leave a room. Returns `null` when the caller was the last member and the room was deleted.
#[utoipa::path(
    post,
    path = "/rooms/{code}/leave",
    tag = "rooms",
    params(
        ("code" = String, Path, description = "Room code"),
        ("X-Player-Id" = String, Header, description = "Caller player id")
    ),
    responses((status = 200, description = "Left the room; null once the room is gone", body = RoomView))
)]
pub async fn leave_room(
    State(state): State<SharedState>,
    Path(code): Path<RoomCode>,
    PlayerIdentity(player_id): PlayerIdentity,
) -> Result<Json<Option<RoomView>>, AppError> {
    let room = room_service::leave_room(&state, &code, &player_id).await?;
    Ok(Json(room.as_ref().map(RoomView::from)))
}

/// Remove another player from the room (host only).
#[utoipa::path(
    delete,
    path = "/rooms/{code}/players/{player_id}",
    tag = "rooms",
    params(
        ("code" = String, Path, description = "Room code"),
        ("player_id" = String, Path, description = "Player to remove"),
        ("X-Player-Id" = String, Header, description = "Host player id")
    ),
    responses(
        (status = 200, description = "Player removed; null once the room is gone", body = RoomView),
        (status = 401, description = "Caller is not the host")
    )
)]
pub async fn kick_player(
    State(state): State<SharedState>,
    Path((code, target)): Path<(RoomCode, String)>,
    PlayerIdentity(player_id): PlayerIdentity,
) -> Result<Json<Option<RoomView>>, AppError> {
    let room = room_service::kick_player(&state, &code, &player_id, &target).await?;
    Ok(Json(room.as_ref().map(RoomView::from)))
}

/// Toggle the caller's lobby ready flag.
#[utoipa::path(
    post,
    path = "/rooms/{code}/ready",
    tag = "rooms",
    params(
        ("code" = String, Path, description = "Room code"),
        ("X-Player-Id" = String, Header, description = "Caller player id")
    ),
    request_body = ReadyRequest,
    responses((status = 200, description = "Ready flag updated", body = RoomView))
)]
pub async fn set_ready(
    State(state): State<SharedState>,
    Path(code): Path<RoomCode>,
    PlayerIdentity(player_id): PlayerIdentity,
    Json(payload): Json<ReadyRequest>,
) -> Result<Json<RoomView>, AppError> {
    let room = room_service::set_ready(&state, &code, &player_id, payload.ready).await?;
    Ok(view(room))
}

/// Merge new settings into the room (host only, lobby only).
#[utoipa::path(
    patch,
    path = "/rooms/{code}/settings",
    tag = "rooms",
    params(
        ("code" = String, Path, description = "Room code"),
        ("X-Player-Id" = String, Header, description = "Host player id")
    ),
    request_body = SettingsInput,
    responses((status = 200, description = "Settings updated", body = RoomView))
)]
pub async fn update_settings(
    State(state): State<SharedState>,
    Path(code): Path<RoomCode>,
    PlayerIdentity(player_id): PlayerIdentity,
    Valid(Json(payload)): Valid<Json<SettingsInput>>,
) -> Result<Json<RoomView>, AppError> {
    let room = room_service::update_settings(&state, &code, &player_id, payload.into()).await?;
    Ok(view(room))
}

/// Start the first round (host only).
#[utoipa::path(
    post,
    path = "/rooms/{code}/start",
    tag = "rooms",
    params(
        ("code" = String, Path, description = "Room code"),
        ("X-Player-Id" = String, Header, description = "Host player id")
    ),
    responses(
        (status = 200, description = "Round started", body = RoomView),
        (status = 401, description = "Caller is not the host")
    )
)]
pub async fn start_round(
    State(state): State<SharedState>,
    Path(code): Path<RoomCode>,
    PlayerIdentity(player_id): PlayerIdentity,
) -> Result<Json<RoomView>, AppError> {
    Ok(view(room_service::start_round(&state, &code, &player_id).await?))
}

/// Leave the results screen for the next round (host only).
#[utoipa::path(
    post,
    path = "/rooms/{code}/next-round",
    tag = "rooms",
    params(
        ("code" = String, Path, description = "Room code"),
        ("X-Player-Id" = String, Header, description = "Host player id")
    ),
    responses((status = 200, description = "Next round started", body = RoomView))
)]
pub async fn next_round(
    State(state): State<SharedState>,
    Path(code): Path<RoomCode>,
    PlayerIdentity(player_id): PlayerIdentity,
) -> Result<Json<RoomView>, AppError> {
    Ok(view(room_service::next_round(&state, &code, &player_id).await?))
}

/// Pick the image everyone draws this round (uploader or host).
#[utoipa::path(
    post,
    path = "/rooms/{code}/image",
    tag = "rooms",
    params(
        ("code" = String, Path, description = "Room code"),
        ("X-Player-Id" = String, Header, description = "Caller player id")
    ),
    request_body = SetImageRequest,
    responses((status = 200, description = "Drawing phase started", body = RoomView))
)]
pub async fn set_image(
    State(state): State<SharedState>,
    Path(code): Path<RoomCode>,
    PlayerIdentity(player_id): PlayerIdentity,
    Valid(Json(payload)): Valid<Json<SetImageRequest>>,
) -> Result<Json<RoomView>, AppError> {
    let room = room_service::set_image(&state, &code, &player_id, &payload.image_url).await?;
    Ok(view(room))
}

/// Hand in the caller's drawing for the current round.
#[utoipa::path(
    post,
    path = "/rooms/{code}/drawings",
    tag = "rooms",
    params(
        ("code" = String, Path, description = "Room code"),
        ("X-Player-Id" = String, Header, description = "Caller player id")
    ),
    request_body = SubmitDrawingRequest,
    responses((status = 200, description = "Drawing recorded", body = RoomView))
)]
pub async fn submit_drawing(
    State(state): State<SharedState>,
    Path(code): Path<RoomCode>,
    PlayerIdentity(player_id): PlayerIdentity,
    Valid(Json(payload)): Valid<Json<SubmitDrawingRequest>>,
) -> Result<Json<RoomView>, AppError> {
    let room = room_service::submit_drawing(&state, &code, &player_id, payload.strokes).await?;
    Ok(view(room))
}

/// Vote for another player's drawing.
#[utoipa::path(
    post,
    path = "/rooms/{code}/votes",
    tag = "rooms",
    params(
        ("code" = String, Path, description = "Room code"),
        ("X-Player-Id" = String, Header, description = "Caller player id")
    ),
    request_body = VoteRequest,
    responses((status = 200, description = "Vote recorded", body = RoomView))
)]
pub async fn submit_vote(
    State(state): State<SharedState>,
    Path(code): Path<RoomCode>,
    PlayerIdentity(player_id): PlayerIdentity,
    Valid(Json(payload)): Valid<Json<VoteRequest>>,
) -> Result<Json<RoomView>, AppError> {
    let room = room_service::submit_vote(&state, &code, &player_id, &payload.voted_for).await?;
    Ok(view(room))
}

/// Spend the caller's saboteur power on another player.
#[utoipa::path(
    post,
    path = "/rooms/{code}/sabotage",
    tag = "rooms",
    params(
        ("code" = String, Path, description = "Room code"),
        ("X-Player-Id" = String, Header, description = "Saboteur player id")
    ),
    request_body = SabotageRequest,
    responses((status = 200, description = "Sabotage applied", body = RoomView))
)]
pub async fn trigger_sabotage(
    State(state): State<SharedState>,
    Path(code): Path<RoomCode>,
    PlayerIdentity(player_id): PlayerIdentity,
    Valid(Json(payload)): Valid<Json<SabotageRequest>>,
) -> Result<Json<RoomView>, AppError> {
    let room =
        room_service::trigger_sabotage(&state, &code, &player_id, &payload.target_id).await?;
    Ok(view(room))
}

/// Push the current phase forward without waiting for stragglers (host only).
#[utoipa::path(
    post,
    path = "/rooms/{code}/force-advance",
    tag = "rooms",
    params(
        ("code" = String, Path, description = "Room code"),
        ("X-Player-Id" = String, Header, description = "Host player id")
    ),
    responses((status = 200, description = "Phase advanced", body = RoomView))
)]
pub async fn force_advance(
    State(state): State<SharedState>,
    Path(code): Path<RoomCode>,
    PlayerIdentity(player_id): PlayerIdentity,
) -> Result<Json<RoomView>, AppError> {
    Ok(view(
        room_service::force_advance_round(&state, &code, &player_id).await?,
    ))
}

/// Move a finished game to the rewards screen (host only).
#[utoipa::path(
    post,
    path = "/rooms/{code}/play-again",
    tag = "rooms",
    params(
        ("code" = String, Path, description = "Room code"),
        ("X-Player-Id" = String, Header, description = "Host player id")
    ),
    responses((status = 200, description = "Rewards screen opened", body = RoomView))
)]
pub async fn play_again(
    State(state): State<SharedState>,
    Path(code): Path<RoomCode>,
    PlayerIdentity(player_id): PlayerIdentity,
) -> Result<Json<RoomView>, AppError> {
    Ok(view(room_service::play_again(&state, &code, &player_id).await?))
}

/// Confirm the caller has seen the rewards screen.
#[utoipa::path(
    post,
    path = "/rooms/{code}/acknowledge-rewards",
    tag = "rooms",
    params(
        ("code" = String, Path, description = "Room code"),
        ("X-Player-Id" = String, Header, description = "Caller player id")
    ),
    responses((status = 200, description = "Acknowledged", body = RoomView))
)]
pub async fn acknowledge_rewards(
    State(state): State<SharedState>,
    Path(code): Path<RoomCode>,
    PlayerIdentity(player_id): PlayerIdentity,
) -> Result<Json<RoomView>, AppError> {
    Ok(view(
        room_service::acknowledge_rewards(&state, &code, &player_id).await?,
    ))
}

/// Send everyone back to the lobby with fresh scores (host only).
#[utoipa::path(
    post,
    path = "/rooms/{code}/reset",
    tag = "rooms",
    params(
        ("code" = String, Path, description = "Room code"),
        ("X-Player-Id" = String, Header, description = "Host player id")
    ),
    responses((status = 200, description = "Back in the lobby", body = RoomView))
)]
pub async fn reset_game(
    State(state): State<SharedState>,
    Path(code): Path<RoomCode>,
    PlayerIdentity(player_id): PlayerIdentity,
) -> Result<Json<RoomView>, AppError> {
    Ok(view(room_service::reset_game(&state, &code, &player_id).await?))
}

/// Delete the room and its drawings (host only).
#[utoipa::path(
    delete,
    path = "/rooms/{code}",
    tag = "rooms",
    params(
        ("code" = String, Path, description = "Room code"),
        ("X-Player-Id" = String, Header, description = "Host player id")
    ),
    responses(
        (status = 204, description = "Room closed"),
        (status = 401, description = "Caller is not the host")
    )
)]
pub async fn close_room(
    State(state): State<SharedState>,
    Path(code): Path<RoomCode>,
    PlayerIdentity(player_id): PlayerIdentity,
) -> Result<StatusCode, AppError> {
    room_service::close_room(&state, &code, &player_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
