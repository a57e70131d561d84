//! Room lifecycle and gameplay actions.
//!
//! Every mutation is a single [`transact`] call; committed snapshots are fanned out to the
//! room's SSE subscribers and mirrored into the preview keyspace. Host-only actions are
//! checked against a plain read first and rejected with [`ServiceError::Unauthorized`];
//! the transforms repeat the check so a stale caller can only ever produce a no-op.

use std::time::SystemTime;

use rand::{SeedableRng, rngs::StdRng};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::{
    dao::{
        models::{DrawingEntity, RoomDocument},
        room_store::{CasOutcome, RoomStore, is_expired},
    },
    error::ServiceError,
    services::{
        public_service,
        room_events,
        transaction::{Transacted, transact},
    },
    state::{
        SharedState,
        normalize::normalize_room,
        operations::{self, Outcome},
        room::{Player, PlayerStatus, Room, SettingsPatch},
        room_code::RoomCode,
        state_machine::RoomPhase,
    },
};

/// Fresh codes drawn before room creation gives up.
const CODE_ATTEMPTS: u32 = 16;

/// Open a new lobby hosted by `host`.
pub async fn create_room(
    state: &SharedState,
    host: Player,
    settings: SettingsPatch,
) -> Result<Room, ServiceError> {
    let store = state.require_store().await?;
    let settings = state.config().default_settings.merged(&settings);
    let mut rng = StdRng::from_rng(&mut rand::rng());

    for attempt in 1..=CODE_ATTEMPTS {
        let code = RoomCode::generate(&mut rng);
        let room = Room::new(code.clone(), host.clone(), settings.clone(), SystemTime::now());
        match store
            .compare_and_swap(code.clone(), None, RoomDocument::from(&room))
            .await?
        {
            CasOutcome::Committed(_) => {
                info!(code = %code, host_id = %room.host_id, "room created");
                refresh_preview(store.as_ref(), &room).await;
                spawn_expiry_sweep(state.clone());
                return Ok(room);
            }
            CasOutcome::Conflict => {
                debug!(code = %code, attempt, "room code already taken; drawing another")
            }
        }
    }

    warn!(attempts = CODE_ATTEMPTS, "could not allocate a free room code");
    Err(ServiceError::Contention {
        code: "new room".into(),
        attempts: CODE_ATTEMPTS,
    })
}

/// Current snapshot of a room. Expired rooms are deleted on access.
pub async fn get_room(state: &SharedState, code: &RoomCode) -> Result<Room, ServiceError> {
    let store = state.require_store().await?;
    let room = load_snapshot(store.as_ref(), code).await?;
    if is_expired(
        Some(room.created_at),
        SystemTime::now(),
        state.config().room_max_age,
    ) {
        // The wrapper in `mutate` performs the delete and reports the room as gone.
        mutate(state, code, |_, _| Outcome::Unchanged).await?;
        return Err(room_gone(code));
    }
    Ok(room)
}

/// Add `player` to the room, or refresh their profile when already present.
pub async fn join_room(
    state: &SharedState,
    code: &RoomCode,
    player: Player,
) -> Result<Room, ServiceError> {
    let player_id = player.id.clone();
    let result = mutate(state, code, |room, _| {
        operations::join_room(room, player.clone())
    })
    .await?;
    if matches!(result, Transacted::Committed(_)) {
        debug!(code = %code, player_id = %player_id, "player joined");
    }
    into_room(result, code)
}

/// Remove the caller from the room. Returns `None` when the room was deleted as a result.
pub async fn leave_room(
    state: &SharedState,
    code: &RoomCode,
    player_id: &str,
) -> Result<Option<Room>, ServiceError> {
    let mut rng = StdRng::from_rng(&mut rand::rng());
    let result = mutate(state, code, |room, now| {
        operations::leave_room(room, player_id, &mut rng, now)
    })
    .await?;
    debug!(code = %code, player_id, "player left");
    Ok(into_remaining(result))
}

/// Host removes `target` from the room.
pub async fn kick_player(
    state: &SharedState,
    code: &RoomCode,
    by: &str,
    target: &str,
) -> Result<Option<Room>, ServiceError> {
    ensure_host(state, code, by, "kick players").await?;
    if by == target {
        return Err(ServiceError::InvalidInput(
            "the host cannot kick themselves; leave the room instead".into(),
        ));
    }

    let mut rng = StdRng::from_rng(&mut rand::rng());
    let result = mutate(state, code, |room, now| {
        operations::kick_player(room, by, target, &mut rng, now)
    })
    .await?;
    info!(code = %code, player_id = target, "player kicked");
    Ok(into_remaining(result))
}

/// Toggle the lobby ready flag of the caller.
pub async fn set_ready(
    state: &SharedState,
    code: &RoomCode,
    player_id: &str,
    ready: bool,
) -> Result<Room, ServiceError> {
    let result = mutate(state, code, |room, _| {
        operations::set_ready(room, player_id, ready)
    })
    .await?;
    require_member(into_room(result, code)?, player_id)
}

/// Host starts a new game from the lobby.
pub async fn start_round(
    state: &SharedState,
    code: &RoomCode,
    by: &str,
) -> Result<Room, ServiceError> {
    ensure_host(state, code, by, "start the game").await?;
    let mut rng = StdRng::from_rng(&mut rand::rng());
    let result = mutate(state, code, |room, _| {
        operations::start_round(room, by, &mut rng)
    })
    .await?;
    log_round_started(&result);
    into_room(result, code)
}

/// Host moves from the round results to the next round.
pub async fn next_round(
    state: &SharedState,
    code: &RoomCode,
    by: &str,
) -> Result<Room, ServiceError> {
    ensure_host(state, code, by, "advance to the next round").await?;
    let mut rng = StdRng::from_rng(&mut rand::rng());
    let result = mutate(state, code, |room, _| {
        operations::next_round(room, by, &mut rng)
    })
    .await?;
    log_round_started(&result);
    into_room(result, code)
}

/// The round's uploader (or the host) sets the image everyone draws over.
pub async fn set_image(
    state: &SharedState,
    code: &RoomCode,
    by: &str,
    image_url: &str,
) -> Result<Room, ServiceError> {
    let room = get_room(state, code).await?;
    if room.uploader_id.as_deref() != Some(by) && !room.is_host(by) {
        return Err(ServiceError::Unauthorized(
            "only the uploader or the host can set the image".into(),
        ));
    }

    let mut rng = StdRng::from_rng(&mut rand::rng());
    let result = mutate(state, code, |room, now| {
        operations::set_image(room, by, image_url, &mut rng, now)
    })
    .await?;
    into_room(result, code)
}

/// Hand in the caller's drawing for the current round.
///
/// The stroke payload is written to the drawing keyspace under a fresh key before the room
/// records it, so a committed `submitted` status always points at stored data. Concurrent
/// duplicates each write their own payload and only the recorded one is served.
pub async fn submit_drawing(
    state: &SharedState,
    code: &RoomCode,
    player_id: &str,
    strokes: Value,
) -> Result<Room, ServiceError> {
    let store = state.require_store().await?;
    let room = require_member(get_room(state, code).await?, player_id)?;
    let already_submitted = room
        .player_states
        .get(player_id)
        .is_some_and(|player_state| player_state.status == PlayerStatus::Submitted);
    if room.phase != RoomPhase::Drawing
        || !room.players.contains_key(player_id)
        || already_submitted
    {
        return Ok(room);
    }

    let round_number = room.round_number;
    let drawing = DrawingEntity::new(
        code.to_string(),
        round_number,
        player_id.to_owned(),
        strokes,
        SystemTime::now(),
    );
    let drawing_key = drawing.key();
    store.save_drawing(drawing).await?;

    let result = mutate(state, code, |room, now| {
        if room.round_number != round_number {
            return Outcome::Unchanged;
        }
        operations::submit_drawing(room, player_id, &drawing_key, now)
    })
    .await?;
    into_room(result, code)
}

/// Cast or overwrite the caller's vote.
pub async fn submit_vote(
    state: &SharedState,
    code: &RoomCode,
    voter: &str,
    voted_for: &str,
) -> Result<Room, ServiceError> {
    let result = mutate(state, code, |room, now| {
        operations::submit_vote(room, voter, voted_for, now)
    })
    .await?;
    require_member(into_room(result, code)?, voter)
}

/// The round's saboteur disrupts `target`.
pub async fn trigger_sabotage(
    state: &SharedState,
    code: &RoomCode,
    by: &str,
    target: &str,
) -> Result<Room, ServiceError> {
    let result = mutate(state, code, |room, _| {
        operations::trigger_sabotage(room, by, target)
    })
    .await?;
    if let Transacted::Committed(room) = &result {
        info!(code = %code, round = room.round_number, target_id = target, "sabotage triggered");
    }
    require_member(into_room(result, code)?, by)
}

/// Host closes the drawing or voting phase as if everyone had finished.
pub async fn force_advance_round(
    state: &SharedState,
    code: &RoomCode,
    by: &str,
) -> Result<Room, ServiceError> {
    ensure_host(state, code, by, "force the round forward").await?;
    let result = mutate(state, code, |room, now| {
        operations::force_advance_round(room, by, now)
    })
    .await?;
    if let Transacted::Committed(room) = &result {
        info!(code = %code, round = room.round_number, phase = room.phase.as_str(), "round forced forward");
    }
    into_room(result, code)
}

/// Host leaves the final scoreboard for the rewards screen.
pub async fn play_again(
    state: &SharedState,
    code: &RoomCode,
    by: &str,
) -> Result<Room, ServiceError> {
    ensure_host(state, code, by, "start the rewards screen").await?;
    let result = mutate(state, code, |room, _| operations::play_again(room, by)).await?;
    into_room(result, code)
}

/// Any member dismisses the rewards screen.
pub async fn acknowledge_rewards(
    state: &SharedState,
    code: &RoomCode,
    by: &str,
) -> Result<Room, ServiceError> {
    let result = mutate(state, code, |room, _| {
        operations::acknowledge_rewards(room, by)
    })
    .await?;
    require_member(into_room(result, code)?, by)
}

/// Host wipes the game and returns to the lobby.
pub async fn reset_game(
    state: &SharedState,
    code: &RoomCode,
    by: &str,
) -> Result<Room, ServiceError> {
    ensure_host(state, code, by, "reset the game").await?;
    let result = mutate(state, code, |room, _| operations::reset_game(room, by)).await?;
    into_room(result, code)
}

/// Host shallow-merges new settings.
pub async fn update_settings(
    state: &SharedState,
    code: &RoomCode,
    by: &str,
    patch: SettingsPatch,
) -> Result<Room, ServiceError> {
    ensure_host(state, code, by, "change settings").await?;
    let result = mutate(state, code, |room, _| {
        operations::update_settings(room, by, &patch)
    })
    .await?;
    into_room(result, code)
}

/// Host closes the room for everyone.
pub async fn close_room(state: &SharedState, code: &RoomCode, by: &str) -> Result<(), ServiceError> {
    ensure_host(state, code, by, "close the room").await?;
    let result = mutate(state, code, |room, _| operations::close_room(room, by)).await?;
    match result {
        Transacted::Deleted => {
            info!(code = %code, "room closed by host");
            Ok(())
        }
        // Host changed between the check and the transaction.
        _ => Err(ServiceError::Unauthorized(
            "only the host can close the room".into(),
        )),
    }
}

/// Delete every room older than the configured maximum age. Returns the number removed.
pub async fn sweep_expired_rooms(state: &SharedState) -> Result<usize, ServiceError> {
    let store = state.require_store().await?;
    let max_age = state.config().room_max_age;
    let now = SystemTime::now();
    let mut removed = 0;

    for item in store.list_rooms().await? {
        if !is_expired(item.created_at, now, max_age) {
            continue;
        }
        let Ok(code) = RoomCode::parse(&item.code) else {
            warn!(code = %item.code, "skipping stored room with an invalid code");
            continue;
        };
        let result = transact(
            store.as_ref(),
            &code,
            state.config().max_transaction_attempts,
            |room, now| {
                if is_expired(Some(room.created_at), now, max_age) {
                    Outcome::Delete
                } else {
                    Outcome::Unchanged
                }
            },
        )
        .await;
        match result {
            Ok(Transacted::Deleted) => {
                room_events::broadcast_room_deleted(state, &code);
                removed += 1;
            }
            Ok(_) | Err(ServiceError::NotFound(_)) => {}
            Err(err) => warn!(code = %code, error = %err, "failed to delete expired room"),
        }
    }

    Ok(removed)
}

fn spawn_expiry_sweep(state: SharedState) {
    tokio::spawn(async move {
        match sweep_expired_rooms(&state).await {
            Ok(0) => {}
            Ok(removed) => info!(removed, "expired rooms removed"),
            Err(err) => warn!(error = %err, "expired room sweep failed"),
        }
    });
}

/// Run `apply` inside a transaction, deleting the room instead when it has expired,
/// then publish whatever was committed.
async fn mutate<F>(
    state: &SharedState,
    code: &RoomCode,
    mut apply: F,
) -> Result<Transacted, ServiceError>
where
    F: FnMut(&mut Room, SystemTime) -> Outcome + Send,
{
    let store = state.require_store().await?;
    let max_age = state.config().room_max_age;
    let mut expired = false;

    let result = transact(
        store.as_ref(),
        code,
        state.config().max_transaction_attempts,
        |room, now| {
            expired = is_expired(Some(room.created_at), now, max_age);
            if expired {
                Outcome::Delete
            } else {
                apply(room, now)
            }
        },
    )
    .await?;

    match &result {
        Transacted::Committed(room) => {
            room_events::broadcast_room_updated(state, room);
            refresh_preview(store.as_ref(), room).await;
        }
        Transacted::Deleted => room_events::broadcast_room_deleted(state, code),
        Transacted::Unchanged(_) => {}
    }

    if expired {
        info!(code = %code, "expired room deleted on access");
        return Err(room_gone(code));
    }
    Ok(result)
}

async fn load_snapshot(store: &dyn RoomStore, code: &RoomCode) -> Result<Room, ServiceError> {
    let versioned = store
        .load_room(code.clone())
        .await?
        .ok_or_else(|| room_gone(code))?;
    Ok(normalize_room(code, versioned.document, SystemTime::now()))
}

async fn ensure_host(
    state: &SharedState,
    code: &RoomCode,
    by: &str,
    action: &str,
) -> Result<(), ServiceError> {
    let room = get_room(state, code).await?;
    if room.is_host(by) {
        Ok(())
    } else {
        Err(ServiceError::Unauthorized(format!(
            "only the host can {action}"
        )))
    }
}

async fn refresh_preview(store: &dyn RoomStore, room: &Room) {
    if let Err(err) = store.save_preview(public_service::preview_of(room)).await {
        warn!(code = %room.code, error = %err, "failed to refresh room preview");
    }
}

fn log_round_started(result: &Transacted) {
    let Transacted::Committed(room) = result else {
        return;
    };
    if room.phase == RoomPhase::Uploading {
        info!(
            code = %room.code,
            round = room.round_number,
            total_rounds = room.settings.total_rounds,
            uploader_id = room.uploader_id.as_deref().unwrap_or_default(),
            double_points = room.is_double_points,
            "round started"
        );
    }
}

fn require_member(room: Room, player_id: &str) -> Result<Room, ServiceError> {
    if room.is_member(player_id) {
        Ok(room)
    } else {
        Err(ServiceError::NotFound(format!(
            "player {player_id} is not in room {}",
            room.code
        )))
    }
}

fn into_room(result: Transacted, code: &RoomCode) -> Result<Room, ServiceError> {
    into_remaining(result).ok_or_else(|| room_gone(code))
}

fn into_remaining(result: Transacted) -> Option<Room> {
    match result {
        Transacted::Committed(room) | Transacted::Unchanged(room) => Some(room),
        Transacted::Deleted => None,
    }
}

fn room_gone(code: &RoomCode) -> ServiceError {
    ServiceError::NotFound(format!("room {code} not found"))
}
