//! Read-only projections: previews, round history and stored drawings.

use std::collections::HashSet;

use tracing::warn;

use crate::{
    dao::models::RoomPreviewEntity,
    dto::{public::DrawingView, public::RoomPreviewResponse, room::RoundResultView},
    error::ServiceError,
    services::room_service,
    state::{SharedState, room::Room, room_code::RoomCode},
};

/// Denormalized summary of `room` for the preview keyspace.
pub fn preview_of(room: &Room) -> RoomPreviewEntity {
    RoomPreviewEntity {
        room_code: room.code.to_string(),
        player_count: u32::try_from(room.member_count()).unwrap_or(u32::MAX),
        round_number: room.round_number,
        total_rounds: room.settings.total_rounds,
        phase: room.phase.as_str().to_owned(),
        host_name: room.host_name().map(str::to_owned),
        updated_at: room.updated_at,
    }
}

/// Preview of a room, served from the preview keyspace and rebuilt from the room when missing.
pub async fn room_preview(
    state: &SharedState,
    code: &RoomCode,
) -> Result<RoomPreviewResponse, ServiceError> {
    let store = state.require_store().await?;
    if let Some(preview) = store.find_preview(code.clone()).await? {
        return Ok(preview.into());
    }

    let room = room_service::get_room(state, code).await?;
    let preview = preview_of(&room);
    if let Err(err) = store.save_preview(preview.clone()).await {
        warn!(code = %code, error = %err, "failed to backfill room preview");
    }
    Ok(preview.into())
}

/// Completed rounds of the current game, oldest first.
pub async fn round_history(
    state: &SharedState,
    code: &RoomCode,
) -> Result<Vec<RoundResultView>, ServiceError> {
    let room = room_service::get_room(state, code).await?;
    Ok(room.round_results.iter().map(RoundResultView::from).collect())
}

/// Drawings the room recorded for one round of the current game.
pub async fn round_drawings(
    state: &SharedState,
    code: &RoomCode,
    round_number: u32,
) -> Result<Vec<DrawingView>, ServiceError> {
    let room = room_service::get_room(state, code).await?;
    if round_number == 0 || round_number > room.round_number {
        return Err(ServiceError::NotFound(format!(
            "round {round_number} of room {code} has not been played"
        )));
    }

    let recorded = recorded_drawing_keys(&room, round_number);
    let store = state.require_store().await?;
    let mut drawings = store.find_drawings(code.clone(), round_number).await?;
    drawings.retain(|drawing| recorded.contains(&drawing.key()));
    drawings.sort_by_key(|drawing| drawing.submitted_at);
    Ok(drawings.into_iter().map(DrawingView::from).collect())
}

/// Keys referenced by the room for `round_number`: the round result once scored, the live
/// player states while the round is still running.
fn recorded_drawing_keys(room: &Room, round_number: u32) -> HashSet<String> {
    if let Some(result) = room
        .round_results
        .iter()
        .find(|result| result.round_number == round_number)
    {
        return result
            .drawings
            .iter()
            .filter_map(|snapshot| snapshot.drawing_key.clone())
            .collect();
    }
    if round_number != room.round_number {
        return HashSet::new();
    }
    room.player_states
        .values()
        .filter_map(|player_state| player_state.drawing_key.clone())
        .collect()
}
