//! Lightweight read models for reconnect and lobby-browser UX.

use serde::Serialize;
use serde_json::Value;
use utoipa::ToSchema;

use crate::{
    dao::models::{DrawingEntity, PresenceEntity, RoomPreviewEntity},
    dto::{format_system_time, phase::RoomPhaseDto},
    state::state_machine::RoomPhase,
};

/// Denormalized room summary readable without loading the full room.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RoomPreviewResponse {
    pub code: String,
    pub player_count: u32,
    pub round_number: u32,
    pub total_rounds: u32,
    pub phase: RoomPhaseDto,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub host_name: Option<String>,
    pub updated_at: String,
}

impl From<RoomPreviewEntity> for RoomPreviewResponse {
    fn from(preview: RoomPreviewEntity) -> Self {
        Self {
            code: preview.room_code,
            player_count: preview.player_count,
            round_number: preview.round_number,
            total_rounds: preview.total_rounds,
            phase: RoomPhase::parse(&preview.phase)
                .unwrap_or(RoomPhase::Lobby)
                .into(),
            host_name: preview.host_name,
            updated_at: format_system_time(preview.updated_at),
        }
    }
}

/// Liveness of one player, derived from the last heartbeat.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PresenceView {
    pub player_id: String,
    pub last_seen: String,
    /// Whether the last heartbeat is within the presence timeout.
    pub online: bool,
}

impl PresenceView {
    /// Build the view from a stored heartbeat.
    pub fn new(entity: PresenceEntity, online: bool) -> Self {
        Self {
            player_id: entity.player_id,
            last_seen: format_system_time(entity.last_seen),
            online,
        }
    }
}

/// Stored drawing of one player for one round.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DrawingView {
    pub key: String,
    pub player_id: String,
    pub round_number: u32,
    #[schema(value_type = Vec<Object>)]
    pub strokes: Value,
    pub submitted_at: String,
}

impl From<DrawingEntity> for DrawingView {
    fn from(drawing: DrawingEntity) -> Self {
        Self {
            key: drawing.key(),
            player_id: drawing.player_id,
            round_number: drawing.round_number,
            strokes: drawing.strokes,
            submitted_at: format_system_time(drawing.submitted_at),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::SystemTime;

    use super::*;

    #[test]
    fn unknown_stored_phase_reads_as_lobby() {
        let preview = RoomPreviewResponse::from(RoomPreviewEntity {
            room_code: "ABCDEF".into(),
            player_count: 2,
            round_number: 0,
            total_rounds: 3,
            phase: "intermission".into(),
            host_name: Some("Ada".into()),
            updated_at: SystemTime::UNIX_EPOCH,
        });
        assert_eq!(preview.phase, RoomPhaseDto::Lobby);
        assert_eq!(preview.updated_at, "1970-01-01T00:00:00Z");
    }
}
