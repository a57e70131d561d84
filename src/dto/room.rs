//! Room snapshots as served over REST and SSE.

use std::collections::BTreeMap;

use indexmap::IndexMap;
use serde::Serialize;
use utoipa::ToSchema;

use crate::{
    dto::{format_system_time, phase::RoomPhaseDto},
    state::room::{
        Block, DrawingSnapshot, Player, PlayerState, PlayerStatus, Ranking, Room, RoomSettings,
        RoundResult,
    },
};

/// Full room snapshot.
#[derive(Debug, Serialize, ToSchema, Clone)]
#[serde(rename_all = "camelCase")]
pub struct RoomView {
    pub code: String,
    pub host_id: String,
    pub phase: RoomPhaseDto,
    pub players: Vec<PlayerView>,
    /// Players queued until the next round boundary.
    pub waiting_players: Vec<PlayerView>,
    #[schema(value_type = Object)]
    pub player_states: IndexMap<String, PlayerStateView>,
    /// Voter id to voted-for id.
    #[schema(value_type = Object)]
    pub votes: IndexMap<String, String>,
    #[schema(value_type = Object)]
    pub scores: IndexMap<String, u32>,
    pub round_number: u32,
    pub settings: SettingsView,
    pub round_results: Vec<RoundResultView>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uploader_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_image: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub block: Option<BlockView>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sabotage_round: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub saboteur_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sabotage_target_id: Option<String>,
    pub sabotage_triggered: bool,
    pub is_double_points: bool,
    pub created_at: String,
    pub updated_at: String,
}

impl From<&Room> for RoomView {
    fn from(room: &Room) -> Self {
        Self {
            code: room.code.to_string(),
            host_id: room.host_id.clone(),
            phase: room.phase.into(),
            players: room.players.values().map(PlayerView::from).collect(),
            waiting_players: room.waiting_players.values().map(PlayerView::from).collect(),
            player_states: room
                .player_states
                .iter()
                .map(|(id, state)| (id.clone(), PlayerStateView::from(state)))
                .collect(),
            votes: room.votes.clone(),
            scores: room.scores.clone(),
            round_number: room.round_number,
            settings: (&room.settings).into(),
            round_results: room.round_results.iter().map(RoundResultView::from).collect(),
            uploader_id: room.uploader_id.clone(),
            current_image: room.current_image.clone(),
            block: room.block.map(BlockView::from),
            sabotage_round: room.sabotage_round,
            saboteur_id: room.saboteur_id.clone(),
            sabotage_target_id: room.sabotage_target_id.clone(),
            sabotage_triggered: room.sabotage_triggered,
            is_double_points: room.is_double_points,
            created_at: format_system_time(room.created_at),
            updated_at: format_system_time(room.updated_at),
        }
    }
}

/// Public profile of a player.
#[derive(Debug, Serialize, ToSchema, Clone)]
#[serde(rename_all = "camelCase")]
pub struct PlayerView {
    pub id: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
    pub cosmetics: BTreeMap<String, String>,
    pub joined_at: String,
}

impl From<&Player> for PlayerView {
    fn from(player: &Player) -> Self {
        Self {
            id: player.id.clone(),
            name: player.name.clone(),
            avatar_url: player.avatar_url.clone(),
            cosmetics: player.cosmetics.clone(),
            joined_at: format_system_time(player.joined_at),
        }
    }
}

/// Per-player round progress.
#[derive(Debug, Serialize, ToSchema, Clone)]
#[serde(rename_all = "camelCase")]
pub struct PlayerStateView {
    pub status: PlayerStatusDto,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timer_started_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub submitted_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub drawing_key: Option<String>,
}

impl From<&PlayerState> for PlayerStateView {
    fn from(state: &PlayerState) -> Self {
        Self {
            status: state.status.into(),
            timer_started_at: state.timer_started_at.map(format_system_time),
            submitted_at: state.submitted_at.map(format_system_time),
            drawing_key: state.drawing_key.clone(),
        }
    }
}

/// Player status within the current phase.
#[derive(Debug, Serialize, ToSchema, Clone, Copy)]
#[serde(rename_all = "snake_case")]
pub enum PlayerStatusDto {
    Waiting,
    Ready,
    Drawing,
    Submitted,
}

impl From<PlayerStatus> for PlayerStatusDto {
    fn from(value: PlayerStatus) -> Self {
        match value {
            PlayerStatus::Waiting => PlayerStatusDto::Waiting,
            PlayerStatus::Ready => PlayerStatusDto::Ready,
            PlayerStatus::Drawing => PlayerStatusDto::Drawing,
            PlayerStatus::Submitted => PlayerStatusDto::Submitted,
        }
    }
}

/// Room settings as exposed to clients.
#[derive(Debug, Serialize, ToSchema, Clone)]
#[serde(rename_all = "camelCase")]
pub struct SettingsView {
    pub timer_seconds: u32,
    pub total_rounds: u32,
    pub sabotage_enabled: bool,
    pub double_points_final_round: bool,
}

impl From<&RoomSettings> for SettingsView {
    fn from(settings: &RoomSettings) -> Self {
        Self {
            timer_seconds: settings.timer_seconds,
            total_rounds: settings.total_rounds,
            sabotage_enabled: settings.sabotage_enabled,
            double_points_final_round: settings.double_points_final_round,
        }
    }
}

/// Obstructed canvas region, in fractions of the canvas size.
#[derive(Debug, Serialize, ToSchema, Clone, Copy)]
pub struct BlockView {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl From<Block> for BlockView {
    fn from(block: Block) -> Self {
        Self {
            x: block.x,
            y: block.y,
            width: block.width,
            height: block.height,
        }
    }
}

/// Outcome of one completed round.
#[derive(Debug, Serialize, ToSchema, Clone)]
#[serde(rename_all = "camelCase")]
pub struct RoundResultView {
    pub round_number: u32,
    pub rankings: Vec<RankingView>,
    pub drawings: Vec<DrawingSnapshotView>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    pub double_points: bool,
}

impl From<&RoundResult> for RoundResultView {
    fn from(result: &RoundResult) -> Self {
        Self {
            round_number: result.round_number,
            rankings: result.rankings.iter().map(RankingView::from).collect(),
            drawings: result
                .drawings
                .iter()
                .map(DrawingSnapshotView::from)
                .collect(),
            image: result.image.clone(),
            double_points: result.double_points,
        }
    }
}

/// One player's placement in a round.
#[derive(Debug, Serialize, ToSchema, Clone)]
#[serde(rename_all = "camelCase")]
pub struct RankingView {
    pub player_id: String,
    pub votes: u32,
    pub points: u32,
}

impl From<&Ranking> for RankingView {
    fn from(ranking: &Ranking) -> Self {
        Self {
            player_id: ranking.player_id.clone(),
            votes: ranking.votes,
            points: ranking.points,
        }
    }
}

/// Reference to a drawing captured when a round was scored.
#[derive(Debug, Serialize, ToSchema, Clone)]
#[serde(rename_all = "camelCase")]
pub struct DrawingSnapshotView {
    pub player_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub drawing_key: Option<String>,
}

impl From<&DrawingSnapshot> for DrawingSnapshotView {
    fn from(snapshot: &DrawingSnapshot) -> Self {
        Self {
            player_id: snapshot.player_id.clone(),
            drawing_key: snapshot.drawing_key.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::state::test_support::drawing_room;

    #[test]
    fn room_view_uses_camel_case_and_skips_empty_options() {
        let mut room = drawing_room(&["a", "b"]);
        room.block = None;
        let value = serde_json::to_value(RoomView::from(&room)).unwrap();

        assert_eq!(value["code"], json!("ABCDEF"));
        assert_eq!(value["hostId"], json!("a"));
        assert_eq!(value["phase"], json!("drawing"));
        assert_eq!(value["playerStates"]["b"]["status"], json!("drawing"));
        assert_eq!(value["settings"]["totalRounds"], json!(3));
        assert!(value.get("block").is_none());
        assert!(value.get("saboteurId").is_none());
        assert_eq!(value["players"][1]["name"], json!("B"));
    }
}
