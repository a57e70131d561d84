//! Canonicalization of stored room documents. Runs right after every read, so the
//! operations only ever see a [`Room`] whose invariants hold.

use std::time::SystemTime;

use indexmap::IndexMap;
use tracing::warn;

use crate::{
    dao::models::{
        BlockEntity, DrawingSnapshotEntity, PlayerCollection, PlayerEntity, PlayerStateEntity,
        RankingEntity, RoomDocument, RoundResultEntity, SettingsEntity,
    },
    state::{
        room::{
            Block, DrawingSnapshot, Player, PlayerId, PlayerState, PlayerStatus, Ranking, Room,
            RoomSettings, RoundResult,
        },
        room_code::RoomCode,
        state_machine::RoomPhase,
    },
};

/// Coerce a stored document into the canonical room shape.
///
/// Rosters are deduplicated (first occurrence wins), queued players already rostered are
/// dropped from the queue, keyed maps are pruned to rostered ids, negative scores are
/// clamped, the host falls back to the first remaining member and an unknown phase resets
/// to the lobby.
pub fn normalize_room(code: &RoomCode, doc: RoomDocument, now: SystemTime) -> Room {
    let players = normalize_roster(doc.players, now);
    let mut waiting_players = normalize_roster(doc.waiting_players, now);
    waiting_players.retain(|id, _| !players.contains_key(id));

    let phase = match doc.phase.as_deref() {
        None => RoomPhase::Lobby,
        Some(raw) => RoomPhase::parse(raw).unwrap_or_else(|| {
            warn!(code = %code, phase = raw, "unknown stored phase; resetting to lobby");
            RoomPhase::Lobby
        }),
    };

    let player_states = doc
        .player_states
        .into_iter()
        .filter(|(id, _)| players.contains_key(id))
        .map(|(id, state)| (id, normalize_player_state(state)))
        .collect();
    let votes: IndexMap<PlayerId, PlayerId> = doc
        .votes
        .into_iter()
        .filter(|(voter, _)| players.contains_key(voter))
        .collect();
    let scores = doc
        .scores
        .into_iter()
        .filter(|(id, _)| players.contains_key(id))
        .map(|(id, score)| (id, u32::try_from(score.max(0)).unwrap_or(u32::MAX)))
        .collect();

    let host_id = doc
        .host_id
        .filter(|host| players.contains_key(host) || waiting_players.contains_key(host))
        .or_else(|| {
            players
                .keys()
                .chain(waiting_players.keys())
                .next()
                .cloned()
        })
        .unwrap_or_default();

    let mut round_results: Vec<RoundResult> = Vec::with_capacity(doc.round_results.len());
    for result in doc.round_results {
        if round_results
            .iter()
            .all(|existing| existing.round_number != result.round_number)
        {
            round_results.push(round_result_from_entity(result));
        }
    }

    let created_at = doc.created_at.unwrap_or(now);

    Room {
        code: code.clone(),
        host_id,
        phase,
        players,
        waiting_players,
        player_states,
        votes,
        scores,
        round_number: doc.round_number.unwrap_or(0),
        settings: settings_from_entity(doc.settings),
        round_results,
        uploader_id: doc.uploader_id,
        current_image: doc.current_image.filter(|url| !url.trim().is_empty()),
        block: doc.block.map(block_from_entity),
        sabotage_round: doc.sabotage_round,
        saboteur_id: doc.saboteur_id,
        sabotage_target_id: doc.sabotage_target_id,
        sabotage_triggered: doc.sabotage_triggered.unwrap_or(false),
        is_double_points: doc.is_double_points.unwrap_or(false),
        created_at,
        updated_at: doc.updated_at.unwrap_or(created_at),
    }
}

fn normalize_roster(collection: PlayerCollection, now: SystemTime) -> IndexMap<PlayerId, Player> {
    let mut roster = IndexMap::new();
    for (key, entity) in collection.into_entries() {
        let Some(id) = entity
            .id
            .clone()
            .or(key)
            .map(|id| id.trim().to_owned())
            .filter(|id| !id.is_empty())
        else {
            continue;
        };
        if roster.contains_key(&id) {
            continue;
        }
        let player = player_from_entity(id.clone(), entity, now);
        roster.insert(id, player);
    }
    roster
}

fn player_from_entity(id: PlayerId, entity: PlayerEntity, now: SystemTime) -> Player {
    Player {
        name: entity
            .name
            .filter(|name| !name.trim().is_empty())
            .unwrap_or_else(|| id.clone()),
        id,
        avatar_url: entity.avatar_url,
        cosmetics: entity.cosmetics,
        joined_at: entity.joined_at.unwrap_or(now),
    }
}

fn normalize_player_state(entity: PlayerStateEntity) -> PlayerState {
    PlayerState {
        status: entity
            .status
            .as_deref()
            .and_then(PlayerStatus::parse)
            .unwrap_or(PlayerStatus::Waiting),
        timer_started_at: entity.timer_started_at,
        submitted_at: entity.submitted_at,
        drawing_key: entity.drawing_key,
    }
}

fn settings_from_entity(entity: Option<SettingsEntity>) -> RoomSettings {
    let defaults = RoomSettings::default();
    let Some(entity) = entity else {
        return defaults;
    };
    RoomSettings {
        timer_seconds: entity.timer_seconds.unwrap_or(defaults.timer_seconds),
        total_rounds: entity
            .total_rounds
            .filter(|rounds| *rounds > 0)
            .unwrap_or(defaults.total_rounds),
        sabotage_enabled: entity.sabotage_enabled.unwrap_or(defaults.sabotage_enabled),
        double_points_final_round: entity
            .double_points_final_round
            .unwrap_or(defaults.double_points_final_round),
    }
}

fn block_from_entity(entity: BlockEntity) -> Block {
    Block {
        x: entity.x,
        y: entity.y,
        width: entity.width,
        height: entity.height,
    }
}

fn round_result_from_entity(entity: RoundResultEntity) -> RoundResult {
    RoundResult {
        round_number: entity.round_number,
        rankings: entity
            .rankings
            .into_iter()
            .map(|ranking| Ranking {
                player_id: ranking.player_id,
                votes: ranking.votes,
                points: ranking.points,
            })
            .collect(),
        drawings: entity
            .drawings
            .into_iter()
            .map(|drawing| DrawingSnapshot {
                player_id: drawing.player_id,
                drawing_key: drawing.drawing_key,
            })
            .collect(),
        image: entity.image,
        double_points: entity.double_points,
    }
}

impl From<&Player> for PlayerEntity {
    fn from(player: &Player) -> Self {
        Self {
            id: Some(player.id.clone()),
            name: Some(player.name.clone()),
            avatar_url: player.avatar_url.clone(),
            cosmetics: player.cosmetics.clone(),
            joined_at: Some(player.joined_at),
        }
    }
}

impl From<&Room> for RoomDocument {
    fn from(room: &Room) -> Self {
        Self {
            host_id: Some(room.host_id.clone()),
            phase: Some(room.phase.as_str().to_owned()),
            players: PlayerCollection::List(room.players.values().map(Into::into).collect()),
            waiting_players: PlayerCollection::List(
                room.waiting_players.values().map(Into::into).collect(),
            ),
            player_states: room
                .player_states
                .iter()
                .map(|(id, state)| {
                    (
                        id.clone(),
                        PlayerStateEntity {
                            status: Some(state.status.as_str().to_owned()),
                            timer_started_at: state.timer_started_at,
                            submitted_at: state.submitted_at,
                            drawing_key: state.drawing_key.clone(),
                        },
                    )
                })
                .collect(),
            votes: room.votes.clone(),
            scores: room
                .scores
                .iter()
                .map(|(id, score)| (id.clone(), i64::from(*score)))
                .collect(),
            round_number: Some(room.round_number),
            settings: Some(SettingsEntity {
                timer_seconds: Some(room.settings.timer_seconds),
                total_rounds: Some(room.settings.total_rounds),
                sabotage_enabled: Some(room.settings.sabotage_enabled),
                double_points_final_round: Some(room.settings.double_points_final_round),
            }),
            round_results: room
                .round_results
                .iter()
                .map(|result| RoundResultEntity {
                    round_number: result.round_number,
                    rankings: result
                        .rankings
                        .iter()
                        .map(|ranking| RankingEntity {
                            player_id: ranking.player_id.clone(),
                            votes: ranking.votes,
                            points: ranking.points,
                        })
                        .collect(),
                    drawings: result
                        .drawings
                        .iter()
                        .map(|drawing| DrawingSnapshotEntity {
                            player_id: drawing.player_id.clone(),
                            drawing_key: drawing.drawing_key.clone(),
                        })
                        .collect(),
                    image: result.image.clone(),
                    double_points: result.double_points,
                })
                .collect(),
            uploader_id: room.uploader_id.clone(),
            current_image: room.current_image.clone(),
            block: room.block.map(|block| BlockEntity {
                x: block.x,
                y: block.y,
                width: block.width,
                height: block.height,
            }),
            sabotage_round: room.sabotage_round,
            saboteur_id: room.saboteur_id.clone(),
            sabotage_target_id: room.sabotage_target_id.clone(),
            sabotage_triggered: Some(room.sabotage_triggered),
            is_double_points: Some(room.is_double_points),
            created_at: Some(room.created_at),
            updated_at: Some(room.updated_at),
        }
    }
}
