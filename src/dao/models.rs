//! Persisted shapes. Room documents are deliberately lenient: every field may be missing or
//! `null`, and rosters may be stored as a list or as a map keyed by player id. The
//! normalizer turns them into the canonical [`Room`](crate::state::room::Room).

use std::{collections::BTreeMap, time::SystemTime};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use serde_with::{DefaultOnNull, TimestampMilliSeconds, serde_as};

/// Room document as stored under its code.
#[serde_as]
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct RoomDocument {
    pub host_id: Option<String>,
    pub phase: Option<String>,
    #[serde_as(as = "DefaultOnNull")]
    pub players: PlayerCollection,
    #[serde_as(as = "DefaultOnNull")]
    pub waiting_players: PlayerCollection,
    #[serde_as(as = "DefaultOnNull")]
    pub player_states: IndexMap<String, PlayerStateEntity>,
    #[serde_as(as = "DefaultOnNull")]
    pub votes: IndexMap<String, String>,
    /// Signed so that corrupt negative values can be read and clamped.
    #[serde_as(as = "DefaultOnNull")]
    pub scores: IndexMap<String, i64>,
    pub round_number: Option<u32>,
    pub settings: Option<SettingsEntity>,
    #[serde_as(as = "DefaultOnNull")]
    pub round_results: Vec<RoundResultEntity>,
    pub uploader_id: Option<String>,
    pub current_image: Option<String>,
    pub block: Option<BlockEntity>,
    pub sabotage_round: Option<u32>,
    pub saboteur_id: Option<String>,
    pub sabotage_target_id: Option<String>,
    pub sabotage_triggered: Option<bool>,
    pub is_double_points: Option<bool>,
    #[serde_as(as = "Option<TimestampMilliSeconds<i64>>")]
    pub created_at: Option<SystemTime>,
    #[serde_as(as = "Option<TimestampMilliSeconds<i64>>")]
    pub updated_at: Option<SystemTime>,
}

/// Roster as written by any client generation: an ordered list or an id-keyed map.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum PlayerCollection {
    List(Vec<PlayerEntity>),
    Map(IndexMap<String, PlayerEntity>),
}

impl Default for PlayerCollection {
    fn default() -> Self {
        PlayerCollection::List(Vec::new())
    }
}

impl PlayerCollection {
    /// Yield `(key, entity)` pairs in stored order; list entries have no key.
    pub fn into_entries(self) -> Vec<(Option<String>, PlayerEntity)> {
        match self {
            PlayerCollection::List(list) => list.into_iter().map(|p| (None, p)).collect(),
            PlayerCollection::Map(map) => map.into_iter().map(|(k, p)| (Some(k), p)).collect(),
        }
    }
}

#[serde_as]
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct PlayerEntity {
    pub id: Option<String>,
    pub name: Option<String>,
    pub avatar_url: Option<String>,
    #[serde_as(as = "DefaultOnNull")]
    pub cosmetics: BTreeMap<String, String>,
    #[serde_as(as = "Option<TimestampMilliSeconds<i64>>")]
    pub joined_at: Option<SystemTime>,
}

#[serde_as]
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct PlayerStateEntity {
    pub status: Option<String>,
    #[serde_as(as = "Option<TimestampMilliSeconds<i64>>")]
    pub timer_started_at: Option<SystemTime>,
    #[serde_as(as = "Option<TimestampMilliSeconds<i64>>")]
    pub submitted_at: Option<SystemTime>,
    pub drawing_key: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct SettingsEntity {
    pub timer_seconds: Option<u32>,
    pub total_rounds: Option<u32>,
    pub sabotage_enabled: Option<bool>,
    pub double_points_final_round: Option<bool>,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct BlockEntity {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

#[serde_as]
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct RoundResultEntity {
    pub round_number: u32,
    #[serde_as(as = "DefaultOnNull")]
    pub rankings: Vec<RankingEntity>,
    #[serde_as(as = "DefaultOnNull")]
    pub drawings: Vec<DrawingSnapshotEntity>,
    pub image: Option<String>,
    pub double_points: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct RankingEntity {
    pub player_id: String,
    pub votes: u32,
    pub points: u32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct DrawingSnapshotEntity {
    pub player_id: String,
    pub drawing_key: Option<String>,
}

/// Drawing payload, stored before the room records its key.
///
/// Every submission gets its own key, and only keys the room recorded are served back.
/// Payloads whose submission lost the room update stay orphaned until the room is purged.
#[serde_as]
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DrawingEntity {
    pub room_code: String,
    pub round_number: u32,
    pub player_id: String,
    #[serde(default)]
    pub submission_id: String,
    /// Opaque stroke data produced by the client canvas.
    pub strokes: Value,
    #[serde_as(as = "TimestampMilliSeconds<i64>")]
    pub submitted_at: SystemTime,
}

impl DrawingEntity {
    /// Fresh submission with a random submission id.
    pub fn new(
        room_code: String,
        round_number: u32,
        player_id: String,
        strokes: Value,
        submitted_at: SystemTime,
    ) -> Self {
        Self {
            room_code,
            round_number,
            player_id,
            submission_id: format!("{:016x}", rand::random::<u64>()),
            strokes,
            submitted_at,
        }
    }

    /// Key recorded in the submitting player's state.
    pub fn key(&self) -> String {
        drawing_key(
            &self.room_code,
            self.round_number,
            &self.player_id,
            &self.submission_id,
        )
    }
}

/// Drawing keys are `code:round:player:submission`, so a room's drawings share the `code:`
/// prefix and a round's drawings share `code:round:`.
pub fn drawing_key(
    room_code: &str,
    round_number: u32,
    player_id: &str,
    submission_id: &str,
) -> String {
    format!("{room_code}:{round_number}:{player_id}:{submission_id}")
}

/// Last heartbeat of a player in a room.
#[serde_as]
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PresenceEntity {
    pub room_code: String,
    pub player_id: String,
    #[serde_as(as = "TimestampMilliSeconds<i64>")]
    pub last_seen: SystemTime,
}

/// Denormalized lobby summary refreshed after every commit.
#[serde_as]
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RoomPreviewEntity {
    pub room_code: String,
    pub player_count: u32,
    pub round_number: u32,
    pub total_rounds: u32,
    pub phase: String,
    pub host_name: Option<String>,
    #[serde_as(as = "TimestampMilliSeconds<i64>")]
    pub updated_at: SystemTime,
}

/// Avatar strokes keyed by player id.
#[serde_as]
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AvatarEntity {
    pub player_id: String,
    pub strokes: Value,
    #[serde_as(as = "TimestampMilliSeconds<i64>")]
    pub updated_at: SystemTime,
}

/// Minimal room listing used by garbage collection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomListItemEntity {
    pub code: String,
    /// `None` when the stored document never recorded one.
    pub created_at: Option<SystemTime>,
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn sparse_document_deserializes() {
        let doc: RoomDocument = serde_json::from_value(json!({
            "hostId": "a",
            "players": null,
            "scores": { "a": -4 },
            "settings": { "totalRounds": 5 },
        }))
        .unwrap();
        assert_eq!(doc.host_id.as_deref(), Some("a"));
        assert_eq!(doc.players, PlayerCollection::default());
        assert_eq!(doc.scores.get("a"), Some(&-4));
        assert_eq!(doc.settings.unwrap().total_rounds, Some(5));
        assert!(doc.phase.is_none());
    }

    #[test]
    fn roster_accepts_list_and_map() {
        let list: RoomDocument =
            serde_json::from_value(json!({ "players": [{ "id": "a", "name": "A" }] })).unwrap();
        let map: RoomDocument =
            serde_json::from_value(json!({ "players": { "a": { "name": "A" } } })).unwrap();

        let list_entries = list.players.into_entries();
        assert_eq!(list_entries[0].0, None);
        assert_eq!(list_entries[0].1.id.as_deref(), Some("a"));

        let map_entries = map.players.into_entries();
        assert_eq!(map_entries[0].0.as_deref(), Some("a"));
        assert_eq!(map_entries[0].1.name.as_deref(), Some("A"));
    }

    #[test]
    fn timestamps_are_epoch_millis() {
        let doc = RoomDocument {
            created_at: Some(SystemTime::UNIX_EPOCH + std::time::Duration::from_millis(1_500)),
            ..RoomDocument::default()
        };
        let value = serde_json::to_value(&doc).unwrap();
        assert_eq!(value["createdAt"], json!(1_500));
    }
}
