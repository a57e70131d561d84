//! Request bodies of the room actions.

use std::{collections::BTreeMap, time::SystemTime};

use serde::Deserialize;
use serde_json::Value;
use utoipa::ToSchema;
use validator::Validate;

use crate::{
    dto::validation::{validate_display_name, validate_player_id, validate_strokes},
    state::room::{Player, SettingsPatch},
};

/// Profile snapshot supplied by the identity provider when creating or joining a room.
#[derive(Debug, Deserialize, ToSchema, Validate)]
#[serde(rename_all = "camelCase")]
pub struct PlayerProfileInput {
    #[validate(custom(function = "validate_display_name"))]
    pub name: String,
    #[serde(default)]
    #[validate(url)]
    pub avatar_url: Option<String>,
    /// Cosmetic selections keyed by slot.
    #[serde(default)]
    pub cosmetics: BTreeMap<String, String>,
}

impl PlayerProfileInput {
    /// Build the embedded player entry for `player_id`.
    pub fn into_player(self, player_id: String, joined_at: SystemTime) -> Player {
        Player {
            id: player_id,
            name: self.name.trim().to_owned(),
            avatar_url: self.avatar_url,
            cosmetics: self.cosmetics,
            joined_at,
        }
    }
}

/// Partial room settings; omitted fields are left untouched.
#[derive(Debug, Default, Deserialize, ToSchema, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SettingsInput {
    #[validate(range(min = 10, max = 600))]
    pub timer_seconds: Option<u32>,
    #[validate(range(min = 1, max = 20))]
    pub total_rounds: Option<u32>,
    pub sabotage_enabled: Option<bool>,
    pub double_points_final_round: Option<bool>,
}

impl From<SettingsInput> for SettingsPatch {
    fn from(value: SettingsInput) -> Self {
        Self {
            timer_seconds: value.timer_seconds,
            total_rounds: value.total_rounds,
            sabotage_enabled: value.sabotage_enabled,
            double_points_final_round: value.double_points_final_round,
        }
    }
}

/// Payload used to open a new room; the caller becomes its host.
#[derive(Debug, Deserialize, ToSchema, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateRoomRequest {
    #[validate(nested)]
    pub player: PlayerProfileInput,
    #[serde(default)]
    #[validate(nested)]
    pub settings: Option<SettingsInput>,
}

/// Lobby ready toggle.
#[derive(Debug, Deserialize, ToSchema)]
pub struct ReadyRequest {
    pub ready: bool,
}

/// Image chosen by the round's uploader.
#[derive(Debug, Deserialize, ToSchema, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SetImageRequest {
    #[validate(url)]
    pub image_url: String,
}

/// Drawing handed in for the current round.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct SubmitDrawingRequest {
    /// Freeform stroke data, opaque to the server.
    #[schema(value_type = Vec<Object>)]
    #[validate(custom(function = "validate_strokes"))]
    pub strokes: Value,
}

/// Vote for another player's drawing.
#[derive(Debug, Deserialize, ToSchema, Validate)]
#[serde(rename_all = "camelCase")]
pub struct VoteRequest {
    #[validate(custom(function = "validate_player_id"))]
    pub voted_for: String,
}

/// Saboteur action against another player.
#[derive(Debug, Deserialize, ToSchema, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SabotageRequest {
    #[validate(custom(function = "validate_player_id"))]
    pub target_id: String,
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn create_request_validates_nested_fields() {
        let ok: CreateRoomRequest = serde_json::from_value(json!({
            "player": { "name": "Ada", "cosmetics": { "hat": "crown" } },
            "settings": { "totalRounds": 5 }
        }))
        .unwrap();
        assert!(ok.validate().is_ok());

        let blank: CreateRoomRequest =
            serde_json::from_value(json!({ "player": { "name": "  " } })).unwrap();
        assert!(blank.validate().is_err());

        let too_many_rounds: CreateRoomRequest = serde_json::from_value(json!({
            "player": { "name": "Ada" },
            "settings": { "totalRounds": 99 }
        }))
        .unwrap();
        assert!(too_many_rounds.validate().is_err());
    }

    #[test]
    fn image_must_be_a_url() {
        let request = SetImageRequest {
            image_url: "not a url".into(),
        };
        assert!(request.validate().is_err());
        let request = SetImageRequest {
            image_url: "https://img.test/cat.png".into(),
        };
        assert!(request.validate().is_ok());
    }

    #[test]
    fn profile_name_is_trimmed() {
        let profile: PlayerProfileInput =
            serde_json::from_value(json!({ "name": "  Ada  " })).unwrap();
        let player = profile.into_player("ada".into(), SystemTime::UNIX_EPOCH);
        assert_eq!(player.name, "Ada");
        assert_eq!(player.id, "ada");
    }
}
