use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::ToSchema;
use validator::Validate;

use crate::{
    dao::models::AvatarEntity,
    dto::{format_system_time, validation::validate_strokes},
};

/// Freeform avatar drawing uploaded by a player.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct AvatarRequest {
    #[schema(value_type = Vec<Object>)]
    #[validate(custom(function = "validate_strokes"))]
    pub strokes: Value,
}

/// Stored avatar drawing.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AvatarView {
    pub player_id: String,
    #[schema(value_type = Vec<Object>)]
    pub strokes: Value,
    pub updated_at: String,
}

impl From<AvatarEntity> for AvatarView {
    fn from(avatar: AvatarEntity) -> Self {
        Self {
            player_id: avatar.player_id,
            strokes: avatar.strokes,
            updated_at: format_system_time(avatar.updated_at),
        }
    }
}
