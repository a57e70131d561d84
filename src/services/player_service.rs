//! Player-scoped data kept outside of any room: freeform avatar drawings.

use std::time::SystemTime;

use serde_json::Value;
use tracing::debug;

use crate::{
    dao::models::AvatarEntity, dto::player::AvatarView, error::ServiceError, state::SharedState,
};

/// Store or replace the avatar drawing of `player_id`.
pub async fn save_avatar(
    state: &SharedState,
    player_id: &str,
    strokes: Value,
) -> Result<AvatarView, ServiceError> {
    let store = state.require_store().await?;
    let avatar = AvatarEntity {
        player_id: player_id.to_owned(),
        strokes,
        updated_at: SystemTime::now(),
    };
    store.save_avatar(avatar.clone()).await?;
    debug!(player_id, "avatar saved");
    Ok(avatar.into())
}

/// Avatar drawing of `player_id`.
pub async fn find_avatar(state: &SharedState, player_id: &str) -> Result<AvatarView, ServiceError> {
    let store = state.require_store().await?;
    store
        .find_avatar(player_id.to_owned())
        .await?
        .map(AvatarView::from)
        .ok_or_else(|| ServiceError::NotFound(format!("no avatar for player {player_id}")))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json::json;

    use super::*;
    use crate::{config::AppConfig, dao::room_store::memory::MemoryRoomStore, state::AppState};

    #[tokio::test]
    async fn avatar_is_replaced_on_save() {
        let state = AppState::new(AppConfig::default());
        state
            .install_room_store(Arc::new(MemoryRoomStore::new()))
            .await;

        assert!(matches!(
            find_avatar(&state, "ada").await.unwrap_err(),
            ServiceError::NotFound(_)
        ));
        save_avatar(&state, "ada", json!([[1, 2]])).await.unwrap();
        save_avatar(&state, "ada", json!([[3, 4]])).await.unwrap();

        let avatar = find_avatar(&state, "ada").await.unwrap();
        assert_eq!(avatar.strokes, json!([[3, 4]]));
    }
}
