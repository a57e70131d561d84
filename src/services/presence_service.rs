//! Liveness heartbeats. They live in their own keyspace and never touch the room document,
//! so pings neither contend with gameplay transactions nor trigger room broadcasts.

use std::time::{Duration, SystemTime};

use crate::{
    dao::models::PresenceEntity,
    dto::public::PresenceView,
    error::ServiceError,
    services::room_service,
    state::{SharedState, room_code::RoomCode},
};

/// Record that `player_id` is still connected to the room.
pub async fn heartbeat(
    state: &SharedState,
    code: &RoomCode,
    player_id: &str,
) -> Result<(), ServiceError> {
    let room = room_service::get_room(state, code).await?;
    if !room.is_member(player_id) {
        return Err(ServiceError::NotFound(format!(
            "player {player_id} is not in room {code}"
        )));
    }

    let store = state.require_store().await?;
    store
        .heartbeat(PresenceEntity {
            room_code: code.to_string(),
            player_id: player_id.to_owned(),
            last_seen: SystemTime::now(),
        })
        .await?;
    Ok(())
}

/// Last heartbeat of every current member, flagged online when recent enough.
pub async fn room_presence(
    state: &SharedState,
    code: &RoomCode,
) -> Result<Vec<PresenceView>, ServiceError> {
    let room = room_service::get_room(state, code).await?;
    let store = state.require_store().await?;
    let now = SystemTime::now();
    let timeout = state.config().presence_timeout;

    let mut entries: Vec<PresenceEntity> = store
        .list_presence(code.clone())
        .await?
        .into_iter()
        .filter(|entry| room.is_member(&entry.player_id))
        .collect();
    entries.sort_by(|a, b| b.last_seen.cmp(&a.last_seen));

    Ok(entries
        .into_iter()
        .map(|entry| {
            let online = is_online(entry.last_seen, now, timeout);
            PresenceView::new(entry, online)
        })
        .collect())
}

fn is_online(last_seen: SystemTime, now: SystemTime, timeout: Duration) -> bool {
    // A heartbeat stamped slightly in the future by another node still counts.
    now.duration_since(last_seen)
        .map(|age| age <= timeout)
        .unwrap_or(true)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::{
        config::AppConfig,
        dao::room_store::{RoomStore, memory::MemoryRoomStore},
        state::{AppState, room::SettingsPatch, test_support::player},
    };

    #[test]
    fn staleness_window() {
        let now = SystemTime::UNIX_EPOCH + Duration::from_secs(100);
        let timeout = Duration::from_secs(30);
        assert!(is_online(now - Duration::from_secs(30), now, timeout));
        assert!(!is_online(now - Duration::from_secs(31), now, timeout));
        assert!(is_online(now + Duration::from_secs(1), now, timeout));
    }

    #[tokio::test]
    async fn heartbeat_does_not_touch_the_room() {
        let state = AppState::new(AppConfig::default());
        let store = MemoryRoomStore::new();
        state.install_room_store(Arc::new(store.clone())).await;

        let room = room_service::create_room(&state, player("a"), SettingsPatch::default())
            .await
            .unwrap();
        let before = store.load_room(room.code.clone()).await.unwrap().unwrap();
        let mut events = state.hub().subscribe(room.code.as_str());

        heartbeat(&state, &room.code, "a").await.unwrap();

        let after = store.load_room(room.code.clone()).await.unwrap().unwrap();
        assert_eq!(before.revision, after.revision);
        assert!(events.try_recv().is_err());

        let presence = room_presence(&state, &room.code).await.unwrap();
        assert_eq!(presence.len(), 1);
        assert!(presence[0].online);

        let err = heartbeat(&state, &room.code, "stranger").await.unwrap_err();
        assert!(matches!(err, ServiceError::NotFound(_)));
    }
}
