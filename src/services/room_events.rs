use serde::Serialize;
use tracing::warn;

use crate::{
    dto::{
        room::RoomView,
        sse::{
            EVENT_ROOM_DELETED, EVENT_ROOM_UPDATED, EVENT_SYSTEM_STATUS, RoomDeletedEvent,
            ServerEvent, SystemStatus,
        },
    },
    state::{SharedState, room::Room, room_code::RoomCode},
};

/// Fan a committed room snapshot out to its subscribers.
pub fn broadcast_room_updated(state: &SharedState, room: &Room) {
    if let Some(event) = room_updated_event(room) {
        state.hub().broadcast(room.code.as_str(), event);
    }
}

/// Tell subscribers the room is gone and end their streams.
pub fn broadcast_room_deleted(state: &SharedState, code: &RoomCode) {
    let payload = RoomDeletedEvent {
        code: code.to_string(),
    };
    if let Some(event) = build_event(EVENT_ROOM_DELETED, &payload) {
        state.hub().close(code.as_str(), event);
    }
}

/// Snapshot event sent on commit and as the first frame of a new stream.
pub fn room_updated_event(room: &Room) -> Option<ServerEvent> {
    build_event(EVENT_ROOM_UPDATED, &RoomView::from(room))
}

/// Degraded-mode notice forwarded to every open stream.
pub fn system_status_event(degraded: bool) -> Option<ServerEvent> {
    build_event(EVENT_SYSTEM_STATUS, &SystemStatus { degraded })
}

fn build_event(event: &str, payload: &impl Serialize) -> Option<ServerEvent> {
    match ServerEvent::json(Some(event.to_string()), payload) {
        Ok(event) => Some(event),
        Err(err) => {
            warn!(event, error = %err, "failed to serialize room SSE payload");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{config::AppConfig, state::AppState, state::test_support::room_with_players};

    #[tokio::test]
    async fn deleted_event_closes_the_room_channel() {
        let state = AppState::new(AppConfig::default());
        let room = room_with_players(&["a"]);
        let mut receiver = state.hub().subscribe(room.code.as_str());

        broadcast_room_updated(&state, &room);
        let updated = receiver.recv().await.unwrap();
        assert_eq!(updated.event.as_deref(), Some(EVENT_ROOM_UPDATED));
        assert!(!updated.is_terminal());

        broadcast_room_deleted(&state, &room.code);
        let deleted = receiver.recv().await.unwrap();
        assert!(deleted.is_terminal());
        assert_eq!(deleted.data, r#"{"code":"ABCDEF"}"#);
        assert_eq!(state.hub().subscriber_count(room.code.as_str()), 0);
    }
}
