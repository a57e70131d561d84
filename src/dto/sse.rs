use serde::Serialize;
use utoipa::ToSchema;

#[derive(Clone, Debug)]
/// Dispatched payload carried across the room SSE channels.
pub struct ServerEvent {
    pub event: Option<String>,
    pub data: String,
}

impl ServerEvent {
    /// Convenience wrapper that serialises `payload` into the SSE data field.
    pub fn json<E, T>(event: E, payload: &T) -> serde_json::Result<Self>
    where
        E: Into<Option<String>>,
        T: Serialize,
    {
        Ok(Self {
            event: event.into(),
            data: serde_json::to_string(payload)?,
        })
    }

    /// Whether this event ends the room's stream.
    pub fn is_terminal(&self) -> bool {
        self.event.as_deref() == Some(EVENT_ROOM_DELETED)
    }
}

/// Event name carrying a full [`crate::dto::room::RoomView`].
pub const EVENT_ROOM_UPDATED: &str = "room.updated";
/// Event name sent once when a room is closed, emptied or expired.
pub const EVENT_ROOM_DELETED: &str = "room.deleted";
/// Event name sent when the backend enters or leaves degraded mode.
pub const EVENT_SYSTEM_STATUS: &str = "system.status";

#[derive(Debug, Serialize, ToSchema)]
/// Payload of [`EVENT_ROOM_DELETED`].
pub struct RoomDeletedEvent {
    pub code: String,
}

#[derive(Debug, Serialize, ToSchema)]
/// Broadcast when the backend enters or leaves degraded mode.
pub struct SystemStatus {
    pub degraded: bool,
}
