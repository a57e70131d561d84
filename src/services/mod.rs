/// OpenAPI documentation generation.
pub mod documentation;
/// Health check service.
pub mod health_service;
/// Avatar drawings stored per player.
pub mod player_service;
/// Heartbeat bookkeeping kept apart from the room document.
pub mod presence_service;
/// Read-only room information: previews, history and drawings.
pub mod public_service;
/// Room event fan-out to SSE subscribers.
pub mod room_events;
/// Room lifecycle and gameplay actions.
pub mod room_service;
/// Server-Sent Events streaming service.
pub mod sse_service;
/// Storage connection supervisor toggling degraded mode.
pub mod storage_supervisor;
/// Optimistic read-modify-write loop over the room store.
pub mod transaction;
