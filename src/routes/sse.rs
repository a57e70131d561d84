use std::convert::Infallible;

use axum::{
    Router,
    extract::{Path, State},
    response::sse::{Event, Sse},
    routing::get,
};
use futures::Stream;
use tracing::info;

use crate::{
    error::AppError,
    services::sse_service,
    state::{SharedState, room_code::RoomCode},
};

#[utoipa::path(
    get,
    path = "/rooms/{code}/events",
    tag = "sse",
    params(("code" = String, Path, description = "Room code")),
    responses(
        (status = 200, description = "Room snapshot followed by live updates", content_type = "text/event-stream", body = String),
        (status = 404, description = "Unknown room")
    )
)]
/// Stream `room.updated` snapshots of one room until it is deleted or the client goes away.
pub async fn room_stream(
    State(state): State<SharedState>,
    Path(code): Path<RoomCode>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, AppError> {
    let subscription = sse_service::subscribe_room(&state, &code).await?;
    info!(code = %code, "new room SSE connection");
    Ok(sse_service::to_sse_stream(subscription, state))
}

/// Configure the SSE endpoints.
pub fn router() -> Router<SharedState> {
    Router::<SharedState>::new().route("/rooms/{code}/events", get(room_stream))
}
