use utoipa::OpenApi;

#[derive(OpenApi)]
/// Aggregated OpenAPI specification for Doodle Party Back.
#[openapi(
    paths(
        crate::routes::health::healthcheck,
        crate::routes::sse::room_stream,
        crate::routes::rooms::create_room,
        crate::routes::rooms::get_room,
        crate::routes::rooms::join_room,
        crate::routes::rooms::leave_room,
        crate::routes::rooms::kick_player,
        crate::routes::rooms::set_ready,
        crate::routes::rooms::update_settings,
        crate::routes::rooms::start_round,
        crate::routes::rooms::next_round,
        crate::routes::rooms::set_image,
        crate::routes::rooms::submit_drawing,
        crate::routes::rooms::submit_vote,
        crate::routes::rooms::trigger_sabotage,
        crate::routes::rooms::force_advance,
        crate::routes::rooms::play_again,
        crate::routes::rooms::acknowledge_rewards,
        crate::routes::rooms::reset_game,
        crate::routes::rooms::close_room,
        crate::routes::public::get_preview,
        crate::routes::public::get_history,
        crate::routes::public::get_round_drawings,
        crate::routes::public::get_presence,
        crate::routes::public::heartbeat,
        crate::routes::players::get_avatar,
        crate::routes::players::put_avatar,
    ),
    components(
        schemas(
            crate::dto::health::HealthResponse,
            crate::dto::health::HealthStatus,
            crate::dto::phase::RoomPhaseDto,
            crate::dto::room::RoomView,
            crate::dto::room::PlayerView,
            crate::dto::room::PlayerStateView,
            crate::dto::room::PlayerStatusDto,
            crate::dto::room::SettingsView,
            crate::dto::room::BlockView,
            crate::dto::room::RoundResultView,
            crate::dto::room::RankingView,
            crate::dto::room::DrawingSnapshotView,
            crate::dto::actions::CreateRoomRequest,
            crate::dto::actions::PlayerProfileInput,
            crate::dto::actions::SettingsInput,
            crate::dto::actions::ReadyRequest,
            crate::dto::actions::SetImageRequest,
            crate::dto::actions::SubmitDrawingRequest,
            crate::dto::actions::VoteRequest,
            crate::dto::actions::SabotageRequest,
            crate::dto::public::RoomPreviewResponse,
            crate::dto::public::PresenceView,
            crate::dto::public::DrawingView,
            crate::dto::player::AvatarRequest,
            crate::dto::player::AvatarView,
            crate::dto::sse::RoomDeletedEvent,
            crate::dto::sse::SystemStatus,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "rooms", description = "Room lifecycle, gameplay and read-only room data"),
        (name = "players", description = "Player data kept outside of rooms"),
        (name = "sse", description = "Server-sent events streams"),
    )
)]
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_lists_room_routes() {
        let doc = ApiDoc::openapi();
        assert!(doc.paths.paths.contains_key("/rooms"));
        assert!(doc.paths.paths.contains_key("/rooms/{code}/events"));
        assert!(doc.paths.paths.contains_key("/players/{player_id}/avatar"));
    }
}
