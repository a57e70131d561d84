use serde::Serialize;
use utoipa::ToSchema;

use crate::state::state_machine::RoomPhase;

/// Room phase as exposed to clients (REST/SSE).
#[derive(Debug, Serialize, ToSchema, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RoomPhaseDto {
    /// Waiting for the host to start the game.
    Lobby,
    /// The round's uploader is choosing an image.
    Uploading,
    /// Players are drawing over the image.
    Drawing,
    /// Players are voting for their favourite drawing.
    Voting,
    /// Scores of the round just played.
    Results,
    /// Final scoreboard after the last round.
    Final,
    /// Post-game rewards screen.
    Rewards,
}

impl From<RoomPhase> for RoomPhaseDto {
    fn from(value: RoomPhase) -> Self {
        match value {
            RoomPhase::Lobby => RoomPhaseDto::Lobby,
            RoomPhase::Uploading => RoomPhaseDto::Uploading,
            RoomPhase::Drawing => RoomPhaseDto::Drawing,
            RoomPhase::Voting => RoomPhaseDto::Voting,
            RoomPhase::Results => RoomPhaseDto::Results,
            RoomPhase::Final => RoomPhaseDto::Final,
            RoomPhase::Rewards => RoomPhaseDto::Rewards,
        }
    }
}
