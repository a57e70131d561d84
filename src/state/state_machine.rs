use thiserror::Error;

/// Stages of a room's fixed game lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RoomPhase {
    /// Players gather and the host tunes settings.
    Lobby,
    /// The chosen uploader provides this round's image.
    Uploading,
    /// Everyone draws over the image.
    Drawing,
    /// Players vote for their favourite drawing.
    Voting,
    /// Round rankings are shown; the host moves to the next round.
    Results,
    /// Last round's rankings and the final scoreboard.
    Final,
    /// Rewards screen shown after the host chose to play again.
    Rewards,
}

impl RoomPhase {
    /// Wire representation stored in room documents.
    pub fn as_str(&self) -> &'static str {
        match self {
            RoomPhase::Lobby => "lobby",
            RoomPhase::Uploading => "uploading",
            RoomPhase::Drawing => "drawing",
            RoomPhase::Voting => "voting",
            RoomPhase::Results => "results",
            RoomPhase::Final => "final",
            RoomPhase::Rewards => "rewards",
        }
    }

    /// Parse the wire representation.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "lobby" => Some(RoomPhase::Lobby),
            "uploading" => Some(RoomPhase::Uploading),
            "drawing" => Some(RoomPhase::Drawing),
            "voting" => Some(RoomPhase::Voting),
            "results" => Some(RoomPhase::Results),
            "final" => Some(RoomPhase::Final),
            "rewards" => Some(RoomPhase::Rewards),
            _ => None,
        }
    }
}

/// Events that move a room between phases.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhaseEvent {
    /// Host starts the first round from the lobby.
    StartRound,
    /// The uploader provided the round's image.
    ImageSet,
    /// Every rostered player submitted a drawing.
    AllSubmitted,
    /// Every rostered player voted (or the host forced the tally).
    AllVoted {
        /// Whether the completed round was the last one.
        last_round: bool,
    },
    /// Host moves from the results screen to the next round.
    NextRound,
    /// Host chose to play again after the final scoreboard.
    PlayAgain,
    /// Rewards were acknowledged; back to the lobby.
    AcknowledgeRewards,
    /// Host wiped the game; back to the lobby from anywhere.
    ResetGame,
}

/// Error returned when an event cannot be applied from the current phase.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid transition: {event:?} cannot be applied while in {from:?}")]
pub struct InvalidTransition {
    /// The phase the room was in when the event was received.
    pub from: RoomPhase,
    /// The rejected event.
    pub event: PhaseEvent,
}

/// Compute the phase reached by applying `event` in `from`.
pub fn next_phase(from: RoomPhase, event: PhaseEvent) -> Result<RoomPhase, InvalidTransition> {
    let next = match (from, event) {
        (RoomPhase::Lobby, PhaseEvent::StartRound) => RoomPhase::Uploading,
        (RoomPhase::Uploading, PhaseEvent::ImageSet) => RoomPhase::Drawing,
        (RoomPhase::Drawing, PhaseEvent::AllSubmitted) => RoomPhase::Voting,
        (RoomPhase::Voting, PhaseEvent::AllVoted { last_round: false }) => RoomPhase::Results,
        (RoomPhase::Voting, PhaseEvent::AllVoted { last_round: true }) => RoomPhase::Final,
        (RoomPhase::Results, PhaseEvent::NextRound) => RoomPhase::Uploading,
        (RoomPhase::Final, PhaseEvent::PlayAgain) => RoomPhase::Rewards,
        (RoomPhase::Rewards, PhaseEvent::AcknowledgeRewards) => RoomPhase::Lobby,
        (_, PhaseEvent::ResetGame) => RoomPhase::Lobby,
        (from, event) => return Err(InvalidTransition { from, event }),
    };

    Ok(next)
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL_PHASES: [RoomPhase; 7] = [
        RoomPhase::Lobby,
        RoomPhase::Uploading,
        RoomPhase::Drawing,
        RoomPhase::Voting,
        RoomPhase::Results,
        RoomPhase::Final,
        RoomPhase::Rewards,
    ];

    const FORWARD_EVENTS: [PhaseEvent; 8] = [
        PhaseEvent::StartRound,
        PhaseEvent::ImageSet,
        PhaseEvent::AllSubmitted,
        PhaseEvent::AllVoted { last_round: false },
        PhaseEvent::AllVoted { last_round: true },
        PhaseEvent::NextRound,
        PhaseEvent::PlayAgain,
        PhaseEvent::AcknowledgeRewards,
    ];

    fn step(from: RoomPhase, event: PhaseEvent) -> RoomPhase {
        next_phase(from, event).unwrap()
    }

    #[test]
    fn full_game_path() {
        let mut phase = RoomPhase::Lobby;
        phase = step(phase, PhaseEvent::StartRound);
        assert_eq!(phase, RoomPhase::Uploading);
        phase = step(phase, PhaseEvent::ImageSet);
        assert_eq!(phase, RoomPhase::Drawing);
        phase = step(phase, PhaseEvent::AllSubmitted);
        assert_eq!(phase, RoomPhase::Voting);
        phase = step(phase, PhaseEvent::AllVoted { last_round: false });
        assert_eq!(phase, RoomPhase::Results);
        phase = step(phase, PhaseEvent::NextRound);
        assert_eq!(phase, RoomPhase::Uploading);
        phase = step(phase, PhaseEvent::ImageSet);
        phase = step(phase, PhaseEvent::AllSubmitted);
        phase = step(phase, PhaseEvent::AllVoted { last_round: true });
        assert_eq!(phase, RoomPhase::Final);
        phase = step(phase, PhaseEvent::PlayAgain);
        assert_eq!(phase, RoomPhase::Rewards);
        assert_eq!(step(phase, PhaseEvent::AcknowledgeRewards), RoomPhase::Lobby);
    }

    #[test]
    fn forward_events_accepted_from_exactly_one_phase() {
        for event in FORWARD_EVENTS {
            let accepted = ALL_PHASES
                .iter()
                .filter(|phase| next_phase(**phase, event).is_ok())
                .count();
            assert_eq!(accepted, 1, "{event:?} should have a single source phase");
        }
    }

    #[test]
    fn reset_is_accepted_everywhere() {
        for phase in ALL_PHASES {
            assert_eq!(step(phase, PhaseEvent::ResetGame), RoomPhase::Lobby);
        }
    }

    #[test]
    fn invalid_transition_returns_error() {
        let err = next_phase(RoomPhase::Lobby, PhaseEvent::AllSubmitted).unwrap_err();
        assert_eq!(err.from, RoomPhase::Lobby);
        assert_eq!(err.event, PhaseEvent::AllSubmitted);
    }

    #[test]
    fn wire_names_round_trip() {
        for phase in ALL_PHASES {
            assert_eq!(RoomPhase::parse(phase.as_str()), Some(phase));
        }
        assert_eq!(RoomPhase::parse("paused"), None);
    }
}
