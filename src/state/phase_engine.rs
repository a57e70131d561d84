//! State-driven auto-advancement. Only players rostered at the time of the check
//! count, an empty roster never advances, and a rostered player without a
//! `playerStates` entry keeps the round open.

use std::time::SystemTime;

use tracing::debug;

use crate::state::{
    room::{DrawingSnapshot, PlayerState, PlayerStatus, Room, RoundResult},
    scoring,
    state_machine::{PhaseEvent, RoomPhase, next_phase},
};

/// Re-evaluate the exit condition of the current phase and advance as far as it allows.
///
/// Returns `true` when the phase changed.
pub fn advance(room: &mut Room, now: SystemTime) -> bool {
    let mut advanced = false;
    loop {
        let stepped = match room.phase {
            RoomPhase::Drawing if all_submitted(room) => enter_voting(room),
            RoomPhase::Voting if all_voted(room) => complete_voting(room, now).is_some(),
            _ => false,
        };
        if !stepped {
            return advanced;
        }
        advanced = true;
    }
}

/// Every rostered player has a state entry.
pub fn roster_initialized(room: &Room) -> bool {
    !room.players.is_empty()
        && room
            .players
            .keys()
            .all(|id| room.player_states.contains_key(id))
}

/// Every rostered player has handed in a drawing.
pub fn all_submitted(room: &Room) -> bool {
    roster_initialized(room)
        && room.players.keys().all(|id| {
            room.player_states
                .get(id)
                .is_some_and(|state| state.status == PlayerStatus::Submitted)
        })
}

/// Every rostered player holds a vote.
pub fn all_voted(room: &Room) -> bool {
    roster_initialized(room) && room.players.keys().all(|id| room.votes.contains_key(id))
}

fn enter_voting(room: &mut Room) -> bool {
    let Ok(next) = next_phase(room.phase, PhaseEvent::AllSubmitted) else {
        return false;
    };
    room.votes.clear();
    room.phase = next;
    debug!(code = %room.code, round = room.round_number, "all drawings submitted; voting");
    true
}

/// Close the voting phase: score the round, record its result and clear player states.
///
/// Shared by the natural path (everyone voted) and the host's forced advance so both
/// award identical points. Returns the phase entered, or `None` outside of voting.
pub fn complete_voting(room: &mut Room, now: SystemTime) -> Option<RoomPhase> {
    let last_round = room.is_last_round();
    let next = next_phase(room.phase, PhaseEvent::AllVoted { last_round }).ok()?;

    if !room.has_result_for(room.round_number) {
        let rankings = scoring::rank_round(room);
        for ranking in &rankings {
            *room.scores.entry(ranking.player_id.clone()).or_insert(0) += ranking.points;
        }

        // Drawing references only live in player states, so capture them first.
        let drawings = room
            .players
            .keys()
            .map(|id| DrawingSnapshot {
                player_id: id.clone(),
                drawing_key: room
                    .player_states
                    .get(id)
                    .and_then(|state| state.drawing_key.clone()),
            })
            .collect();

        room.round_results.push(RoundResult {
            round_number: room.round_number,
            rankings,
            drawings,
            image: room.current_image.clone(),
            double_points: room.is_double_points,
        });
    }

    for id in room.players.keys() {
        room.player_states.insert(id.clone(), PlayerState::waiting());
    }
    room.phase = next;
    debug!(
        code = %room.code,
        round = room.round_number,
        phase = next.as_str(),
        at = ?now,
        "round scored"
    );
    Some(next)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::test_support::{drawing_room, room_with_players, t};

    fn submit(room: &mut Room, id: &str) {
        let state = room.player_states.get_mut(id).unwrap();
        state.status = PlayerStatus::Submitted;
        state.submitted_at = Some(t(1));
        state.drawing_key = Some(format!("key-{id}"));
    }

    #[test]
    fn empty_roster_never_advances() {
        let mut room = drawing_room(&["a"]);
        room.players.clear();
        room.player_states.clear();
        assert!(!advance(&mut room, t(5)));
        assert_eq!(room.phase, RoomPhase::Drawing);
    }

    #[test]
    fn missing_player_state_blocks_advance() {
        let mut room = drawing_room(&["a", "b"]);
        submit(&mut room, "a");
        room.player_states.shift_remove("b");
        assert!(!advance(&mut room, t(5)));
        assert_eq!(room.phase, RoomPhase::Drawing);
    }

    #[test]
    fn all_submitted_moves_to_voting() {
        let mut room = drawing_room(&["a", "b"]);
        submit(&mut room, "a");
        assert!(!advance(&mut room, t(5)));
        submit(&mut room, "b");
        assert!(advance(&mut room, t(5)));
        assert_eq!(room.phase, RoomPhase::Voting);
        assert!(room.votes.is_empty());
    }

    #[test]
    fn completing_votes_scores_and_records_once() {
        let mut room = drawing_room(&["a", "b", "c"]);
        for id in ["a", "b", "c"] {
            submit(&mut room, id);
        }
        advance(&mut room, t(5));
        for voter in ["a", "b", "c"] {
            room.votes.insert(voter.into(), "b".into());
        }
        assert!(advance(&mut room, t(6)));
        assert_eq!(room.phase, RoomPhase::Results);
        assert_eq!(room.scores.get("b"), Some(&3));
        assert_eq!(room.round_results.len(), 1);

        let result = &room.round_results[0];
        assert_eq!(result.round_number, 1);
        assert_eq!(result.drawings.len(), 3);
        assert_eq!(result.drawings[0].drawing_key.as_deref(), Some("key-a"));
        assert!(
            room.player_states
                .values()
                .all(|state| state.status == PlayerStatus::Waiting && state.drawing_key.is_none())
        );
    }

    #[test]
    fn last_round_ends_in_final() {
        let mut room = drawing_room(&["a"]);
        room.settings.total_rounds = 1;
        submit(&mut room, "a");
        advance(&mut room, t(5));
        room.votes.insert("a".into(), "a".into());
        advance(&mut room, t(6));
        assert_eq!(room.phase, RoomPhase::Final);
    }

    #[test]
    fn complete_voting_is_a_no_op_outside_voting() {
        let mut room = room_with_players(&["a"]);
        assert_eq!(complete_voting(&mut room, t(1)), None);
        assert!(room.round_results.is_empty());
    }

    #[test]
    fn recorded_round_is_not_scored_twice() {
        let mut room = drawing_room(&["a", "b"]);
        submit(&mut room, "a");
        submit(&mut room, "b");
        advance(&mut room, t(2));
        room.votes.insert("a".into(), "b".into());
        room.votes.insert("b".into(), "b".into());
        let mut replay = room.clone();

        complete_voting(&mut room, t(3));
        // A stale snapshot that already carries the result must not award again.
        replay.round_results = room.round_results.clone();
        replay.scores = room.scores.clone();
        complete_voting(&mut replay, t(3));
        assert_eq!(replay.round_results.len(), 1);
        assert_eq!(replay.scores.get("b"), Some(&3));
    }
}
