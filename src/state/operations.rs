//! Room mutations. Each operation is a pure transform of a freshly read snapshot and
//! may be re-run against a newer snapshot after a write conflict, so every guard
//! is evaluated before anything is touched and a repeated call with the same
//! inputs lands on [`Outcome::Unchanged`].
//!
//! Idempotence contracts:
//! - `join_room`: a present id is updated in place, never appended twice.
//! - `leave_room` / `kick_player`: removing an absent player is unchanged.
//! - `submit_drawing`: an already `submitted` player is unchanged.
//! - `submit_vote`: re-casting the same vote is unchanged; a different target overwrites.
//! - phase-changing operations are guarded by the phase they leave, so a retry
//!   that observes the new phase is unchanged.

use std::time::SystemTime;

use rand::{Rng, seq::IndexedRandom};

use crate::state::{
    phase_engine,
    room::{Block, Player, PlayerId, PlayerState, PlayerStatus, Room, SettingsPatch},
    state_machine::{PhaseEvent, RoomPhase, next_phase},
};

/// Smallest obstruction edge, as a fraction of the canvas.
const BLOCK_MIN_EDGE: f32 = 0.15;
/// Largest obstruction edge, as a fraction of the canvas.
const BLOCK_MAX_EDGE: f32 = 0.35;
/// Fewest members required before a saboteur round is planned.
const SABOTAGE_MIN_PLAYERS: usize = 3;

/// Result of applying an operation to a snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Nothing to write; the snapshot is returned as read.
    Unchanged,
    /// Commit the mutated snapshot.
    Changed,
    /// The room is abandoned and must be deleted with its dependent keyspaces.
    Delete,
}

/// Add a player, or refresh the profile of one already present.
pub fn join_room(room: &mut Room, player: Player) -> Outcome {
    for roster in [&mut room.players, &mut room.waiting_players] {
        if let Some(existing) = roster.get_mut(&player.id) {
            if !existing.profile_differs(&player) {
                return Outcome::Unchanged;
            }
            existing.update_profile(player);
            return Outcome::Changed;
        }
    }

    if room.phase == RoomPhase::Lobby {
        room.player_states
            .insert(player.id.clone(), PlayerState::waiting());
        room.scores.insert(player.id.clone(), 0);
        room.players.insert(player.id.clone(), player);
    } else {
        room.waiting_players.insert(player.id.clone(), player);
    }
    Outcome::Changed
}

/// Remove a player who left on their own.
pub fn leave_room<R: Rng + ?Sized>(
    room: &mut Room,
    player_id: &str,
    rng: &mut R,
    now: SystemTime,
) -> Outcome {
    remove_player(room, player_id, rng, now)
}

/// Host removes another player.
pub fn kick_player<R: Rng + ?Sized>(
    room: &mut Room,
    by: &str,
    target: &str,
    rng: &mut R,
    now: SystemTime,
) -> Outcome {
    if !room.is_host(by) || by == target {
        return Outcome::Unchanged;
    }
    remove_player(room, target, rng, now)
}

fn remove_player<R: Rng + ?Sized>(
    room: &mut Room,
    player_id: &str,
    rng: &mut R,
    now: SystemTime,
) -> Outcome {
    let removed = room.players.shift_remove(player_id).is_some()
        | room.waiting_players.shift_remove(player_id).is_some();
    if !removed {
        return Outcome::Unchanged;
    }

    room.player_states.shift_remove(player_id);
    room.votes.shift_remove(player_id);
    room.scores.shift_remove(player_id);

    if room.is_abandoned() {
        return Outcome::Delete;
    }

    if room.host_id == player_id {
        room.host_id = room
            .players
            .keys()
            .chain(room.waiting_players.keys())
            .next()
            .cloned()
            .unwrap_or_default();
    }

    if room.uploader_id.as_deref() == Some(player_id) {
        room.uploader_id = if room.phase == RoomPhase::Uploading {
            pick_player(room, rng, None)
        } else {
            None
        };
    }
    if room.saboteur_id.as_deref() == Some(player_id) {
        room.saboteur_id = None;
    }
    if room.sabotage_target_id.as_deref() == Some(player_id) {
        room.sabotage_target_id = None;
    }

    phase_engine::advance(room, now);
    Outcome::Changed
}

/// Toggle the lobby ready flag.
pub fn set_ready(room: &mut Room, player_id: &str, ready: bool) -> Outcome {
    if room.phase != RoomPhase::Lobby || !room.players.contains_key(player_id) {
        return Outcome::Unchanged;
    }
    let status = if ready {
        PlayerStatus::Ready
    } else {
        PlayerStatus::Waiting
    };
    let state = room
        .player_states
        .entry(player_id.to_owned())
        .or_insert_with(PlayerState::waiting);
    if state.status == status {
        return Outcome::Unchanged;
    }
    state.status = status;
    Outcome::Changed
}

/// Host starts a new game from the lobby.
pub fn start_round<R: Rng + ?Sized>(room: &mut Room, by: &str, rng: &mut R) -> Outcome {
    if !room.is_host(by) || room.phase != RoomPhase::Lobby || room.member_count() == 0 {
        return Outcome::Unchanged;
    }
    let Ok(next) = next_phase(room.phase, PhaseEvent::StartRound) else {
        return Outcome::Unchanged;
    };

    merge_waiting_players(room);
    room.round_results.clear();
    room.scores = room.players.keys().map(|id| (id.clone(), 0)).collect();
    room.round_number = 1;
    room.sabotage_round = if room.settings.sabotage_enabled
        && room.players.len() >= SABOTAGE_MIN_PLAYERS
        && room.settings.total_rounds > 0
    {
        Some(rng.random_range(1..=room.settings.total_rounds))
    } else {
        None
    };

    begin_round(room, next, rng);
    Outcome::Changed
}

/// Host moves from the results screen to the next round.
pub fn next_round<R: Rng + ?Sized>(room: &mut Room, by: &str, rng: &mut R) -> Outcome {
    if !room.is_host(by) {
        return Outcome::Unchanged;
    }
    let Ok(next) = next_phase(room.phase, PhaseEvent::NextRound) else {
        return Outcome::Unchanged;
    };

    merge_waiting_players(room);
    room.round_number += 1;
    begin_round(room, next, rng);
    Outcome::Changed
}

/// Round-boundary reset shared by `start_round` and `next_round`.
fn begin_round<R: Rng + ?Sized>(room: &mut Room, next: RoomPhase, rng: &mut R) {
    for id in room.players.keys() {
        room.scores.entry(id.clone()).or_insert(0);
        room.player_states.insert(id.clone(), PlayerState::waiting());
    }
    room.votes.clear();
    room.current_image = None;
    room.block = None;
    room.sabotage_target_id = None;
    room.sabotage_triggered = false;

    room.uploader_id = pick_player(room, rng, None);
    room.is_double_points = room.settings.double_points_final_round && room.is_last_round();
    room.saboteur_id = if room.sabotage_round == Some(room.round_number) {
        let uploader = room.uploader_id.clone();
        pick_player(room, rng, uploader.as_deref())
    } else {
        None
    };
    room.phase = next;
}

/// Move every queued player into the roster, keeping join order.
fn merge_waiting_players(room: &mut Room) {
    for (id, player) in std::mem::take(&mut room.waiting_players) {
        match room.players.get_mut(&id) {
            Some(existing) => existing.update_profile(player),
            None => {
                room.players.insert(id, player);
            }
        }
    }
}

/// Uniformly random rostered player, optionally excluding one id.
fn pick_player<R: Rng + ?Sized>(room: &Room, rng: &mut R, exclude: Option<&str>) -> Option<PlayerId> {
    let candidates: Vec<&PlayerId> = room
        .players
        .keys()
        .filter(|id| Some(id.as_str()) != exclude)
        .collect();
    candidates.choose(rng).map(|id| (*id).clone())
}

fn random_block<R: Rng + ?Sized>(rng: &mut R) -> Block {
    let width = rng.random_range(BLOCK_MIN_EDGE..=BLOCK_MAX_EDGE);
    let height = rng.random_range(BLOCK_MIN_EDGE..=BLOCK_MAX_EDGE);
    Block {
        x: rng.random_range(0.0..=1.0 - width),
        y: rng.random_range(0.0..=1.0 - height),
        width,
        height,
    }
}

/// The uploader (or host) sets this round's image; everyone starts drawing.
pub fn set_image<R: Rng + ?Sized>(
    room: &mut Room,
    by: &str,
    url: &str,
    rng: &mut R,
    now: SystemTime,
) -> Outcome {
    let allowed = room.uploader_id.as_deref() == Some(by) || room.is_host(by);
    if !allowed || url.trim().is_empty() || room.players.is_empty() {
        return Outcome::Unchanged;
    }
    let Ok(next) = next_phase(room.phase, PhaseEvent::ImageSet) else {
        return Outcome::Unchanged;
    };

    room.current_image = Some(url.trim().to_owned());
    room.block = Some(random_block(rng));
    for id in room.players.keys() {
        room.player_states.insert(
            id.clone(),
            PlayerState {
                status: PlayerStatus::Drawing,
                timer_started_at: Some(now),
                submitted_at: None,
                drawing_key: None,
            },
        );
    }
    room.phase = next;
    Outcome::Changed
}

/// Mark a player's drawing as handed in. The payload itself was stored under `drawing_key`.
pub fn submit_drawing(
    room: &mut Room,
    player_id: &str,
    drawing_key: &str,
    now: SystemTime,
) -> Outcome {
    if room.phase != RoomPhase::Drawing || !room.players.contains_key(player_id) {
        return Outcome::Unchanged;
    }
    let Some(state) = room.player_states.get_mut(player_id) else {
        return Outcome::Unchanged;
    };
    if state.status == PlayerStatus::Submitted {
        return Outcome::Unchanged;
    }

    state.status = PlayerStatus::Submitted;
    state.submitted_at = Some(now);
    state.drawing_key = Some(drawing_key.to_owned());
    phase_engine::advance(room, now);
    Outcome::Changed
}

/// Cast or overwrite a vote.
pub fn submit_vote(room: &mut Room, voter: &str, voted_for: &str, now: SystemTime) -> Outcome {
    if room.phase != RoomPhase::Voting
        || !room.players.contains_key(voter)
        || !room.players.contains_key(voted_for)
    {
        return Outcome::Unchanged;
    }
    if room.votes.get(voter).map(String::as_str) == Some(voted_for) {
        return Outcome::Unchanged;
    }

    room.votes.insert(voter.to_owned(), voted_for.to_owned());
    phase_engine::advance(room, now);
    Outcome::Changed
}

/// The round's saboteur disrupts another player's drawing, once.
pub fn trigger_sabotage(room: &mut Room, by: &str, target: &str) -> Outcome {
    let armed = room.phase == RoomPhase::Drawing
        && room.sabotage_round == Some(room.round_number)
        && room.saboteur_id.as_deref() == Some(by)
        && !room.sabotage_triggered;
    if !armed || by == target || !room.players.contains_key(target) {
        return Outcome::Unchanged;
    }

    room.sabotage_target_id = Some(target.to_owned());
    room.sabotage_triggered = true;
    Outcome::Changed
}

/// Host escape hatch: close drawing or voting as if everyone had finished.
pub fn force_advance_round(room: &mut Room, by: &str, now: SystemTime) -> Outcome {
    if !room.is_host(by) || room.players.is_empty() {
        return Outcome::Unchanged;
    }

    match room.phase {
        RoomPhase::Drawing => {
            for id in room.players.keys() {
                let state = room
                    .player_states
                    .entry(id.clone())
                    .or_insert_with(PlayerState::waiting);
                if state.status != PlayerStatus::Submitted {
                    state.status = PlayerStatus::Submitted;
                    state.submitted_at = Some(now);
                }
            }
            phase_engine::advance(room, now);
            Outcome::Changed
        }
        RoomPhase::Voting => match phase_engine::complete_voting(room, now) {
            Some(_) => Outcome::Changed,
            None => Outcome::Unchanged,
        },
        _ => Outcome::Unchanged,
    }
}

/// Host leaves the final scoreboard for the rewards screen.
pub fn play_again(room: &mut Room, by: &str) -> Outcome {
    if !room.is_host(by) {
        return Outcome::Unchanged;
    }
    match next_phase(room.phase, PhaseEvent::PlayAgain) {
        Ok(next) => {
            room.phase = next;
            Outcome::Changed
        }
        Err(_) => Outcome::Unchanged,
    }
}

/// Any member dismisses the rewards screen; the room returns to a fresh lobby.
pub fn acknowledge_rewards(room: &mut Room, by: &str) -> Outcome {
    if !room.is_member(by) {
        return Outcome::Unchanged;
    }
    match next_phase(room.phase, PhaseEvent::AcknowledgeRewards) {
        Ok(next) => {
            clear_game(room, next);
            Outcome::Changed
        }
        Err(_) => Outcome::Unchanged,
    }
}

/// Host wipes the game from any phase.
pub fn reset_game(room: &mut Room, by: &str) -> Outcome {
    if !room.is_host(by) {
        return Outcome::Unchanged;
    }
    let Ok(next) = next_phase(room.phase, PhaseEvent::ResetGame) else {
        return Outcome::Unchanged;
    };
    let before = room.clone();
    clear_game(room, next);
    if *room == before {
        Outcome::Unchanged
    } else {
        Outcome::Changed
    }
}

fn clear_game(room: &mut Room, next: RoomPhase) {
    merge_waiting_players(room);
    room.round_number = 0;
    room.round_results.clear();
    room.votes.clear();
    room.scores = room.players.keys().map(|id| (id.clone(), 0)).collect();
    room.player_states = room
        .players
        .keys()
        .map(|id| (id.clone(), PlayerState::waiting()))
        .collect();
    room.uploader_id = None;
    room.current_image = None;
    room.block = None;
    room.sabotage_round = None;
    room.saboteur_id = None;
    room.sabotage_target_id = None;
    room.sabotage_triggered = false;
    room.is_double_points = false;
    room.phase = next;
}

/// Host shallow-merges new settings.
pub fn update_settings(room: &mut Room, by: &str, patch: &SettingsPatch) -> Outcome {
    if !room.is_host(by) {
        return Outcome::Unchanged;
    }
    let merged = room.settings.merged(patch);
    if merged == room.settings {
        return Outcome::Unchanged;
    }
    room.settings = merged;
    Outcome::Changed
}

/// Host closes the room for everyone.
pub fn close_room(room: &Room, by: &str) -> Outcome {
    if room.is_host(by) {
        Outcome::Delete
    } else {
        Outcome::Unchanged
    }
}

#[cfg(test)]
mod tests {
    use rand::{SeedableRng, rngs::StdRng};

    use super::*;
    use crate::state::test_support::{drawing_room, player, room_with_players, t};

    fn rng() -> StdRng {
        StdRng::seed_from_u64(42)
    }

    fn status(room: &Room, id: &str) -> Option<PlayerStatus> {
        room.player_states.get(id).map(|state| state.status)
    }

    fn to_voting(room: &mut Room) {
        let ids: Vec<String> = room.players.keys().cloned().collect();
        for id in ids {
            submit_drawing(room, &id, &format!("d-{id}"), t(10));
        }
        assert_eq!(room.phase, RoomPhase::Voting);
    }

    #[test]
    fn join_in_lobby_rosters_player() {
        let mut room = room_with_players(&["a"]);
        assert_eq!(join_room(&mut room, player("b")), Outcome::Changed);
        assert!(room.players.contains_key("b"));
        assert_eq!(status(&room, "b"), Some(PlayerStatus::Waiting));
        assert_eq!(room.scores.get("b"), Some(&0));
    }

    #[test]
    fn rejoin_updates_in_place() {
        let mut room = room_with_players(&["a", "b"]);
        assert_eq!(join_room(&mut room, player("b")), Outcome::Unchanged);

        let mut renamed = player("b");
        renamed.name = "Bea".into();
        assert_eq!(join_room(&mut room, renamed), Outcome::Changed);
        assert_eq!(room.players.len(), 2);
        assert_eq!(room.players.get_index(1).unwrap().1.name, "Bea");
    }

    #[test]
    fn join_during_drawing_queues_until_next_round() {
        let mut room = drawing_room(&["a", "b"]);
        assert_eq!(join_room(&mut room, player("late")), Outcome::Changed);
        assert!(room.waiting_players.contains_key("late"));
        assert!(!room.players.contains_key("late"));
        assert!(!room.player_states.contains_key("late"));

        // The queued player never blocks the round in progress.
        to_voting(&mut room);
        submit_vote(&mut room, "a", "b", t(11));
        submit_vote(&mut room, "b", "a", t(11));
        assert_eq!(room.phase, RoomPhase::Results);

        let mut rng = rng();
        assert_eq!(next_round(&mut room, "a", &mut rng), Outcome::Changed);
        assert!(room.players.contains_key("late"));
        assert!(room.waiting_players.is_empty());
        assert_eq!(status(&room, "late"), Some(PlayerStatus::Waiting));
        assert_eq!(room.scores.get("late"), Some(&0));
        assert_eq!(room.round_number, 2);
    }

    #[test]
    fn host_leaving_lobby_promotes_next_player() {
        let mut room = room_with_players(&["a", "b", "c"]);
        let mut rng = rng();
        assert_eq!(leave_room(&mut room, "a", &mut rng, t(1)), Outcome::Changed);
        assert_eq!(room.host_id, "b");
        assert_eq!(room.players.len(), 2);
    }

    #[test]
    fn last_player_leaving_deletes_room() {
        let mut room = drawing_room(&["solo"]);
        let mut rng = rng();
        assert_eq!(leave_room(&mut room, "solo", &mut rng, t(1)), Outcome::Delete);
    }

    #[test]
    fn host_falls_back_to_waiting_player() {
        let mut room = drawing_room(&["a"]);
        join_room(&mut room, player("late"));
        let mut rng = rng();
        assert_eq!(leave_room(&mut room, "a", &mut rng, t(1)), Outcome::Changed);
        assert_eq!(room.host_id, "late");
    }

    #[test]
    fn leaving_clears_references_and_unblocks_round() {
        let mut room = drawing_room(&["a", "b", "c"]);
        submit_drawing(&mut room, "a", "d-a", t(2));
        submit_drawing(&mut room, "b", "d-b", t(3));
        assert_eq!(room.phase, RoomPhase::Drawing);

        let mut rng = rng();
        leave_room(&mut room, "c", &mut rng, t(4));
        assert_eq!(room.phase, RoomPhase::Voting);
        assert!(!room.player_states.contains_key("c"));
        assert!(!room.scores.contains_key("c"));
    }

    #[test]
    fn leaving_voter_completes_voting() {
        let mut room = drawing_room(&["a", "b", "c"]);
        to_voting(&mut room);
        submit_vote(&mut room, "a", "b", t(11));
        submit_vote(&mut room, "b", "a", t(11));
        let mut rng = rng();
        leave_room(&mut room, "c", &mut rng, t(12));
        assert_eq!(room.phase, RoomPhase::Results);
        assert!(!room.votes.contains_key("c"));
    }

    #[test]
    fn uploader_leaving_is_replaced() {
        let mut room = room_with_players(&["a", "b", "c"]);
        let mut rng = rng();
        start_round(&mut room, "a", &mut rng);
        let uploader = room.uploader_id.clone().unwrap();
        leave_room(&mut room, &uploader, &mut rng, t(1));
        let replacement = room.uploader_id.clone().unwrap();
        assert_ne!(replacement, uploader);
        assert!(room.players.contains_key(&replacement));
    }

    #[test]
    fn only_host_can_kick_and_not_themselves() {
        let mut room = room_with_players(&["a", "b"]);
        let mut rng = rng();
        assert_eq!(kick_player(&mut room, "b", "a", &mut rng, t(1)), Outcome::Unchanged);
        assert_eq!(kick_player(&mut room, "a", "a", &mut rng, t(1)), Outcome::Unchanged);
        assert_eq!(kick_player(&mut room, "a", "b", &mut rng, t(1)), Outcome::Changed);
        assert!(!room.is_member("b"));
        assert_eq!(kick_player(&mut room, "a", "b", &mut rng, t(1)), Outcome::Unchanged);
    }

    #[test]
    fn ready_toggles_only_in_lobby() {
        let mut room = room_with_players(&["a"]);
        assert_eq!(set_ready(&mut room, "a", true), Outcome::Changed);
        assert_eq!(set_ready(&mut room, "a", true), Outcome::Unchanged);
        assert_eq!(status(&room, "a"), Some(PlayerStatus::Ready));
        assert_eq!(set_ready(&mut room, "a", false), Outcome::Changed);

        let mut drawing = drawing_room(&["a"]);
        assert_eq!(set_ready(&mut drawing, "a", true), Outcome::Unchanged);
    }

    #[test]
    fn start_round_initializes_the_game() {
        let mut room = room_with_players(&["a", "b"]);
        room.scores.insert("a".into(), 9);
        let mut rng = rng();
        assert_eq!(start_round(&mut room, "b", &mut rng), Outcome::Unchanged);
        assert_eq!(start_round(&mut room, "a", &mut rng), Outcome::Changed);
        assert_eq!(room.phase, RoomPhase::Uploading);
        assert_eq!(room.round_number, 1);
        assert_eq!(room.scores.get("a"), Some(&0));
        assert!(room.players.contains_key(room.uploader_id.as_deref().unwrap()));
        assert!(room.current_image.is_none());
        // Retrying against the committed snapshot is a no-op.
        assert_eq!(start_round(&mut room, "a", &mut rng), Outcome::Unchanged);
    }

    #[test]
    fn sabotage_round_is_planned_with_enough_players() {
        let mut room = room_with_players(&["a", "b", "c"]);
        room.settings.sabotage_enabled = true;
        room.settings.total_rounds = 1;
        let mut rng = rng();
        start_round(&mut room, "a", &mut rng);
        assert_eq!(room.sabotage_round, Some(1));
        let saboteur = room.saboteur_id.clone().unwrap();
        assert_ne!(room.uploader_id.as_deref(), Some(saboteur.as_str()));

        let uploader = room.uploader_id.clone().unwrap();
        set_image(&mut room, &uploader, "https://img.test/1.png", &mut rng, t(1));
        let target = room
            .players
            .keys()
            .find(|id| **id != saboteur)
            .cloned()
            .unwrap();
        assert_eq!(trigger_sabotage(&mut room, &target, &saboteur), Outcome::Unchanged);
        assert_eq!(trigger_sabotage(&mut room, &saboteur, &saboteur), Outcome::Unchanged);
        assert_eq!(trigger_sabotage(&mut room, &saboteur, &target), Outcome::Changed);
        assert_eq!(room.sabotage_target_id.as_deref(), Some(target.as_str()));
        assert_eq!(trigger_sabotage(&mut room, &saboteur, &target), Outcome::Unchanged);
    }

    #[test]
    fn sabotage_needs_three_players() {
        let mut room = room_with_players(&["a", "b"]);
        room.settings.sabotage_enabled = true;
        let mut rng = rng();
        start_round(&mut room, "a", &mut rng);
        assert_eq!(room.sabotage_round, None);
        assert_eq!(room.saboteur_id, None);
    }

    #[test]
    fn final_round_is_double_points() {
        let mut room = room_with_players(&["a", "b"]);
        room.settings.total_rounds = 2;
        let mut rng = rng();
        start_round(&mut room, "a", &mut rng);
        assert!(!room.is_double_points);
        room.phase = RoomPhase::Results;
        next_round(&mut room, "a", &mut rng);
        assert!(room.is_double_points);
    }

    #[test]
    fn set_image_starts_drawing_for_everyone() {
        let mut room = room_with_players(&["a", "b"]);
        let mut rng = rng();
        start_round(&mut room, "a", &mut rng);
        let uploader = room.uploader_id.clone().unwrap();
        let other = if uploader == "a" { "b" } else { "a" };
        if other != "a" {
            assert_eq!(
                set_image(&mut room, other, "https://img.test/x.png", &mut rng, t(3)),
                Outcome::Unchanged
            );
        }
        assert_eq!(
            set_image(&mut room, &uploader, "https://img.test/x.png", &mut rng, t(3)),
            Outcome::Changed
        );
        assert_eq!(room.phase, RoomPhase::Drawing);
        let block = room.block.unwrap();
        assert!(block.x >= 0.0 && block.x + block.width <= 1.0 + f32::EPSILON);
        for state in room.player_states.values() {
            assert_eq!(state.status, PlayerStatus::Drawing);
            assert_eq!(state.timer_started_at, Some(t(3)));
        }
    }

    #[test]
    fn duplicate_submission_is_ignored() {
        let mut room = drawing_room(&["a", "b"]);
        assert_eq!(submit_drawing(&mut room, "a", "d-a", t(2)), Outcome::Changed);
        assert_eq!(submit_drawing(&mut room, "a", "d-a2", t(3)), Outcome::Unchanged);
        let state = room.player_states.get("a").unwrap();
        assert_eq!(state.submitted_at, Some(t(2)));
        assert_eq!(state.drawing_key.as_deref(), Some("d-a"));
    }

    #[test]
    fn votes_overwrite_and_validate_targets() {
        let mut room = drawing_room(&["a", "b", "c"]);
        to_voting(&mut room);
        assert_eq!(submit_vote(&mut room, "a", "ghost", t(11)), Outcome::Unchanged);
        assert_eq!(submit_vote(&mut room, "a", "b", t(11)), Outcome::Changed);
        assert_eq!(submit_vote(&mut room, "a", "b", t(11)), Outcome::Unchanged);
        assert_eq!(submit_vote(&mut room, "a", "c", t(12)), Outcome::Changed);
        assert_eq!(room.votes.get("a").map(String::as_str), Some("c"));
        assert_eq!(room.votes.len(), 1);
    }

    #[test]
    fn stale_vote_after_results_is_absorbed() {
        let mut room = drawing_room(&["a", "b"]);
        to_voting(&mut room);
        submit_vote(&mut room, "a", "b", t(11));
        submit_vote(&mut room, "b", "b", t(11));
        assert_eq!(room.phase, RoomPhase::Results);
        let scores = room.scores.clone();
        assert_eq!(submit_vote(&mut room, "a", "a", t(12)), Outcome::Unchanged);
        assert_eq!(room.scores, scores);
    }

    #[test]
    fn forced_scenario_matches_natural_scoring() {
        let mut room = drawing_room(&["A", "B", "C"]);
        room.settings.total_rounds = 1;
        submit_drawing(&mut room, "A", "d-A", t(2));
        submit_drawing(&mut room, "B", "d-B", t(3));

        assert_eq!(force_advance_round(&mut room, "B", t(4)), Outcome::Unchanged);
        assert_eq!(force_advance_round(&mut room, "A", t(4)), Outcome::Changed);
        assert_eq!(room.phase, RoomPhase::Voting);
        assert_eq!(status(&room, "C"), Some(PlayerStatus::Submitted));

        for voter in ["A", "B", "C"] {
            submit_vote(&mut room, voter, "A", t(5));
        }
        assert_eq!(room.phase, RoomPhase::Final);
        let rankings: Vec<(&str, u32, u32)> = room.round_results[0]
            .rankings
            .iter()
            .map(|r| (r.player_id.as_str(), r.votes, r.points))
            .collect();
        assert_eq!(rankings, vec![("A", 3, 3), ("B", 0, 0), ("C", 0, 0)]);
    }

    #[test]
    fn forced_voting_uses_the_same_points() {
        let mut natural = drawing_room(&["a", "b", "c", "d"]);
        to_voting(&mut natural);
        submit_vote(&mut natural, "a", "b", t(11));
        submit_vote(&mut natural, "b", "c", t(11));
        submit_vote(&mut natural, "c", "b", t(11));
        let mut forced = natural.clone();

        submit_vote(&mut natural, "d", "a", t(12));
        assert_eq!(natural.phase, RoomPhase::Results);

        // Host forces the tally with d's vote identical to the natural path.
        forced.votes.insert("d".into(), "a".into());
        assert_eq!(force_advance_round(&mut forced, "a", t(12)), Outcome::Changed);

        assert_eq!(forced.round_results, natural.round_results);
        assert_eq!(forced.scores, natural.scores);
        let awarded: u32 = natural.round_results[0].rankings.iter().map(|r| r.points).sum();
        assert_eq!(awarded, 6);
    }

    #[test]
    fn force_outside_rounds_is_unchanged() {
        let mut room = room_with_players(&["a"]);
        assert_eq!(force_advance_round(&mut room, "a", t(1)), Outcome::Unchanged);
    }

    #[test]
    fn play_again_then_acknowledge_returns_to_clean_lobby() {
        let mut room = drawing_room(&["a", "b"]);
        room.settings.total_rounds = 1;
        to_voting(&mut room);
        submit_vote(&mut room, "a", "b", t(11));
        submit_vote(&mut room, "b", "b", t(11));
        assert_eq!(room.phase, RoomPhase::Final);
        join_room(&mut room, player("late"));

        assert_eq!(play_again(&mut room, "b"), Outcome::Unchanged);
        assert_eq!(play_again(&mut room, "a"), Outcome::Changed);
        assert_eq!(room.phase, RoomPhase::Rewards);
        assert_eq!(acknowledge_rewards(&mut room, "stranger"), Outcome::Unchanged);
        assert_eq!(acknowledge_rewards(&mut room, "b"), Outcome::Changed);
        assert_eq!(room.phase, RoomPhase::Lobby);
        assert_eq!(room.round_number, 0);
        assert!(room.round_results.is_empty());
        assert!(room.players.contains_key("late"));
        assert!(room.scores.values().all(|score| *score == 0));
    }

    #[test]
    fn reset_game_from_mid_round() {
        let mut room = drawing_room(&["a", "b"]);
        submit_drawing(&mut room, "a", "d-a", t(2));
        assert_eq!(reset_game(&mut room, "b"), Outcome::Unchanged);
        assert_eq!(reset_game(&mut room, "a"), Outcome::Changed);
        assert_eq!(room.phase, RoomPhase::Lobby);
        assert!(room.current_image.is_none());
        assert_eq!(status(&room, "a"), Some(PlayerStatus::Waiting));
        assert_eq!(reset_game(&mut room, "a"), Outcome::Unchanged);
    }

    #[test]
    fn settings_merge_is_host_only_and_shallow() {
        let mut room = room_with_players(&["a", "b"]);
        let patch = SettingsPatch {
            total_rounds: Some(5),
            ..SettingsPatch::default()
        };
        assert_eq!(update_settings(&mut room, "b", &patch), Outcome::Unchanged);
        assert_eq!(update_settings(&mut room, "a", &patch), Outcome::Changed);
        assert_eq!(room.settings.total_rounds, 5);
        assert_eq!(room.phase, RoomPhase::Lobby);
        assert_eq!(update_settings(&mut room, "a", &patch), Outcome::Unchanged);
    }

    #[test]
    fn close_room_is_host_only() {
        let room = room_with_players(&["a", "b"]);
        assert_eq!(close_room(&room, "b"), Outcome::Unchanged);
        assert_eq!(close_room(&room, "a"), Outcome::Delete);
    }
}
