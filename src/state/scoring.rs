//! Vote tally and placement points. Both the natural end of voting and the host's
//! forced advance go through [`rank_round`].

use std::cmp::Ordering;

use indexmap::IndexMap;

use crate::state::room::{PlayerId, Ranking, Room};

/// Points for the first three placements.
pub const PLACEMENT_POINTS: [u32; 3] = [3, 2, 1];
/// Multiplier applied on double-points rounds.
pub const DOUBLE_POINTS_MULTIPLIER: u32 = 2;

/// Count one vote per rostered voter for rostered targets, keyed in roster order.
pub fn tally_votes(room: &Room) -> IndexMap<PlayerId, u32> {
    let mut counts: IndexMap<PlayerId, u32> =
        room.players.keys().map(|id| (id.clone(), 0)).collect();

    for (voter, target) in &room.votes {
        if !room.players.contains_key(voter) {
            continue;
        }
        if let Some(count) = counts.get_mut(target) {
            *count += 1;
        }
    }

    counts
}

/// Rank every rostered player and compute the points awarded for the round.
///
/// Players are ordered by vote count, then by earliest drawing submission, then by
/// roster order. Only players who received at least one vote score placement points.
pub fn rank_round(room: &Room) -> Vec<Ranking> {
    let counts = tally_votes(room);

    let mut entries: Vec<(usize, &PlayerId, u32)> = counts
        .iter()
        .enumerate()
        .map(|(index, (id, votes))| (index, id, *votes))
        .collect();

    entries.sort_by(|(a_index, a_id, a_votes), (b_index, b_id, b_votes)| {
        b_votes
            .cmp(a_votes)
            .then_with(|| compare_submission(room, a_id, b_id))
            .then_with(|| a_index.cmp(b_index))
    });

    let multiplier = if room.is_double_points {
        DOUBLE_POINTS_MULTIPLIER
    } else {
        1
    };

    entries
        .into_iter()
        .enumerate()
        .map(|(placement, (_, id, votes))| {
            let base = if votes > 0 {
                PLACEMENT_POINTS.get(placement).copied().unwrap_or(0)
            } else {
                0
            };
            Ranking {
                player_id: id.clone(),
                votes,
                points: base * multiplier,
            }
        })
        .collect()
}

/// Earlier submissions first; players without a submission time go last.
fn compare_submission(room: &Room, a: &str, b: &str) -> Ordering {
    let submitted_at = |id: &str| room.player_states.get(id).and_then(|s| s.submitted_at);
    match (submitted_at(a), submitted_at(b)) {
        (Some(a), Some(b)) => a.cmp(&b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

#[cfg(test)]
mod tests {
    use std::time::{Duration, SystemTime};

    use super::*;
    use crate::state::{
        room::PlayerStatus,
        test_support::{room_with_players, t},
    };

    fn submit_at(room: &mut Room, id: &str, at: SystemTime) {
        let state = room.player_states.get_mut(id).unwrap();
        state.status = PlayerStatus::Submitted;
        state.submitted_at = Some(at);
    }

    fn vote(room: &mut Room, voter: &str, target: &str) {
        room.votes.insert(voter.into(), target.into());
    }

    #[test]
    fn placements_award_three_two_one() {
        let mut room = room_with_players(&["a", "b", "c", "d"]);
        vote(&mut room, "a", "b");
        vote(&mut room, "b", "c");
        vote(&mut room, "c", "b");
        vote(&mut room, "d", "a");
        // c and a tie on one vote; a submitted earlier.
        submit_at(&mut room, "a", t(1));
        submit_at(&mut room, "c", t(2));

        let rankings = rank_round(&room);
        let summary: Vec<(&str, u32, u32)> = rankings
            .iter()
            .map(|r| (r.player_id.as_str(), r.votes, r.points))
            .collect();
        assert_eq!(
            summary,
            vec![("b", 2, 3), ("a", 1, 2), ("c", 1, 1), ("d", 0, 0)]
        );
        assert_eq!(rankings.iter().map(|r| r.points).sum::<u32>(), 6);
    }

    #[test]
    fn double_points_doubles_every_placement() {
        let mut room = room_with_players(&["a", "b", "c"]);
        room.is_double_points = true;
        vote(&mut room, "a", "b");
        vote(&mut room, "b", "c");
        vote(&mut room, "c", "a");
        submit_at(&mut room, "c", t(1));
        submit_at(&mut room, "a", t(2));
        submit_at(&mut room, "b", t(3));

        let points: Vec<(String, u32)> = rank_round(&room)
            .into_iter()
            .map(|r| (r.player_id, r.points))
            .collect();
        assert_eq!(
            points,
            vec![("c".into(), 6), ("a".into(), 4), ("b".into(), 2)]
        );
    }

    #[test]
    fn zero_vote_players_score_nothing() {
        let mut room = room_with_players(&["a", "b", "c"]);
        for voter in ["a", "b", "c"] {
            vote(&mut room, voter, "a");
        }
        let rankings = rank_round(&room);
        assert_eq!(rankings[0].player_id, "a");
        assert_eq!(rankings[0].votes, 3);
        assert_eq!(rankings[0].points, 3);
        assert!(rankings[1..].iter().all(|r| r.points == 0));
    }

    #[test]
    fn ties_without_submissions_keep_roster_order() {
        let room = room_with_players(&["x", "y", "z"]);
        let order: Vec<String> = rank_round(&room).into_iter().map(|r| r.player_id).collect();
        assert_eq!(order, vec!["x", "y", "z"]);
    }

    #[test]
    fn departed_voters_and_targets_are_ignored() {
        let mut room = room_with_players(&["a", "b"]);
        vote(&mut room, "ghost", "a");
        vote(&mut room, "a", "ghost");
        vote(&mut room, "b", "a");
        let counts = tally_votes(&room);
        assert_eq!(counts.get("a"), Some(&1));
        assert_eq!(counts.get("b"), Some(&0));
        assert!(!counts.contains_key("ghost"));
    }

    #[test]
    fn submission_order_breaks_ties_before_roster_order() {
        let mut room = room_with_players(&["a", "b"]);
        vote(&mut room, "a", "a");
        vote(&mut room, "b", "b");
        submit_at(&mut room, "b", t(1));
        submit_at(&mut room, "a", t(1) + Duration::from_millis(5));
        let order: Vec<String> = rank_round(&room).into_iter().map(|r| r.player_id).collect();
        assert_eq!(order, vec!["b", "a"]);
    }
}
