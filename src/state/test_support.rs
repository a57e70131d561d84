use std::{
    collections::BTreeMap,
    time::{Duration, SystemTime},
};

use crate::state::{
    room::{Player, PlayerState, PlayerStatus, Room, RoomSettings},
    room_code::RoomCode,
    state_machine::RoomPhase,
};

pub fn t(secs: u64) -> SystemTime {
    SystemTime::UNIX_EPOCH + Duration::from_secs(secs)
}

pub fn player(id: &str) -> Player {
    Player {
        id: id.to_owned(),
        name: id.to_uppercase(),
        avatar_url: None,
        cosmetics: BTreeMap::new(),
        joined_at: t(0),
    }
}

/// Lobby whose first id is the host.
pub fn room_with_players(ids: &[&str]) -> Room {
    let code = RoomCode::parse("ABCDEF").unwrap();
    let mut room = Room::new(code, player(ids[0]), RoomSettings::default(), t(0));
    for id in &ids[1..] {
        room.players.insert((*id).to_owned(), player(id));
        room.player_states
            .insert((*id).to_owned(), PlayerState::waiting());
        room.scores.insert((*id).to_owned(), 0);
    }
    room
}

/// First round of a three round game, everyone drawing.
pub fn drawing_room(ids: &[&str]) -> Room {
    let mut room = room_with_players(ids);
    room.phase = RoomPhase::Drawing;
    room.round_number = 1;
    room.settings.total_rounds = 3;
    room.uploader_id = Some(ids[0].to_owned());
    room.current_image = Some("https://img.test/round-1.png".into());
    for state in room.player_states.values_mut() {
        state.status = PlayerStatus::Drawing;
        state.timer_started_at = Some(t(0));
    }
    room
}
