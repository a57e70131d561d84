use std::{collections::BTreeMap, time::SystemTime};

use indexmap::IndexMap;

use crate::state::{room_code::RoomCode, state_machine::RoomPhase};

/// Identifier supplied by the identity collaborator.
pub type PlayerId = String;

/// Default number of seconds players get to draw.
pub const DEFAULT_TIMER_SECONDS: u32 = 90;
/// Default number of rounds in a game.
pub const DEFAULT_TOTAL_ROUNDS: u32 = 3;

/// Player profile embedded in the room document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Player {
    /// Stable identifier issued by the identity collaborator.
    pub id: PlayerId,
    /// Display name.
    pub name: String,
    /// Reference to the avatar rendering; heavy stroke data lives in the avatar keyspace.
    pub avatar_url: Option<String>,
    /// Cosmetic selections keyed by slot (e.g. "hat" -> "crown").
    pub cosmetics: BTreeMap<String, String>,
    /// When the player first joined this room.
    pub joined_at: SystemTime,
}

impl Player {
    /// Whether the display attributes differ from `other` (identity and join time ignored).
    pub fn profile_differs(&self, other: &Player) -> bool {
        self.name != other.name
            || self.avatar_url != other.avatar_url
            || self.cosmetics != other.cosmetics
    }

    /// Copy the display attributes of `other` into this entry.
    pub fn update_profile(&mut self, other: Player) {
        self.name = other.name;
        self.avatar_url = other.avatar_url;
        self.cosmetics = other.cosmetics;
    }
}

/// Per-round progress of a player.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PlayerStatus {
    /// Idle, waiting for the round to start.
    Waiting,
    /// Flagged as ready in the lobby.
    Ready,
    /// Currently drawing.
    Drawing,
    /// Drawing handed in for this round.
    Submitted,
}

impl PlayerStatus {
    /// Wire representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            PlayerStatus::Waiting => "waiting",
            PlayerStatus::Ready => "ready",
            PlayerStatus::Drawing => "drawing",
            PlayerStatus::Submitted => "submitted",
        }
    }

    /// Parse the wire representation.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "waiting" => Some(PlayerStatus::Waiting),
            "ready" => Some(PlayerStatus::Ready),
            "drawing" => Some(PlayerStatus::Drawing),
            "submitted" => Some(PlayerStatus::Submitted),
            _ => None,
        }
    }
}

/// Entry of the `playerStates` map.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayerState {
    pub status: PlayerStatus,
    /// Advisory: clients render the countdown from here.
    pub timer_started_at: Option<SystemTime>,
    pub submitted_at: Option<SystemTime>,
    /// Key of the drawing payload in the drawing keyspace.
    pub drawing_key: Option<String>,
}

impl PlayerState {
    /// Fresh state for a player between rounds.
    pub fn waiting() -> Self {
        Self {
            status: PlayerStatus::Waiting,
            timer_started_at: None,
            submitted_at: None,
            drawing_key: None,
        }
    }
}

/// Host-tunable room settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomSettings {
    /// Drawing time per round, in seconds. Only rendered by clients.
    pub timer_seconds: u32,
    /// Rounds per game; the round reaching it ends in `final`.
    pub total_rounds: u32,
    /// Whether a saboteur is drawn for one round of the game.
    pub sabotage_enabled: bool,
    /// Whether the last round awards double points.
    pub double_points_final_round: bool,
}

impl Default for RoomSettings {
    fn default() -> Self {
        Self {
            timer_seconds: DEFAULT_TIMER_SECONDS,
            total_rounds: DEFAULT_TOTAL_ROUNDS,
            sabotage_enabled: false,
            double_points_final_round: true,
        }
    }
}

/// Partial settings update; `None` fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SettingsPatch {
    pub timer_seconds: Option<u32>,
    pub total_rounds: Option<u32>,
    pub sabotage_enabled: Option<bool>,
    pub double_points_final_round: Option<bool>,
}

impl RoomSettings {
    /// Shallow merge of `patch` into a copy of these settings.
    pub fn merged(&self, patch: &SettingsPatch) -> Self {
        Self {
            timer_seconds: patch.timer_seconds.unwrap_or(self.timer_seconds),
            total_rounds: patch.total_rounds.unwrap_or(self.total_rounds),
            sabotage_enabled: patch.sabotage_enabled.unwrap_or(self.sabotage_enabled),
            double_points_final_round: patch
                .double_points_final_round
                .unwrap_or(self.double_points_final_round),
        }
    }
}

/// Obstruction rectangle on the drawing canvas, in normalized `0..=1` coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Block {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

/// Placement of a player in a completed round.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ranking {
    pub player_id: PlayerId,
    pub votes: u32,
    pub points: u32,
}

/// Drawing reference captured when a round completes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DrawingSnapshot {
    pub player_id: PlayerId,
    pub drawing_key: Option<String>,
}

/// Entry of the append-only `roundResults` list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoundResult {
    pub round_number: u32,
    pub rankings: Vec<Ranking>,
    pub drawings: Vec<DrawingSnapshot>,
    pub image: Option<String>,
    pub double_points: bool,
}

/// Canonical, normalized room aggregate. Every mutation works on this shape.
#[derive(Debug, Clone, PartialEq)]
pub struct Room {
    pub code: RoomCode,
    pub host_id: PlayerId,
    pub phase: RoomPhase,
    /// Rostered players, unique by id, in join order.
    pub players: IndexMap<PlayerId, Player>,
    /// Mid-round joiners merged at the next round boundary.
    pub waiting_players: IndexMap<PlayerId, Player>,
    pub player_states: IndexMap<PlayerId, PlayerState>,
    /// Voter id to voted-for id.
    pub votes: IndexMap<PlayerId, PlayerId>,
    pub scores: IndexMap<PlayerId, u32>,
    pub round_number: u32,
    pub settings: RoomSettings,
    pub round_results: Vec<RoundResult>,
    pub uploader_id: Option<PlayerId>,
    pub current_image: Option<String>,
    pub block: Option<Block>,
    pub sabotage_round: Option<u32>,
    pub saboteur_id: Option<PlayerId>,
    pub sabotage_target_id: Option<PlayerId>,
    pub sabotage_triggered: bool,
    pub is_double_points: bool,
    pub created_at: SystemTime,
    pub updated_at: SystemTime,
}

impl Room {
    /// Build a lobby with `host` as its only player.
    pub fn new(code: RoomCode, host: Player, settings: RoomSettings, now: SystemTime) -> Self {
        let host_id = host.id.clone();
        let mut players = IndexMap::new();
        players.insert(host_id.clone(), host);
        let mut player_states = IndexMap::new();
        player_states.insert(host_id.clone(), PlayerState::waiting());
        let mut scores = IndexMap::new();
        scores.insert(host_id.clone(), 0);

        Self {
            code,
            host_id,
            phase: RoomPhase::Lobby,
            players,
            waiting_players: IndexMap::new(),
            player_states,
            votes: IndexMap::new(),
            scores,
            round_number: 0,
            settings,
            round_results: Vec::new(),
            uploader_id: None,
            current_image: None,
            block: None,
            sabotage_round: None,
            saboteur_id: None,
            sabotage_target_id: None,
            sabotage_triggered: false,
            is_double_points: false,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_host(&self, player_id: &str) -> bool {
        !self.host_id.is_empty() && self.host_id == player_id
    }

    /// Whether the player is rostered or queued.
    pub fn is_member(&self, player_id: &str) -> bool {
        self.players.contains_key(player_id) || self.waiting_players.contains_key(player_id)
    }

    /// No rostered and no queued players remain.
    pub fn is_abandoned(&self) -> bool {
        self.players.is_empty() && self.waiting_players.is_empty()
    }

    /// Number of rostered plus queued players.
    pub fn member_count(&self) -> usize {
        self.players.len() + self.waiting_players.len()
    }

    /// Display name of the current host, if it is still a member.
    pub fn host_name(&self) -> Option<&str> {
        self.players
            .get(&self.host_id)
            .or_else(|| self.waiting_players.get(&self.host_id))
            .map(|player| player.name.as_str())
    }

    /// Whether a result has already been recorded for `round_number`.
    pub fn has_result_for(&self, round_number: u32) -> bool {
        self.round_results
            .iter()
            .any(|result| result.round_number == round_number)
    }

    /// Whether the current round is the last one of the game.
    pub fn is_last_round(&self) -> bool {
        self.round_number >= self.settings.total_rounds
    }
}
