use candid::{CandidType, Principal};
use ic_stable_structures::storable::Bound;
use ic_stable_structures::Storable;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::collections::VecDeque;

// =============================================================================
// GAME TUNING CONSTANTS
// =============================================================================

pub const GRID_SIZE: u8 = 20;
pub const TOTAL_CELLS: usize = (GRID_SIZE as usize) * (GRID_SIZE as usize);
pub const START_CELL: Cell = Cell::new(10, 10);

pub const INITIAL_SPEED_MS: f64 = 150.0;
pub const MAX_SPEED_MS: f64 = 80.0;
pub const SPEED_DECAY: f64 = 0.98;

pub const MAX_SCORE: u32 = 1000;
pub const BASE_FOOD_POINTS: f64 = 10.0;
pub const INITIAL_SCORE_RATE: f64 = 1.0;
pub const SCORE_RATE_STEP: f64 = 0.5;
pub const MAX_SCORE_RATE: f64 = 10.0;

pub const DEFAULT_MAX_PLAYS_PER_DAY: u32 = 3;
pub const VIP_MAX_PLAYS_PER_DAY: u32 = 5;

/// Usernames granted the raised daily play allowance. Exact match only.
pub const VIP_USERS: &[&str] = &["vlady"];

pub const NANOS_PER_DAY: u64 = 86_400_000_000_000;

// =============================================================================
// GRID TYPES
// =============================================================================

#[derive(
    CandidType, Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord,
)]
pub struct Cell {
    pub x: u8,
    pub y: u8,
}

impl Cell {
    pub const fn new(x: u8, y: u8) -> Self {
        Cell { x, y }
    }
}

#[derive(CandidType, Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub enum Direction {
    Up,
    Down,
    Left,
    Right,
}

impl Direction {
    pub fn reverse(self) -> Self {
        match self {
            Direction::Up => Direction::Down,
            Direction::Down => Direction::Up,
            Direction::Left => Direction::Right,
            Direction::Right => Direction::Left,
        }
    }

    /// Unit vector as (dx, dy); y grows downward.
    pub fn delta(self) -> (i16, i16) {
        match self {
            Direction::Up => (0, -1),
            Direction::Down => (0, 1),
            Direction::Left => (-1, 0),
            Direction::Right => (1, 0),
        }
    }
}

#[derive(CandidType, Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub enum GameMode {
    Normal,
    Practice,
}

// =============================================================================
// GAME SESSION
// =============================================================================

/// One running (or just-finished) game. Sessions are created on start,
/// replaced on restart, and not carried across upgrades. Durable per-player
/// state lives in the session tracker, not here.
#[derive(Clone, Debug)]
pub struct GameSession {
    pub mode: GameMode,
    pub snake: VecDeque<Cell>,
    pub direction: Direction,
    pub food: Option<Cell>,
    pub score: u32,
    pub score_rate: f64,
    pub speed_ms: f64,
    pub is_over: bool,
    pub started_at_ns: u64,
}

impl GameSession {
    pub fn new(mode: GameMode, food: Cell, started_at_ns: u64) -> Self {
        let mut snake = VecDeque::with_capacity(TOTAL_CELLS);
        snake.push_back(START_CELL);
        GameSession {
            mode,
            snake,
            direction: Direction::Right,
            food: Some(food),
            score: 0,
            score_rate: INITIAL_SCORE_RATE,
            speed_ms: INITIAL_SPEED_MS,
            is_over: false,
            started_at_ns,
        }
    }

    pub fn head(&self) -> Cell {
        *self.snake.front().expect("snake is never empty")
    }
}

/// What the frontend draws. Flat snake vector, head first.
#[derive(CandidType, Deserialize, Clone, Debug)]
pub struct GameView {
    pub mode: GameMode,
    pub snake: Vec<Cell>,
    pub direction: Direction,
    pub food: Option<Cell>,
    pub score: u32,
    pub score_rate: f64,
    pub speed_ms: u64,
    pub is_over: bool,
}

impl From<&GameSession> for GameView {
    fn from(s: &GameSession) -> Self {
        GameView {
            mode: s.mode,
            snake: s.snake.iter().copied().collect(),
            direction: s.direction,
            food: s.food,
            score: s.score,
            score_rate: s.score_rate,
            speed_ms: s.speed_ms as u64,
            is_over: s.is_over,
        }
    }
}

// =============================================================================
// PER-PLAYER DURABLE STATE
// =============================================================================

/// Daily counters keyed by player principal. `total_score` survives day
/// boundaries and zeroes only after a successful claim.
#[derive(CandidType, Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct PlayerDailyState {
    pub plays_today: u32,
    pub total_score: u32,
    pub points_recorded: bool,
    pub rewards_claimed: bool,
    pub day_start_ns: u64,
}

impl Default for PlayerDailyState {
    fn default() -> Self {
        PlayerDailyState {
            plays_today: 0,
            total_score: 0,
            points_recorded: false,
            rewards_claimed: false,
            day_start_ns: 0,
        }
    }
}

impl Storable for PlayerDailyState {
    fn to_bytes(&self) -> Cow<[u8]> {
        Cow::Owned(serde_json::to_vec(self).expect("PlayerDailyState serialization cannot fail"))
    }

    // Corrupted entries decode to defaults: stored garbage is treated as
    // absence of state, and the next write replaces it.
    fn from_bytes(bytes: Cow<[u8]>) -> Self {
        serde_json::from_slice(&bytes).unwrap_or_default()
    }

    const BOUND: Bound = Bound::Bounded {
        max_size: 256,
        is_fixed_size: false,
    };
}

#[derive(CandidType, Serialize, Deserialize, Clone, Debug, Default)]
pub struct PlayerProfile {
    pub username: String,
    pub registered_at_ns: u64,
}

impl Storable for PlayerProfile {
    fn to_bytes(&self) -> Cow<[u8]> {
        Cow::Owned(serde_json::to_vec(self).expect("PlayerProfile serialization cannot fail"))
    }

    fn from_bytes(bytes: Cow<[u8]>) -> Self {
        serde_json::from_slice(&bytes).unwrap_or_default()
    }

    const BOUND: Bound = Bound::Bounded {
        max_size: 512,
        is_fixed_size: false,
    };
}

/// Daily-state view returned to the frontend; includes derived fields so the
/// client never re-implements the eligibility rules.
#[derive(CandidType, Deserialize, Clone, Debug)]
pub struct DailyStateView {
    pub plays_today: u32,
    pub max_plays: u32,
    pub total_score: u32,
    pub points_recorded: bool,
    pub rewards_claimed: bool,
    pub can_play: bool,
    pub is_vip: bool,
    pub high_score: u32,
}

// =============================================================================
// CANISTER CONFIGURATION
// =============================================================================

/// External contract bindings, supplied by whoever installs the canister.
/// Held in a stable cell; when absent the reward bridge reports itself
/// unavailable and no call is attempted.
#[derive(CandidType, Serialize, Deserialize, Clone, Debug)]
pub struct BridgeConfig {
    pub reward_contract: Principal,
    pub token_contract: Principal,
}

#[derive(CandidType, Serialize, Deserialize, Clone, Debug, Default)]
pub struct InitArgs {
    pub bridge: Option<BridgeConfig>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_direction_reverse() {
        assert_eq!(Direction::Up.reverse(), Direction::Down);
        assert_eq!(Direction::Down.reverse(), Direction::Up);
        assert_eq!(Direction::Left.reverse(), Direction::Right);
        assert_eq!(Direction::Right.reverse(), Direction::Left);
    }

    #[test]
    fn test_direction_deltas_are_unit_steps() {
        for dir in [
            Direction::Up,
            Direction::Down,
            Direction::Left,
            Direction::Right,
        ] {
            let (dx, dy) = dir.delta();
            assert_eq!(dx.abs() + dy.abs(), 1);
        }
    }

    #[test]
    fn test_new_session_matches_start_conditions() {
        let s = GameSession::new(GameMode::Normal, Cell::new(5, 5), 0);
        assert_eq!(s.snake.len(), 1);
        assert_eq!(s.head(), Cell::new(10, 10));
        assert_eq!(s.direction, Direction::Right);
        assert_eq!(s.score, 0);
        assert_eq!(s.score_rate, INITIAL_SCORE_RATE);
        assert_eq!(s.speed_ms, INITIAL_SPEED_MS);
        assert!(!s.is_over);
    }

    #[test]
    fn test_daily_state_decodes_garbage_as_default() {
        let decoded = PlayerDailyState::from_bytes(Cow::Borrowed(b"not json at all"));
        assert_eq!(decoded, PlayerDailyState::default());
    }

    #[test]
    fn test_daily_state_roundtrip() {
        let state = PlayerDailyState {
            plays_today: 2,
            total_score: 430,
            points_recorded: true,
            rewards_claimed: false,
            day_start_ns: 86_400_000_000_000,
        };
        let decoded = PlayerDailyState::from_bytes(state.to_bytes());
        assert_eq!(decoded, state);
    }
}
