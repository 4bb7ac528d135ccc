//! Session/limits tracker: daily play counts, accumulated score, claim flags,
//! profiles, and high scores, keyed by player principal.
//!
//! The daily reset is applied lazily on the mutating paths. Query views
//! project the reset without persisting it (queries run on a fork and cannot
//! write), so the stored record is rolled over exactly once per day boundary,
//! by the first update call that touches it.

use crate::memory_ids::{DAILY_STATE_MEMORY_ID, HIGH_SCORES_MEMORY_ID, PROFILES_MEMORY_ID};
use crate::types::{
    DailyStateView, GameMode, PlayerDailyState, PlayerProfile, DEFAULT_MAX_PLAYS_PER_DAY,
    MAX_SCORE, NANOS_PER_DAY, VIP_MAX_PLAYS_PER_DAY, VIP_USERS,
};
use crate::{Memory, MEMORY_MANAGER};
use candid::Principal;
use ic_stable_structures::memory_manager::MemoryId;
use ic_stable_structures::StableBTreeMap;
use std::cell::RefCell;

const MAX_USERNAME_LEN: usize = 32;

thread_local! {
    static DAILY_STATE: RefCell<StableBTreeMap<Principal, PlayerDailyState, Memory>> = RefCell::new(
        StableBTreeMap::init(
            MEMORY_MANAGER.with(|m| m.borrow().get(MemoryId::new(DAILY_STATE_MEMORY_ID))),
        )
    );

    static PROFILES: RefCell<StableBTreeMap<Principal, PlayerProfile, Memory>> = RefCell::new(
        StableBTreeMap::init(
            MEMORY_MANAGER.with(|m| m.borrow().get(MemoryId::new(PROFILES_MEMORY_ID))),
        )
    );

    static HIGH_SCORES: RefCell<StableBTreeMap<Principal, u32, Memory>> = RefCell::new(
        StableBTreeMap::init(
            MEMORY_MANAGER.with(|m| m.borrow().get(MemoryId::new(HIGH_SCORES_MEMORY_ID))),
        )
    );
}

/// UTC midnight for the day containing `now_ns`.
pub fn day_start(now_ns: u64) -> u64 {
    (now_ns / NANOS_PER_DAY) * NANOS_PER_DAY
}

fn rolled_over(stored: &PlayerDailyState, now_ns: u64) -> PlayerDailyState {
    PlayerDailyState {
        plays_today: 0,
        // Accumulated score survives the day boundary until claimed.
        total_score: stored.total_score,
        points_recorded: false,
        rewards_claimed: false,
        day_start_ns: day_start(now_ns),
    }
}

/// Current-day state for `player`, with the daily reset applied and persisted
/// when the stored record belongs to an earlier day. Update paths only.
fn state_for_update(player: Principal, now_ns: u64) -> PlayerDailyState {
    let today = day_start(now_ns);
    let stored = DAILY_STATE
        .with(|m| m.borrow().get(&player))
        .unwrap_or_default();

    if stored.day_start_ns == today {
        return stored;
    }

    let fresh = rolled_over(&stored, now_ns);
    DAILY_STATE.with(|m| m.borrow_mut().insert(player, fresh.clone()));
    ic_cdk::println!(
        "Daily reset for {}: plays cleared, total_score {} carried over",
        player,
        fresh.total_score
    );
    fresh
}

fn put_state(player: Principal, state: PlayerDailyState) {
    DAILY_STATE.with(|m| m.borrow_mut().insert(player, state));
}

// =============================================================================
// ELIGIBILITY
// =============================================================================

pub fn username_of(player: Principal) -> Option<String> {
    PROFILES
        .with(|m| m.borrow().get(&player))
        .map(|p| p.username)
}

pub fn is_vip(player: Principal) -> bool {
    match username_of(player) {
        Some(name) => VIP_USERS.contains(&name.as_str()),
        None => false,
    }
}

pub fn max_plays_for(player: Principal) -> u32 {
    if is_vip(player) {
        VIP_MAX_PLAYS_PER_DAY
    } else {
        DEFAULT_MAX_PLAYS_PER_DAY
    }
}

pub fn can_play(player: Principal, now_ns: u64) -> bool {
    let today = day_start(now_ns);
    let stored = DAILY_STATE
        .with(|m| m.borrow().get(&player))
        .unwrap_or_default();
    let plays = if stored.day_start_ns == today {
        stored.plays_today
    } else {
        0
    };
    plays < max_plays_for(player)
}

// =============================================================================
// MUTATIONS
// =============================================================================

/// Consume one daily play. Persisted immediately, before the game loop is
/// armed, so a crashed start can never hand out a free second play.
pub fn increment_play(player: Principal, now_ns: u64) -> Result<u32, String> {
    let mut state = state_for_update(player, now_ns);
    if state.plays_today >= max_plays_for(player) {
        return Err("No plays left today".to_string());
    }
    state.plays_today += 1;
    let plays = state.plays_today;
    put_state(player, state);
    Ok(plays)
}

pub struct GameOverOutcome {
    pub new_total: u32,
    pub plays_exhausted: bool,
    /// Local preconditions for point recording hold; the caller still gates
    /// on the reward bridge being configured.
    pub should_record_points: bool,
}

/// Fold a finished game into the daily state. Practice games touch nothing.
pub fn on_game_over(
    player: Principal,
    final_score: u32,
    mode: GameMode,
    now_ns: u64,
) -> GameOverOutcome {
    let mut state = state_for_update(player, now_ns);

    if mode == GameMode::Normal {
        state.total_score = (state.total_score + final_score).min(MAX_SCORE);
    }

    let plays_exhausted = state.plays_today >= max_plays_for(player);
    let should_record_points = mode == GameMode::Normal
        && plays_exhausted
        && !state.points_recorded
        && state.total_score > 0;

    let new_total = state.total_score;
    put_state(player, state);

    GameOverOutcome {
        new_total,
        plays_exhausted,
        should_record_points,
    }
}

pub fn mark_points_recorded(player: Principal, now_ns: u64) {
    let mut state = state_for_update(player, now_ns);
    state.points_recorded = true;
    put_state(player, state);
}

/// Successful claim: accumulated score converts to tokens and zeroes out.
pub fn mark_rewards_claimed(player: Principal, now_ns: u64) {
    let mut state = state_for_update(player, now_ns);
    state.total_score = 0;
    state.rewards_claimed = true;
    put_state(player, state);
}

pub fn total_score(player: Principal, now_ns: u64) -> u32 {
    let stored = DAILY_STATE
        .with(|m| m.borrow().get(&player))
        .unwrap_or_default();
    // total_score is day-independent, but honor a projected reset anyway.
    if stored.day_start_ns == day_start(now_ns) {
        stored.total_score
    } else {
        rolled_over(&stored, now_ns).total_score
    }
}

pub fn points_recorded(player: Principal, now_ns: u64) -> bool {
    let stored = DAILY_STATE
        .with(|m| m.borrow().get(&player))
        .unwrap_or_default();
    stored.day_start_ns == day_start(now_ns) && stored.points_recorded
}

// =============================================================================
// PROFILES & HIGH SCORES
// =============================================================================

pub fn register_profile(player: Principal, username: String, now_ns: u64) -> Result<(), String> {
    let username = username.trim().to_string();
    if username.is_empty() {
        return Err("Username cannot be empty".to_string());
    }
    if username.len() > MAX_USERNAME_LEN {
        return Err(format!(
            "Username cannot exceed {} characters",
            MAX_USERNAME_LEN
        ));
    }

    PROFILES.with(|m| {
        m.borrow_mut().insert(
            player,
            PlayerProfile {
                username,
                registered_at_ns: now_ns,
            },
        )
    });
    Ok(())
}

/// Persist `score` as the player's high score when it beats the stored one.
/// Returns true on a new record.
pub fn record_high_score(player: Principal, score: u32) -> bool {
    HIGH_SCORES.with(|m| {
        let mut map = m.borrow_mut();
        let current = map.get(&player).unwrap_or(0);
        if score > current {
            map.insert(player, score);
            true
        } else {
            false
        }
    })
}

pub fn high_score(player: Principal) -> u32 {
    HIGH_SCORES.with(|m| m.borrow().get(&player).unwrap_or(0))
}

// =============================================================================
// VIEWS
// =============================================================================

/// Read-only projection of the player's daily state; applies the day rollover
/// without persisting it.
pub fn view(player: Principal, now_ns: u64) -> DailyStateView {
    let stored = DAILY_STATE
        .with(|m| m.borrow().get(&player))
        .unwrap_or_default();
    let effective = if stored.day_start_ns == day_start(now_ns) {
        stored
    } else {
        rolled_over(&stored, now_ns)
    };

    let max_plays = max_plays_for(player);
    DailyStateView {
        plays_today: effective.plays_today,
        max_plays,
        total_score: effective.total_score,
        points_recorded: effective.points_recorded,
        rewards_claimed: effective.rewards_claimed,
        can_play: effective.plays_today < max_plays,
        is_vip: is_vip(player),
        high_score: high_score(player),
    }
}
