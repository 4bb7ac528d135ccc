//! Game statistics: lifetime counters plus per-day snapshots.
//!
//! Counters accumulate into the current day's bucket; the first event of a
//! new day snapshots the finished bucket. A daily backup timer closes out
//! quiet days with no events.

use crate::memory_ids::{
    DAILY_ACCUMULATOR_MEMORY_ID, DAILY_SNAPSHOTS_MEMORY_ID, GAME_STATS_MEMORY_ID,
};
use crate::session::day_start;
use crate::types::GameMode;
use crate::{Memory, MEMORY_MANAGER};
use candid::CandidType;
use ic_stable_structures::memory_manager::MemoryId;
use ic_stable_structures::storable::Bound;
use ic_stable_structures::{StableCell, StableVec, Storable};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::cell::RefCell;
use std::time::Duration;

#[derive(CandidType, Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct GameStats {
    pub total_games: u64,
    pub normal_games: u64,
    pub practice_games: u64,
    pub best_score: u32,
    pub points_recorded_total: u64,
    pub claims_completed: u64,
}

impl Storable for GameStats {
    fn to_bytes(&self) -> Cow<[u8]> {
        Cow::Owned(serde_json::to_vec(self).expect("GameStats serialization cannot fail"))
    }

    fn from_bytes(bytes: Cow<[u8]>) -> Self {
        serde_json::from_slice(&bytes).unwrap_or_default()
    }

    const BOUND: Bound = Bound::Bounded {
        max_size: 256,
        is_fixed_size: false,
    };
}

#[derive(CandidType, Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct DailySnapshot {
    pub day_start_ns: u64,
    pub games: u64,
    pub normal_games: u64,
    pub points_recorded: u64,
    pub claims: u64,
    pub best_score: u32,
}

impl Storable for DailySnapshot {
    fn to_bytes(&self) -> Cow<[u8]> {
        Cow::Owned(serde_json::to_vec(self).expect("DailySnapshot serialization cannot fail"))
    }

    fn from_bytes(bytes: Cow<[u8]>) -> Self {
        serde_json::from_slice(&bytes).unwrap_or_default()
    }

    const BOUND: Bound = Bound::Bounded {
        max_size: 256,
        is_fixed_size: false,
    };
}

thread_local! {
    static LIFETIME: RefCell<StableCell<GameStats, Memory>> = RefCell::new(
        StableCell::init(
            MEMORY_MANAGER.with(|m| m.borrow().get(MemoryId::new(GAME_STATS_MEMORY_ID))),
            GameStats::default(),
        )
        .expect("Failed to init game stats cell")
    );

    static SNAPSHOTS: RefCell<StableVec<DailySnapshot, Memory>> = RefCell::new(
        StableVec::init(
            MEMORY_MANAGER.with(|m| m.borrow().get(MemoryId::new(DAILY_SNAPSHOTS_MEMORY_ID))),
        )
        .expect("Failed to init daily snapshots")
    );

    static ACCUMULATOR: RefCell<StableCell<DailySnapshot, Memory>> = RefCell::new(
        StableCell::init(
            MEMORY_MANAGER.with(|m| m.borrow().get(MemoryId::new(DAILY_ACCUMULATOR_MEMORY_ID))),
            DailySnapshot::default(),
        )
        .expect("Failed to init daily accumulator")
    );
}

fn with_lifetime(f: impl FnOnce(&mut GameStats)) {
    LIFETIME.with(|cell| {
        let mut stats = cell.borrow().get().clone();
        f(&mut stats);
        cell.borrow_mut()
            .set(stats)
            .expect("Failed to persist game stats");
    });
}

/// Snapshot `acc` unless one for the same day already exists (events racing
/// the backup timer at the boundary would otherwise duplicate it).
fn snapshot_if_new(acc: &DailySnapshot) {
    let duplicate = SNAPSHOTS.with(|v| {
        let v = v.borrow();
        let len = v.len();
        len > 0
            && v.get(len - 1)
                .map(|last| last.day_start_ns == acc.day_start_ns)
                .unwrap_or(false)
    });
    if duplicate {
        ic_cdk::println!(
            "Snapshot for day {} already taken, skipping duplicate",
            acc.day_start_ns
        );
        return;
    }

    SNAPSHOTS.with(|v| {
        if v.borrow_mut().push(acc).is_err() {
            ic_cdk::println!("Failed to append daily snapshot for day {}", acc.day_start_ns);
        }
    });
}

fn with_today(now_ns: u64, f: impl FnOnce(&mut DailySnapshot)) {
    let today = day_start(now_ns);
    ACCUMULATOR.with(|cell| {
        let current = cell.borrow().get().clone();

        let mut acc = if current.day_start_ns == today {
            current
        } else {
            if current.day_start_ns > 0 {
                snapshot_if_new(&current);
            }
            DailySnapshot {
                day_start_ns: today,
                ..DailySnapshot::default()
            }
        };

        f(&mut acc);
        cell.borrow_mut()
            .set(acc)
            .expect("Failed to persist daily accumulator");
    });
}

// =============================================================================
// RECORDERS
// =============================================================================

pub fn record_game(mode: GameMode, score: u32, now_ns: u64) {
    with_lifetime(|s| {
        s.total_games += 1;
        match mode {
            GameMode::Normal => s.normal_games += 1,
            GameMode::Practice => s.practice_games += 1,
        }
        s.best_score = s.best_score.max(score);
    });
    with_today(now_ns, |d| {
        d.games += 1;
        if mode == GameMode::Normal {
            d.normal_games += 1;
        }
        d.best_score = d.best_score.max(score);
    });
}

pub fn record_points_recorded(points: u32, now_ns: u64) {
    with_lifetime(|s| s.points_recorded_total += points as u64);
    with_today(now_ns, |d| d.points_recorded += points as u64);
}

pub fn record_claim(now_ns: u64) {
    with_lifetime(|s| s.claims_completed += 1);
    with_today(now_ns, |d| d.claims += 1);
}

/// Close out a finished day with no events (backup timer path).
pub fn take_daily_snapshot(now_ns: u64) {
    ACCUMULATOR.with(|cell| {
        let current = cell.borrow().get().clone();
        if current.day_start_ns == 0 || current.day_start_ns == day_start(now_ns) {
            return;
        }
        snapshot_if_new(&current);
        cell.borrow_mut()
            .set(DailySnapshot {
                day_start_ns: day_start(now_ns),
                ..DailySnapshot::default()
            })
            .expect("Failed to persist daily accumulator");
    });
}

pub fn start_stats_timer() {
    ic_cdk_timers::set_timer_interval(Duration::from_secs(86_400), || {
        take_daily_snapshot(ic_cdk::api::time());
    });
}

// =============================================================================
// QUERIES
// =============================================================================

pub fn get_stats() -> GameStats {
    LIFETIME.with(|cell| cell.borrow().get().clone())
}

/// Most recent `limit` closed-out days, newest first.
pub fn get_daily_snapshots(limit: u32) -> Vec<DailySnapshot> {
    SNAPSHOTS.with(|v| {
        let v = v.borrow();
        let len = v.len();
        let take = (limit as u64).min(len);
        (0..take).filter_map(|i| v.get(len - 1 - i)).collect()
    })
}

pub fn snapshot_count() -> u64 {
    SNAPSHOTS.with(|v| v.borrow().len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::NANOS_PER_DAY;

    const DAY1: u64 = 100 * NANOS_PER_DAY + 1;
    const DAY2: u64 = 101 * NANOS_PER_DAY + 1;
    const DAY3: u64 = 102 * NANOS_PER_DAY + 1;

    #[test]
    fn test_lifetime_counters() {
        record_game(GameMode::Normal, 150, DAY1);
        record_game(GameMode::Practice, 400, DAY1);
        record_points_recorded(150, DAY1);
        record_claim(DAY1);

        let s = get_stats();
        assert_eq!(s.total_games, 2);
        assert_eq!(s.normal_games, 1);
        assert_eq!(s.practice_games, 1);
        assert_eq!(s.best_score, 400);
        assert_eq!(s.points_recorded_total, 150);
        assert_eq!(s.claims_completed, 1);
    }

    #[test]
    fn test_day_rollover_snapshots_previous_day() {
        record_game(GameMode::Normal, 100, DAY1);
        record_game(GameMode::Normal, 200, DAY1);
        assert_eq!(snapshot_count(), 0);

        // First event of day 2 closes day 1.
        record_game(GameMode::Practice, 50, DAY2);
        assert_eq!(snapshot_count(), 1);

        let snaps = get_daily_snapshots(10);
        assert_eq!(snaps[0].day_start_ns, day_start(DAY1));
        assert_eq!(snaps[0].games, 2);
        assert_eq!(snaps[0].normal_games, 2);
        assert_eq!(snaps[0].best_score, 200);
    }

    #[test]
    fn test_backup_snapshot_and_duplicate_guard() {
        record_game(GameMode::Normal, 10, DAY1);
        take_daily_snapshot(DAY2);
        assert_eq!(snapshot_count(), 1);

        // Second close-out of the same day must not duplicate.
        take_daily_snapshot(DAY3);
        assert_eq!(snapshot_count(), 1);
    }

    #[test]
    fn test_snapshots_newest_first_and_limited() {
        record_game(GameMode::Normal, 1, DAY1);
        record_game(GameMode::Normal, 2, DAY2);
        record_game(GameMode::Normal, 3, DAY3);
        assert_eq!(snapshot_count(), 2);

        let snaps = get_daily_snapshots(1);
        assert_eq!(snaps.len(), 1);
        assert_eq!(snaps[0].day_start_ns, day_start(DAY2));
    }
}
