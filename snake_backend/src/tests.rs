//! Whole-loop tests: the game state machine driven together with the daily
//! session tracker, with no canister runtime underneath. Time and identity
//! are passed in explicitly.

use crate::game::{advance_session, TickOutcome};
use crate::session;
use crate::types::*;
use crate::{game, grid};
use candid::Principal;
use std::collections::{HashSet, VecDeque};

const MATERIAL: [u8; 32] = [11u8; 32];
const DAY1: u64 = 20_000 * NANOS_PER_DAY + 7_000_000_000;
const DAY2: u64 = 20_001 * NANOS_PER_DAY + 7_000_000_000;

fn player(n: u8) -> Principal {
    Principal::from_slice(&[n, 42])
}

fn assert_snake_valid(snake: &VecDeque<Cell>) {
    let unique: HashSet<_> = snake.iter().collect();
    assert_eq!(unique.len(), snake.len(), "snake has duplicate cells");

    for cell in snake {
        assert!(cell.x < GRID_SIZE && cell.y < GRID_SIZE, "cell off grid");
    }

    for pair in snake.iter().collect::<Vec<_>>().windows(2) {
        let dx = (pair[0].x as i16 - pair[1].x as i16).abs();
        let dy = (pair[0].y as i16 - pair[1].y as i16).abs();
        assert_eq!(dx + dy, 1, "consecutive cells not adjacent");
    }
}

#[test]
fn test_walk_to_the_wall_preserves_invariants() {
    let mut g = GameSession::new(GameMode::Practice, Cell::new(0, 0), 0);
    g.food = None;

    // From (10,10) heading Right: nine clean moves, then the wall.
    for tick in 0..9u64 {
        let outcome = advance_session(&mut g, &MATERIAL, tick);
        assert_eq!(outcome, TickOutcome::Moved);
        assert_eq!(g.snake.len(), 1);
        assert_snake_valid(&g.snake);
    }
    assert_eq!(g.head(), Cell::new(19, 10));
    assert_eq!(advance_session(&mut g, &MATERIAL, 99), TickOutcome::GameOver);
}

#[test]
fn test_meals_grow_by_exactly_one() {
    let mut g = GameSession::new(GameMode::Normal, Cell::new(11, 10), 0);

    for expected_len in 2..=6usize {
        g.food = grid::step(g.head(), g.direction);
        let outcome = advance_session(&mut g, &MATERIAL, expected_len as u64);
        assert_eq!(outcome, TickOutcome::Ate);
        assert_eq!(g.snake.len(), expected_len);
        assert_snake_valid(&g.snake);

        let food = g.food.expect("food respawned");
        assert!(!grid::occupies(&g.snake, food), "food spawned on snake");
    }
}

#[test]
fn test_meal_scores_follow_the_rate_ladder() {
    let mut g = GameSession::new(GameMode::Normal, Cell::new(11, 10), 0);

    // Rates 1.5, 2.0, 2.5 pay 15, 20, 25.
    let mut expected_total = 0u32;
    for (i, gain) in [15u32, 20, 25].iter().enumerate() {
        g.food = grid::step(g.head(), g.direction);
        advance_session(&mut g, &MATERIAL, i as u64);
        expected_total += gain;
        assert_eq!(g.score, expected_total);
    }
    assert_eq!(g.score_rate, 2.5);
}

#[test]
fn test_full_day_accumulates_and_triggers_recording_once() {
    let p = player(101);
    let scores = [220u32, 450, 500];

    for (i, &score) in scores.iter().enumerate() {
        assert!(session::can_play(p, DAY1));
        session::increment_play(p, DAY1).unwrap();
        session::record_high_score(p, score);
        let outcome = session::on_game_over(p, score, GameMode::Normal, DAY1);

        if i < 2 {
            assert!(!outcome.should_record_points, "triggered before last play");
        } else {
            assert!(outcome.plays_exhausted);
            assert!(outcome.should_record_points);
            // 220 + 450 + 500 caps at 1000.
            assert_eq!(outcome.new_total, MAX_SCORE);
        }
    }

    assert!(!session::can_play(p, DAY1));
    assert_eq!(session::high_score(p), 500);

    // Bridge succeeded: recorded, then claimed.
    session::mark_points_recorded(p, DAY1);
    let after_record = session::on_game_over(p, 0, GameMode::Normal, DAY1);
    assert!(!after_record.should_record_points, "re-triggered after recording");

    session::mark_rewards_claimed(p, DAY1);
    let v = session::view(p, DAY1);
    assert_eq!(v.total_score, 0);
    assert!(v.rewards_claimed);
}

#[test]
fn test_unclaimed_total_survives_into_the_next_day() {
    let p = player(102);
    session::increment_play(p, DAY1).unwrap();
    session::on_game_over(p, 340, GameMode::Normal, DAY1);
    session::record_high_score(p, 340);

    // Next day: plays are back, score and high score carried.
    assert!(session::can_play(p, DAY2));
    session::increment_play(p, DAY2).unwrap();
    let outcome = session::on_game_over(p, 100, GameMode::Normal, DAY2);
    assert_eq!(outcome.new_total, 440);
    assert_eq!(session::high_score(p), 340);
}

#[test]
fn test_exhausted_player_cannot_start_a_normal_game() {
    let p = player(103);
    for _ in 0..DEFAULT_MAX_PLAYS_PER_DAY {
        session::increment_play(p, DAY1).unwrap();
    }

    let before = session::view(p, DAY1);
    assert!(!before.can_play);

    let rejected = game::start_game(p, GameMode::Normal, DAY1);
    assert_eq!(rejected.unwrap_err(), "No plays left today");

    // No state was consumed by the rejected start.
    let after = session::view(p, DAY1);
    assert_eq!(after.plays_today, before.plays_today);

    // Practice mode is not limited: it fails later, on the uninitialized
    // randomness seed, never on the play gate.
    let practice = game::start_game(p, GameMode::Practice, DAY1);
    assert_ne!(practice.unwrap_err(), "No plays left today");
}

#[test]
fn test_practice_crash_changes_no_daily_counters() {
    let p = player(104);
    let mut g = GameSession::new(GameMode::Practice, Cell::new(0, 0), 0);
    g.snake = VecDeque::from([Cell::new(0, 0)]);
    g.direction = Direction::Left;
    g.food = None;

    assert_eq!(advance_session(&mut g, &MATERIAL, 0), TickOutcome::GameOver);
    session::record_high_score(p, g.score);
    let outcome = session::on_game_over(p, g.score, GameMode::Practice, DAY1);

    assert_eq!(outcome.new_total, 0);
    assert!(!outcome.should_record_points);
    let v = session::view(p, DAY1);
    assert_eq!(v.plays_today, 0);
    assert_eq!(v.total_score, 0);
}
