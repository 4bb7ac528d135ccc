//! Game loop: per-player snake sessions advanced by a cancellable,
//! re-armed single-shot timer.
//!
//! Each tick is scheduled at the session's current speed, so the interval
//! shrinks as the snake eats. The timer is registered per player and cleared
//! on game over, restart, and abandonment; at most one tick per player is
//! ever armed.

use crate::types::{
    Cell, Direction, GameMode, GameSession, GameView, BASE_FOOD_POINTS, MAX_SCORE, MAX_SCORE_RATE,
    MAX_SPEED_MS, SCORE_RATE_STEP, SPEED_DECAY, START_CELL,
};
use crate::{grid, rewards, seed, session, stats};
use candid::Principal;
use ic_cdk_timers::TimerId;
use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};
use std::time::Duration;

thread_local! {
    static SESSIONS: RefCell<HashMap<Principal, GameSession>> = RefCell::new(HashMap::new());
    static TICK_TIMERS: RefCell<HashMap<Principal, TimerId>> = RefCell::new(HashMap::new());
}

#[derive(Debug, PartialEq, Eq)]
pub enum TickOutcome {
    Moved,
    Ate,
    GameOver,
}

// =============================================================================
// COMMANDS
// =============================================================================

pub fn start_game(caller: Principal, mode: GameMode, now_ns: u64) -> Result<GameView, String> {
    let running = SESSIONS.with(|s| s.borrow().get(&caller).map(|g| !g.is_over).unwrap_or(false));
    if running {
        return Err("Game already in progress".to_string());
    }

    if mode == GameMode::Normal && !session::can_play(caller, now_ns) {
        return Err("No plays left today".to_string());
    }

    let (material, nonce) = seed::next_material()?;

    // Consume the play before anything is armed; a trap after this point
    // costs the play rather than handing out a free one.
    if mode == GameMode::Normal {
        session::increment_play(caller, now_ns)?;
    }

    let mut snake = VecDeque::new();
    snake.push_back(START_CELL);
    let food = grid::spawn_food(&snake, &material, nonce)
        .expect("a one-cell snake cannot fill the grid");

    let game = GameSession::new(mode, food, now_ns);
    let view = GameView::from(&game);

    cancel_tick(caller);
    SESSIONS.with(|s| s.borrow_mut().insert(caller, game));
    schedule_tick(caller, view.speed_ms);

    ic_cdk::println!("Game started for {} (mode {:?})", caller, mode);
    Ok(view)
}

/// Steer the snake. Reversals of the current heading are ignored; between two
/// ticks only the latest accepted change survives.
pub fn change_direction(caller: Principal, direction: Direction) -> Result<(), String> {
    SESSIONS.with(|s| {
        let mut sessions = s.borrow_mut();
        let game = sessions
            .get_mut(&caller)
            .filter(|g| !g.is_over)
            .ok_or_else(|| "No active game".to_string())?;
        apply_direction(game, direction);
        Ok(())
    })
}

/// Teardown without a collision: the timer is cleared and the session
/// dropped. The consumed play is not refunded.
pub fn abandon_game(caller: Principal) -> Result<(), String> {
    cancel_tick(caller);
    let existed = SESSIONS.with(|s| s.borrow_mut().remove(&caller).is_some());
    if existed {
        Ok(())
    } else {
        Err("No active game".to_string())
    }
}

pub fn current_game(caller: Principal) -> Option<GameView> {
    SESSIONS.with(|s| s.borrow().get(&caller).map(GameView::from))
}

// =============================================================================
// TICK SCHEDULING
// =============================================================================

fn schedule_tick(player: Principal, delay_ms: u64) {
    let timer_id = ic_cdk_timers::set_timer(Duration::from_millis(delay_ms), move || tick(player));
    TICK_TIMERS.with(|t| t.borrow_mut().insert(player, timer_id));
}

fn cancel_tick(player: Principal) {
    TICK_TIMERS.with(|t| {
        if let Some(id) = t.borrow_mut().remove(&player) {
            ic_cdk_timers::clear_timer(id);
        }
    });
}

fn tick(player: Principal) {
    // This tick's registration is spent either way.
    TICK_TIMERS.with(|t| t.borrow_mut().remove(&player));

    let Some(mut game) = SESSIONS.with(|s| s.borrow().get(&player).cloned()) else {
        return;
    };
    if game.is_over {
        return;
    }

    let (material, nonce) = match seed::next_material() {
        Ok(m) => m,
        Err(_) => {
            // Seed mid-rotation: hold position for one interval.
            schedule_tick(player, game.speed_ms as u64);
            return;
        }
    };

    let outcome = advance_session(&mut game, &material, nonce);
    match outcome {
        TickOutcome::GameOver => {
            game.is_over = true;
            let final_view = GameView::from(&game);
            SESSIONS.with(|s| s.borrow_mut().insert(player, game));
            handle_game_over(player, &final_view);
        }
        TickOutcome::Moved | TickOutcome::Ate => {
            let delay = game.speed_ms as u64;
            SESSIONS.with(|s| s.borrow_mut().insert(player, game));
            schedule_tick(player, delay);
        }
    }
}

fn handle_game_over(player: Principal, game: &GameView) {
    let now = ic_cdk::api::time();

    if session::record_high_score(player, game.score) {
        ic_cdk::println!("New high score {} for {}", game.score, player);
    }
    stats::record_game(game.mode, game.score, now);

    let outcome = session::on_game_over(player, game.score, game.mode, now);
    ic_cdk::println!(
        "Game over for {}: score {}, accumulated {}",
        player,
        game.score,
        outcome.new_total
    );

    if outcome.should_record_points && rewards::is_configured() {
        ic_cdk::spawn(rewards::bridge::record_accumulated(player));
    }
}

// =============================================================================
// CORE ADVANCE (pure over its inputs)
// =============================================================================

pub fn apply_direction(game: &mut GameSession, direction: Direction) {
    if direction != game.direction.reverse() {
        game.direction = direction;
    }
}

/// Advance the session by one tick. Seed material feeds food respawning; the
/// caller owns rescheduling and game-over side effects.
pub fn advance_session(game: &mut GameSession, material: &[u8; 32], nonce: u64) -> TickOutcome {
    let next = match grid::step(game.head(), game.direction) {
        Some(cell) => cell,
        None => return TickOutcome::GameOver,
    };

    // The tail cell counts as occupied: moving onto it is a collision, same
    // as hitting any other segment.
    if grid::occupies(&game.snake, next) {
        return TickOutcome::GameOver;
    }

    game.snake.push_front(next);

    if game.food == Some(next) {
        // The rate bumps first; the swallowed food already pays at the new
        // rate.
        game.score_rate = (game.score_rate + SCORE_RATE_STEP).min(MAX_SCORE_RATE);
        let gained = (BASE_FOOD_POINTS * game.score_rate).ceil() as u32;
        game.score = (game.score + gained).min(MAX_SCORE);
        game.speed_ms = (game.speed_ms * SPEED_DECAY).max(MAX_SPEED_MS);

        match grid::spawn_food(&game.snake, material, nonce) {
            Some(food) => {
                game.food = Some(food);
                TickOutcome::Ate
            }
            None => {
                // Snake fills the grid; nothing left to eat.
                game.food = None;
                TickOutcome::GameOver
            }
        }
    } else {
        game.snake.pop_back();
        TickOutcome::Moved
    }
}
