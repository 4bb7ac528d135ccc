use candid::Principal;
use ic_cdk::{init, post_upgrade, pre_upgrade, query, update};
use ic_stable_structures::memory_manager::{MemoryManager, VirtualMemory};
use ic_stable_structures::DefaultMemoryImpl;
use std::cell::RefCell;

pub mod game;
pub mod grid;
pub mod memory_ids;
pub mod rewards;
pub mod seed;
pub mod session;
pub mod stats;
pub mod types;

#[cfg(test)]
mod tests;

pub use types::{
    Cell, DailyStateView, Direction, GameMode, GameView, InitArgs, PlayerDailyState,
};

// =============================================================================
// MEMORY MANAGEMENT
// =============================================================================

pub type Memory = VirtualMemory<DefaultMemoryImpl>;

thread_local! {
    pub static MEMORY_MANAGER: RefCell<MemoryManager<DefaultMemoryImpl>> =
        RefCell::new(MemoryManager::init(DefaultMemoryImpl::default()));
}

// =============================================================================
// LIFECYCLE
// =============================================================================

#[init]
fn init(args: Option<InitArgs>) {
    ic_cdk::println!("Snake Backend Initialized");
    rewards::bridge::configure(args.and_then(|a| a.bridge));
    seed::schedule_initialization();
    stats::start_stats_timer();
}

#[pre_upgrade]
fn pre_upgrade() {
    // Stable structures persist automatically. Running games are volatile
    // and are forfeited by an upgrade.
}

#[post_upgrade]
fn post_upgrade(args: Option<InitArgs>) {
    if let Some(a) = args {
        rewards::bridge::configure(a.bridge);
    }
    seed::restore_state();
    seed::schedule_initialization();
    stats::start_stats_timer();
    ic_cdk::println!("Post-upgrade: timers restarted, active games discarded");
}

// === GAME ENDPOINTS ===

#[update]
fn start_game(mode: GameMode) -> Result<GameView, String> {
    game::start_game(ic_cdk::caller(), mode, ic_cdk::api::time())
}

#[update]
fn change_direction(direction: Direction) -> Result<(), String> {
    game::change_direction(ic_cdk::caller(), direction)
}

#[update]
fn abandon_game() -> Result<(), String> {
    game::abandon_game(ic_cdk::caller())
}

#[query]
fn get_my_game() -> Option<GameView> {
    game::current_game(ic_cdk::caller())
}

// === SESSION ENDPOINTS ===

#[update]
fn register_profile(username: String) -> Result<(), String> {
    session::register_profile(ic_cdk::caller(), username, ic_cdk::api::time())
}

#[query]
fn get_my_daily_state() -> DailyStateView {
    session::view(ic_cdk::caller(), ic_cdk::api::time())
}

#[query]
fn get_daily_state(player: Principal) -> DailyStateView {
    session::view(player, ic_cdk::api::time())
}

#[query]
fn get_my_high_score() -> u32 {
    session::high_score(ic_cdk::caller())
}

#[query]
fn can_play() -> bool {
    session::can_play(ic_cdk::caller(), ic_cdk::api::time())
}

// === REWARD ENDPOINTS ===

#[update]
async fn record_points() -> Result<bool, String> {
    rewards::bridge::record_points_manual(ic_cdk::caller()).await
}

#[update]
async fn claim_tokens() -> Result<rewards::ClaimStart, String> {
    rewards::bridge::claim_tokens(ic_cdk::caller()).await
}

#[query]
fn get_claim_status() -> rewards::ClaimStatus {
    rewards::claim_status(ic_cdk::caller(), ic_cdk::api::time())
}

#[update]
async fn get_player_points() -> Result<u64, String> {
    rewards::query::player_points(ic_cdk::caller()).await
}

#[update]
async fn get_time_until_next_claim() -> Result<rewards::ClaimCooldown, String> {
    rewards::query::claim_cooldown(ic_cdk::caller()).await
}

#[update]
async fn has_claimed_tokens() -> Result<bool, String> {
    rewards::query::has_claimed_tokens(ic_cdk::caller()).await
}

#[update]
async fn get_token_balance() -> Result<rewards::TokenBalance, String> {
    rewards::query::token_balance(ic_cdk::caller()).await
}

#[query]
fn get_transaction_notices() -> Vec<rewards::TxNotice> {
    rewards::notices::list(ic_cdk::api::time())
}

#[update]
fn dismiss_transaction_notice(id: u64) -> bool {
    rewards::notices::dismiss(id)
}

// === STATISTICS & RECONCILIATION ===

#[query]
fn get_game_stats() -> stats::GameStats {
    stats::get_stats()
}

#[query]
fn get_daily_stats(limit: u32) -> Vec<stats::DailySnapshot> {
    stats::get_daily_snapshots(limit)
}

#[query]
fn get_stats_count() -> u64 {
    stats::snapshot_count()
}

#[query]
fn admin_get_pending_points(account: Principal) -> Option<rewards::PendingPoints> {
    rewards::bridge::pending_points_of(account)
}

#[query]
fn admin_get_all_pending_points() -> Vec<(Principal, rewards::PendingPoints)> {
    rewards::bridge::all_pending_points()
}

#[query]
fn greet(name: String) -> String {
    format!("Welcome to Snake, {}! Eat, grow, claim.", name)
}

ic_cdk::export_candid!();
