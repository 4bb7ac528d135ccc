//! Reward bridge: synchronizes locally accumulated score with the external
//! reward contract and owns the claim lifecycle.
//!
//! Two call flows:
//! - `record_points`: one shot. A failure still marks points as recorded
//!   locally, so play never blocks on the contract, and parks the amount for
//!   manual reconciliation.
//! - `claim_tokens`: first attempt inline; transient rejections are retried
//!   from single-shot timers over a pending-claim record, with bounded
//!   exponential backoff. Local state mutates only on success.

use super::backoff::CLAIM_RETRY_POLICY;
use super::guard::OperationGuard;
use super::notices;
use super::query;
use super::types::{CallOutcome, ClaimStart, ClaimStatus, PendingClaim, PendingPoints};
use crate::memory_ids::{
    BRIDGE_CONFIG_MEMORY_ID, PENDING_CLAIMS_MEMORY_ID, PENDING_POINTS_MEMORY_ID,
};
use crate::types::BridgeConfig;
use crate::{session, stats, Memory, MEMORY_MANAGER};
use candid::{CandidType, Nat, Principal};
use ic_cdk::api::call::RejectionCode;
use ic_stable_structures::memory_manager::MemoryId;
use ic_stable_structures::storable::Bound;
use ic_stable_structures::{StableBTreeMap, StableCell, Storable};
use serde::Deserialize;
use std::borrow::Cow;
use std::cell::RefCell;
use std::collections::HashMap;
use std::time::Duration;

/// Stable wrapper for the optional contract binding. Candid-encoded because
/// it carries principals.
#[derive(CandidType, Deserialize, Clone, Debug, Default)]
struct BridgeBinding {
    config: Option<BridgeConfig>,
}

impl Storable for BridgeBinding {
    fn to_bytes(&self) -> Cow<[u8]> {
        Cow::Owned(candid::encode_one(self).expect("BridgeBinding encoding cannot fail"))
    }

    fn from_bytes(bytes: Cow<[u8]>) -> Self {
        candid::decode_one(&bytes).unwrap_or_default()
    }

    const BOUND: Bound = Bound::Bounded {
        max_size: 512,
        is_fixed_size: false,
    };
}

thread_local! {
    static CONFIG_CELL: RefCell<StableCell<BridgeBinding, Memory>> = RefCell::new(
        StableCell::init(
            MEMORY_MANAGER.with(|m| m.borrow().get(MemoryId::new(BRIDGE_CONFIG_MEMORY_ID))),
            BridgeBinding::default(),
        )
        .expect("Failed to init bridge config cell")
    );

    static PENDING_POINTS: RefCell<StableBTreeMap<Principal, PendingPoints, Memory>> = RefCell::new(
        StableBTreeMap::init(
            MEMORY_MANAGER.with(|m| m.borrow().get(MemoryId::new(PENDING_POINTS_MEMORY_ID))),
        )
    );

    static PENDING_CLAIMS: RefCell<StableBTreeMap<Principal, PendingClaim, Memory>> = RefCell::new(
        StableBTreeMap::init(
            MEMORY_MANAGER.with(|m| m.borrow().get(MemoryId::new(PENDING_CLAIMS_MEMORY_ID))),
        )
    );

    /// Terminal failure of the most recent claim, per caller. Volatile: a
    /// fresh claim attempt clears it.
    static LAST_CLAIM_FAILURE: RefCell<HashMap<Principal, String>> = RefCell::new(HashMap::new());
}

// =============================================================================
// CONFIGURATION
// =============================================================================

/// Install the external contract binding. Called from init/post_upgrade with
/// the installer-provided argument; the bridge itself never hardcodes a
/// contract principal.
pub fn configure(config: Option<BridgeConfig>) {
    match &config {
        Some(c) => ic_cdk::println!(
            "Reward bridge configured: reward={} token={}",
            c.reward_contract,
            c.token_contract
        ),
        None => ic_cdk::println!("Reward bridge left unconfigured"),
    }
    CONFIG_CELL.with(|cell| {
        cell.borrow_mut()
            .set(BridgeBinding { config })
            .expect("Failed to persist bridge config");
    });
}

pub fn is_configured() -> bool {
    CONFIG_CELL.with(|cell| cell.borrow().get().config.is_some())
}

pub(crate) fn config() -> Result<BridgeConfig, String> {
    CONFIG_CELL.with(|cell| {
        cell.borrow()
            .get()
            .config
            .clone()
            .ok_or_else(|| "Reward bridge not configured".to_string())
    })
}

// =============================================================================
// CALL CLASSIFICATION
// =============================================================================

/// Transient rejections (the platform's rate-limit signal) may be retried;
/// everything else is definite.
fn classify(result: Result<(Result<Nat, String>,), (RejectionCode, String)>) -> CallOutcome {
    match result {
        Ok((Ok(receipt),)) => CallOutcome::Success(receipt),
        Ok((Err(contract_error),)) => CallOutcome::Rejected(contract_error),
        Err((code, msg)) => match code {
            RejectionCode::SysTransient | RejectionCode::Unknown => {
                CallOutcome::Transient(format!("{:?}: {}", code, msg))
            }
            _ => CallOutcome::Rejected(format!("{:?}: {}", code, msg)),
        },
    }
}

async fn attempt_record(contract: Principal, points: Nat) -> CallOutcome {
    classify(ic_cdk::call(contract, "record_points", (points,)).await)
}

async fn attempt_claim(contract: Principal) -> CallOutcome {
    classify(ic_cdk::call(contract, "claim_tokens", ()).await)
}

/// Static user-facing messages for the known permanent failures.
fn rejection_message(raw: &str) -> String {
    let lower = raw.to_lowercase();
    if lower.contains("insufficient funds") {
        "Not enough funds to pay for the transaction".to_string()
    } else if lower.contains("rejected") {
        "Transaction rejected".to_string()
    } else {
        "Claim failed. Please try again later".to_string()
    }
}

// =============================================================================
// POINT RECORDING
// =============================================================================

/// Push `points` to the reward contract for `caller`. Returns whether the
/// contract actually accepted them; either way the local state shows points
/// as recorded afterwards.
pub async fn record_points(caller: Principal, points: u32) -> Result<bool, String> {
    let _guard = OperationGuard::new(caller)?;
    if points == 0 {
        return Err("No points to record".to_string());
    }
    let config = config()?;

    match attempt_record(config.reward_contract, Nat::from(points)).await {
        CallOutcome::Success(receipt) => {
            let now = ic_cdk::api::time();
            session::mark_points_recorded(caller, now);
            stats::record_points_recorded(points, now);
            PENDING_POINTS.with(|m| m.borrow_mut().remove(&caller));
            notices::add(format!("Recorded {} game points", points), now);
            ic_cdk::println!(
                "Recorded {} points for {} (receipt {})",
                points,
                caller,
                receipt
            );
            Ok(true)
        }
        CallOutcome::Rejected(err) | CallOutcome::Transient(err) => {
            // Availability over consistency: never leave the player stuck
            // behind a failed recording. Park the amount so the books can be
            // reconciled manually.
            let now = ic_cdk::api::time();
            session::mark_points_recorded(caller, now);
            PENDING_POINTS.with(|m| {
                m.borrow_mut().insert(
                    caller,
                    PendingPoints {
                        amount: points,
                        failed_at_ns: now,
                        last_error: err.clone(),
                    },
                )
            });
            ic_cdk::println!(
                "record_points failed for {} ({}); {} points parked for reconciliation",
                caller,
                err,
                points
            );
            Ok(false)
        }
    }
}

/// Game-over trigger: record the caller's accumulated total. Spawned from the
/// tick callback, so failures only ever end up in the log and the pending map.
pub async fn record_accumulated(caller: Principal) {
    let total = session::total_score(caller, ic_cdk::api::time());
    if let Err(e) = record_points(caller, total).await {
        ic_cdk::println!("record_accumulated skipped for {}: {}", caller, e);
    }
}

/// Explicit retrigger for players whose game-over recording never ran (e.g.
/// the bridge was unconfigured at the time). Same preconditions as the
/// automatic path.
pub async fn record_points_manual(caller: Principal) -> Result<bool, String> {
    let view = session::view(caller, ic_cdk::api::time());
    if view.points_recorded {
        return Err("Points already recorded today".to_string());
    }
    if view.can_play {
        return Err("Plays remaining today".to_string());
    }
    if view.total_score == 0 {
        return Err("No points to record".to_string());
    }
    record_points(caller, view.total_score).await
}

// =============================================================================
// CLAIMING
// =============================================================================

pub async fn claim_tokens(caller: Principal) -> Result<ClaimStart, String> {
    let _guard = OperationGuard::new(caller)?;
    let config = config()?;

    if PENDING_CLAIMS.with(|m| m.borrow().contains_key(&caller)) {
        return Err("Claim already in progress".to_string());
    }

    // Eligibility pre-check with the cooldown countdown baked into the error.
    if query::has_claimed_tokens(caller).await? {
        let cooldown = query::claim_cooldown(caller).await?;
        if cooldown.total_seconds > 0 {
            return Err(format!(
                "Tokens already claimed. Try again in {}h {}m",
                cooldown.hours, cooldown.minutes
            ));
        }
        return Err("No claimable points".to_string());
    }

    LAST_CLAIM_FAILURE.with(|m| m.borrow_mut().remove(&caller));

    match attempt_claim(config.reward_contract).await {
        CallOutcome::Success(receipt) => {
            finalize_claim_success(caller, receipt);
            Ok(ClaimStart::Completed)
        }
        CallOutcome::Rejected(err) => {
            let message = rejection_message(&err);
            ic_cdk::println!("claim_tokens rejected for {}: {}", caller, err);
            LAST_CLAIM_FAILURE.with(|m| m.borrow_mut().insert(caller, message.clone()));
            Err(message)
        }
        CallOutcome::Transient(err) => {
            let now = ic_cdk::api::time();
            PENDING_CLAIMS.with(|m| {
                m.borrow_mut().insert(
                    caller,
                    PendingClaim {
                        attempts: 1,
                        created_at_ns: now,
                        last_error: Some(err.clone()),
                    },
                )
            });
            let delay_ms = CLAIM_RETRY_POLICY
                .delay_after_ms(1)
                .expect("first attempt is within the retry budget");
            schedule_claim_retry(caller, delay_ms);
            ic_cdk::println!(
                "claim_tokens transient failure for {} ({}); retrying in {} ms",
                caller,
                err,
                delay_ms
            );
            Ok(ClaimStart::Scheduled {
                attempt: 1,
                next_retry_ms: delay_ms,
            })
        }
    }
}

fn schedule_claim_retry(caller: Principal, delay_ms: u64) {
    ic_cdk_timers::set_timer(Duration::from_millis(delay_ms), move || {
        ic_cdk::spawn(retry_claim(caller));
    });
}

async fn retry_claim(caller: Principal) {
    let Some(pending) = PENDING_CLAIMS.with(|m| m.borrow().get(&caller)) else {
        return;
    };
    let config = match config() {
        Ok(c) => c,
        Err(e) => {
            PENDING_CLAIMS.with(|m| m.borrow_mut().remove(&caller));
            LAST_CLAIM_FAILURE.with(|m| m.borrow_mut().insert(caller, e));
            return;
        }
    };

    match attempt_claim(config.reward_contract).await {
        CallOutcome::Success(receipt) => {
            PENDING_CLAIMS.with(|m| m.borrow_mut().remove(&caller));
            finalize_claim_success(caller, receipt);
        }
        CallOutcome::Rejected(err) => {
            PENDING_CLAIMS.with(|m| m.borrow_mut().remove(&caller));
            let message = rejection_message(&err);
            ic_cdk::println!("claim retry rejected for {}: {}", caller, err);
            LAST_CLAIM_FAILURE.with(|m| m.borrow_mut().insert(caller, message));
        }
        CallOutcome::Transient(err) => {
            let attempts = pending.attempts + 1;
            match CLAIM_RETRY_POLICY.delay_after_ms(attempts) {
                Some(delay_ms) => {
                    PENDING_CLAIMS.with(|m| {
                        m.borrow_mut().insert(
                            caller,
                            PendingClaim {
                                attempts,
                                last_error: Some(err.clone()),
                                ..pending
                            },
                        )
                    });
                    schedule_claim_retry(caller, delay_ms);
                    ic_cdk::println!(
                        "claim attempt {} transient for {} ({}); retrying in {} ms",
                        attempts,
                        caller,
                        err,
                        delay_ms
                    );
                }
                None => {
                    PENDING_CLAIMS.with(|m| m.borrow_mut().remove(&caller));
                    ic_cdk::println!(
                        "claim gave up for {} after {} attempts ({})",
                        caller,
                        attempts,
                        err
                    );
                    LAST_CLAIM_FAILURE.with(|m| {
                        m.borrow_mut()
                            .insert(caller, "Claim failed. Please try again later".to_string())
                    });
                }
            }
        }
    }
}

fn finalize_claim_success(caller: Principal, receipt: Nat) {
    let now = ic_cdk::api::time();
    session::mark_rewards_claimed(caller, now);
    stats::record_claim(now);
    notices::add("Claimed reward tokens".to_string(), now);
    ic_cdk::println!("Claim completed for {} (receipt {})", caller, receipt);
}

pub fn claim_status(caller: Principal, now_ns: u64) -> ClaimStatus {
    if let Some(pending) = PENDING_CLAIMS.with(|m| m.borrow().get(&caller)) {
        return ClaimStatus::InFlight {
            attempt: pending.attempts,
        };
    }
    if let Some(reason) = LAST_CLAIM_FAILURE.with(|m| m.borrow().get(&caller).cloned()) {
        return ClaimStatus::Failed { reason };
    }
    if session::view(caller, now_ns).rewards_claimed {
        return ClaimStatus::Claimed;
    }
    ClaimStatus::Idle
}

// =============================================================================
// RECONCILIATION QUERIES
// =============================================================================

pub fn pending_points_of(account: Principal) -> Option<PendingPoints> {
    PENDING_POINTS.with(|m| m.borrow().get(&account))
}

pub fn all_pending_points() -> Vec<(Principal, PendingPoints)> {
    PENDING_POINTS.with(|m| m.borrow().iter().collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejection_messages_are_static() {
        assert_eq!(
            rejection_message("execution error: insufficient funds for gas"),
            "Not enough funds to pay for the transaction"
        );
        assert_eq!(
            rejection_message("call rejected by user"),
            "Transaction rejected"
        );
        assert_eq!(
            rejection_message("something exotic"),
            "Claim failed. Please try again later"
        );
    }

    #[test]
    fn test_classify_outcomes() {
        let ok = classify(Ok((Ok(Nat::from(5u64)),)));
        assert!(matches!(ok, CallOutcome::Success(_)));

        let contract_err = classify(Ok((Err("cooldown active".to_string()),)));
        assert!(matches!(contract_err, CallOutcome::Rejected(_)));

        let transient = classify(Err((RejectionCode::SysTransient, "busy".to_string())));
        assert!(matches!(transient, CallOutcome::Transient(_)));

        let fatal = classify(Err((RejectionCode::CanisterError, "trap".to_string())));
        assert!(matches!(fatal, CallOutcome::Rejected(_)));
    }
}
