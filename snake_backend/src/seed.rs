//! Randomness seed lifecycle.
//!
//! Food placement happens inside synchronous tick callbacks, which cannot
//! await the management canister. A VRF seed is fetched up front, persisted,
//! and expanded per use with SHA-256 over a monotone nonce; it rotates after
//! a fixed age or usage count.

use crate::memory_ids::{SEED_ROTATION_MEMORY_ID, SEED_STATE_MEMORY_ID};
use crate::{Memory, MEMORY_MANAGER};
use ic_cdk::api::management_canister::main::raw_rand;
use ic_stable_structures::memory_manager::MemoryId;
use ic_stable_structures::storable::Bound;
use ic_stable_structures::{StableCell, Storable};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::borrow::Cow;
use std::cell::RefCell;
use std::time::Duration;

pub const SEED_ROTATION_INTERVAL_NS: u64 = 300_000_000_000; // 5 minutes
pub const MAX_USES_PER_SEED: u64 = 10_000;

#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct RandomnessSeed {
    pub seed: [u8; 32],
    pub created_at_ns: u64,
    pub uses: u64,
    pub nonce: u64,
}

impl Storable for RandomnessSeed {
    fn to_bytes(&self) -> Cow<[u8]> {
        Cow::Owned(serde_json::to_vec(self).expect("RandomnessSeed serialization cannot fail"))
    }

    fn from_bytes(bytes: Cow<[u8]>) -> Self {
        serde_json::from_slice(&bytes).unwrap_or_default()
    }

    const BOUND: Bound = Bound::Bounded {
        max_size: 512,
        is_fixed_size: false,
    };
}

thread_local! {
    static SEED_STATE: RefCell<Option<RandomnessSeed>> = const { RefCell::new(None) };
    static SEED_REFRESH_LOCK: RefCell<bool> = const { RefCell::new(false) };

    static SEED_CELL: RefCell<StableCell<RandomnessSeed, Memory>> = RefCell::new(
        StableCell::init(
            MEMORY_MANAGER.with(|m| m.borrow().get(MemoryId::new(SEED_STATE_MEMORY_ID))),
            RandomnessSeed::default(),
        )
        .expect("Failed to init seed cell")
    );

    static LAST_ROTATION_CELL: RefCell<StableCell<u64, Memory>> = RefCell::new(
        StableCell::init(
            MEMORY_MANAGER.with(|m| m.borrow().get(MemoryId::new(SEED_ROTATION_MEMORY_ID))),
            0u64,
        )
        .expect("Failed to init seed rotation cell")
    );
}

/// Kick off seed initialization from init/post_upgrade without blocking the
/// lifecycle hook: a zero-delay one-shot timer spawns the async fetch.
pub fn schedule_initialization() {
    ic_cdk_timers::set_timer(Duration::ZERO, || {
        ic_cdk::spawn(async {
            refresh_seed(false).await;
        });
    });
}

/// Restore the volatile seed from the stable cell (post_upgrade).
pub fn restore_state() {
    let stored = SEED_CELL.with(|cell| cell.borrow().get().clone());
    if stored.created_at_ns > 0 {
        SEED_STATE.with(|s| *s.borrow_mut() = Some(stored));
    }
}

/// Fetch fresh VRF bytes and install a new seed. With `force` false this is
/// a no-op when a seed already exists.
pub async fn refresh_seed(force: bool) {
    let already_locked = SEED_REFRESH_LOCK.with(|lock| {
        let mut lock = lock.borrow_mut();
        if *lock {
            true
        } else {
            *lock = true;
            false
        }
    });
    if already_locked {
        return;
    }

    if !force && SEED_STATE.with(|s| s.borrow().is_some()) {
        SEED_REFRESH_LOCK.with(|lock| *lock.borrow_mut() = false);
        return;
    }

    let random_bytes = match raw_rand().await {
        Ok((bytes,)) => bytes,
        Err(_) => {
            // Degraded fallback: hash time and caller. Only reachable when the
            // management canister rejects, which the IC does not do in steady
            // state.
            let mut hasher = Sha256::new();
            hasher.update(ic_cdk::api::time().to_be_bytes());
            hasher.update(ic_cdk::caller().as_slice());
            hasher.finalize().to_vec()
        }
    };

    let mut hasher = Sha256::new();
    hasher.update(&random_bytes);
    let seed_array: [u8; 32] = hasher.finalize()[0..32]
        .try_into()
        .expect("SHA-256 output is 32 bytes");

    let now = ic_cdk::api::time();
    let new_seed = RandomnessSeed {
        seed: seed_array,
        created_at_ns: now,
        uses: 0,
        nonce: 0,
    };

    SEED_STATE.with(|s| *s.borrow_mut() = Some(new_seed.clone()));
    SEED_CELL.with(|cell| {
        cell.borrow_mut()
            .set(new_seed)
            .expect("Failed to persist seed");
    });
    LAST_ROTATION_CELL.with(|cell| {
        cell.borrow_mut()
            .set(now)
            .expect("Failed to persist rotation time");
    });
    SEED_REFRESH_LOCK.with(|lock| *lock.borrow_mut() = false);

    ic_cdk::println!("Randomness seed refreshed at {}", now);
}

/// Hand out seed material plus a unique nonce for one expansion, and rotate
/// in the background once the seed is stale.
pub fn next_material() -> Result<([u8; 32], u64), String> {
    let taken = SEED_STATE.with(|s| {
        let mut state = s.borrow_mut();
        let seed_state = state
            .as_mut()
            .ok_or_else(|| "Randomness seed initializing, please retry in a moment".to_string())?;

        seed_state.nonce += 1;
        seed_state.uses += 1;
        let out = (seed_state.seed, seed_state.nonce);

        SEED_CELL.with(|cell| {
            cell.borrow_mut()
                .set(seed_state.clone())
                .expect("Failed to persist seed");
        });
        Ok::<_, String>((out, seed_state.uses, seed_state.created_at_ns))
    })?;

    let ((material, nonce), uses, created_at_ns) = taken;
    maybe_schedule_rotation(uses, created_at_ns);
    Ok((material, nonce))
}

fn maybe_schedule_rotation(uses: u64, created_at_ns: u64) {
    let age = ic_cdk::api::time().saturating_sub(created_at_ns);
    if uses < MAX_USES_PER_SEED && age < SEED_ROTATION_INTERVAL_NS {
        return;
    }
    if SEED_REFRESH_LOCK.with(|lock| *lock.borrow()) {
        return;
    }
    ic_cdk_timers::set_timer(Duration::ZERO, || {
        ic_cdk::spawn(async {
            refresh_seed(true).await;
        });
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seed_storable_roundtrip() {
        let seed = RandomnessSeed {
            seed: [9u8; 32],
            created_at_ns: 123,
            uses: 4,
            nonce: 17,
        };
        let decoded = RandomnessSeed::from_bytes(seed.to_bytes());
        assert_eq!(decoded.seed, seed.seed);
        assert_eq!(decoded.nonce, seed.nonce);
        assert_eq!(decoded.uses, seed.uses);
    }

    #[test]
    fn test_seed_decodes_garbage_as_default() {
        let decoded = RandomnessSeed::from_bytes(Cow::Borrowed(&[0xFFu8, 0x01][..]));
        assert_eq!(decoded.created_at_ns, 0);
        assert_eq!(decoded.nonce, 0);
    }
}
