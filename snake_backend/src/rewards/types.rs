use candid::{CandidType, Nat, Principal};
use ic_stable_structures::storable::Bound;
use ic_stable_structures::Storable;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;

/// The reward token uses 18-decimal base units.
pub const TOKEN_DECIMALS: u32 = 18;

/// ICRC-1 account, declared locally for the token contract's balance query.
#[derive(CandidType, Deserialize, Clone, Debug)]
pub struct Account {
    pub owner: Principal,
    pub subaccount: Option<Vec<u8>>,
}

impl From<Principal> for Account {
    fn from(owner: Principal) -> Self {
        Account {
            owner,
            subaccount: None,
        }
    }
}

/// Outcome of one contract call, split by what it licenses us to do next:
/// definite rejections must not be retried, transient rejections may be.
pub enum CallOutcome {
    Success(Nat),
    Rejected(String),
    Transient(String),
}

/// A claim attempt that hit a transient failure and is waiting on its next
/// scheduled retry.
#[derive(CandidType, Serialize, Deserialize, Clone, Debug, Default)]
pub struct PendingClaim {
    pub attempts: u8,
    pub created_at_ns: u64,
    pub last_error: Option<String>,
}

impl Storable for PendingClaim {
    fn to_bytes(&self) -> Cow<[u8]> {
        Cow::Owned(serde_json::to_vec(self).expect("PendingClaim serialization cannot fail"))
    }

    fn from_bytes(bytes: Cow<[u8]>) -> Self {
        serde_json::from_slice(&bytes).unwrap_or_default()
    }

    const BOUND: Bound = Bound::Bounded {
        max_size: 512,
        is_fixed_size: false,
    };
}

/// Point amount that could not be pushed to the reward contract, parked per
/// account for manual reconciliation.
#[derive(CandidType, Serialize, Deserialize, Clone, Debug, Default)]
pub struct PendingPoints {
    pub amount: u32,
    pub failed_at_ns: u64,
    pub last_error: String,
}

impl Storable for PendingPoints {
    fn to_bytes(&self) -> Cow<[u8]> {
        Cow::Owned(serde_json::to_vec(self).expect("PendingPoints serialization cannot fail"))
    }

    fn from_bytes(bytes: Cow<[u8]>) -> Self {
        serde_json::from_slice(&bytes).unwrap_or_default()
    }

    const BOUND: Bound = Bound::Bounded {
        max_size: 512,
        is_fixed_size: false,
    };
}

#[derive(CandidType, Deserialize, Clone, Debug, PartialEq)]
pub enum ClaimStatus {
    Idle,
    InFlight { attempt: u8 },
    Claimed,
    Failed { reason: String },
}

/// What `claim_tokens` tells the caller: done now, or queued for retry.
#[derive(CandidType, Deserialize, Clone, Debug, PartialEq)]
pub enum ClaimStart {
    Completed,
    Scheduled { attempt: u8, next_retry_ms: u64 },
}

#[derive(CandidType, Deserialize, Clone, Debug)]
pub struct TxNotice {
    pub id: u64,
    pub description: String,
    pub submitted_at_ns: u64,
}

#[derive(CandidType, Deserialize, Clone, Debug)]
pub struct TokenBalance {
    pub base_units: Nat,
    pub display: String,
}

/// Cooldown until the next claim, pre-split for the countdown display.
#[derive(CandidType, Deserialize, Clone, Debug, PartialEq)]
pub struct ClaimCooldown {
    pub total_seconds: u64,
    pub hours: u64,
    pub minutes: u64,
}

impl ClaimCooldown {
    pub fn from_seconds(total_seconds: u64) -> Self {
        ClaimCooldown {
            total_seconds,
            hours: total_seconds / 3600,
            minutes: (total_seconds % 3600) / 60,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cooldown_split() {
        let cd = ClaimCooldown::from_seconds(0);
        assert_eq!((cd.hours, cd.minutes), (0, 0));

        let cd = ClaimCooldown::from_seconds(3_600 + 25 * 60 + 59);
        assert_eq!((cd.hours, cd.minutes), (1, 25));

        let cd = ClaimCooldown::from_seconds(26 * 3600);
        assert_eq!((cd.hours, cd.minutes), (26, 0));
    }

    #[test]
    fn test_pending_claim_decodes_garbage_as_default() {
        let decoded = PendingClaim::from_bytes(Cow::Borrowed(b"\x00broken"));
        assert_eq!(decoded.attempts, 0);
        assert!(decoded.last_error.is_none());
    }
}
