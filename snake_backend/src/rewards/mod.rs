pub mod backoff;
pub mod bridge;
pub mod guard;
pub mod nat;
pub mod notices;
pub mod query;
pub mod types;

pub use bridge::{claim_status, claim_tokens, is_configured, record_points};
pub use types::{
    ClaimCooldown, ClaimStart, ClaimStatus, PendingPoints, TokenBalance, TxNotice,
};
