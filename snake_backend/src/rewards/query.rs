//! Read-only proxies to the external reward and token contracts.

use super::bridge;
use super::nat::{format_token_amount, nat_to_u64};
use super::types::{Account, ClaimCooldown, TokenBalance, TOKEN_DECIMALS};
use candid::{Nat, Principal};

pub async fn player_points(account: Principal) -> Result<u64, String> {
    let config = bridge::config()?;
    let (points,): (Nat,) = ic_cdk::call(config.reward_contract, "player_points", (account,))
        .await
        .map_err(|(code, msg)| format!("player_points call failed: {:?} {}", code, msg))?;
    nat_to_u64(&points).ok_or_else(|| "Player points exceed u64 range".to_string())
}

pub async fn time_until_next_claim(account: Principal) -> Result<u64, String> {
    let config = bridge::config()?;
    let (seconds,): (Nat,) =
        ic_cdk::call(config.reward_contract, "time_until_next_claim", (account,))
            .await
            .map_err(|(code, msg)| {
                format!("time_until_next_claim call failed: {:?} {}", code, msg)
            })?;
    nat_to_u64(&seconds).ok_or_else(|| "Cooldown exceeds u64 range".to_string())
}

pub async fn claim_cooldown(account: Principal) -> Result<ClaimCooldown, String> {
    Ok(ClaimCooldown::from_seconds(
        time_until_next_claim(account).await?,
    ))
}

/// Whether the contract will accept a claim right now. Older contract
/// deployments lack `can_claim_tokens`; when the call rejects, eligibility is
/// derived from the two queries every deployment has.
pub async fn can_claim_now(account: Principal) -> Result<bool, String> {
    let config = bridge::config()?;
    let direct: Result<(bool,), _> =
        ic_cdk::call(config.reward_contract, "can_claim_tokens", (account,)).await;

    match direct {
        Ok((can_claim,)) => Ok(can_claim),
        Err((code, msg)) => {
            ic_cdk::println!(
                "can_claim_tokens unavailable ({:?} {}), deriving from points + cooldown",
                code,
                msg
            );
            let points = player_points(account).await?;
            let cooldown = time_until_next_claim(account).await?;
            Ok(points > 0 && cooldown == 0)
        }
    }
}

pub async fn has_claimed_tokens(account: Principal) -> Result<bool, String> {
    Ok(!can_claim_now(account).await?)
}

pub async fn token_balance(account: Principal) -> Result<TokenBalance, String> {
    let config = bridge::config()?;
    let result: Result<(Nat,), _> = ic_cdk::call(
        config.token_contract,
        "icrc1_balance_of",
        (Account::from(account),),
    )
    .await;

    match result {
        Ok((balance,)) => Ok(TokenBalance {
            display: format_token_amount(&balance, TOKEN_DECIMALS),
            base_units: balance,
        }),
        Err((code, msg)) => Err(format!("Balance query failed: {:?} {}", code, msg)),
    }
}
