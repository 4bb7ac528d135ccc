//! `Nat` conversion helpers for token amounts.

use candid::Nat;
use num_bigint::BigUint;
use num_traits::{ToPrimitive, Zero};

pub fn nat_to_u64(n: &Nat) -> Option<u64> {
    n.0.to_u64()
}

pub fn u64_to_nat(n: u64) -> Nat {
    Nat::from(n)
}

/// Render a base-unit amount as a decimal string, e.g. 1.5 tokens with 18
/// decimals -> "1.5". Trailing zeros in the fraction are trimmed.
pub fn format_token_amount(n: &Nat, decimals: u32) -> String {
    let scale = BigUint::from(10u32).pow(decimals);
    let whole = &n.0 / &scale;
    let frac = &n.0 % &scale;

    if frac.is_zero() {
        return whole.to_string();
    }

    let frac_str = format!("{:0width$}", frac, width = decimals as usize);
    let trimmed = frac_str.trim_end_matches('0');
    format!("{}.{}", whole, trimmed)
}
