//! Bounded exponential backoff for transient contract failures.

/// Retry budget: a fixed number of attempts with exponentially growing delays
/// between them. Attempt counting starts at 1 (the inline attempt).
#[derive(Clone, Copy, Debug)]
pub struct BackoffPolicy {
    pub max_attempts: u8,
    pub base_delay_ms: u64,
    pub factor: u64,
}

/// Claims retry on the transient rate-limit signal only: 3 attempts total,
/// 1000 ms before the second, 2000 ms before the third.
pub const CLAIM_RETRY_POLICY: BackoffPolicy = BackoffPolicy {
    max_attempts: 3,
    base_delay_ms: 1000,
    factor: 2,
};

impl BackoffPolicy {
    /// Delay before the next attempt, given how many attempts have already
    /// failed. `None` once the budget is exhausted.
    pub fn delay_after_ms(&self, failed_attempts: u8) -> Option<u64> {
        if failed_attempts == 0 || failed_attempts >= self.max_attempts {
            return None;
        }
        let exponent = (failed_attempts - 1) as u32;
        Some(self.base_delay_ms.saturating_mul(self.factor.saturating_pow(exponent)))
    }
}
