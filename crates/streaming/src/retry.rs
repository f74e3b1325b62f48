use std::time::Duration;

/// Exponential backoff: retry `n` (1-based) waits `base * multiplier^(n-1)`.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    pub base_delay: Duration,
    pub multiplier: u32,
    pub max_retries: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_secs(1),
            multiplier: 2,
            max_retries: 3,
        }
    }
}

impl RetryPolicy {
    pub fn max_attempts(&self) -> u32 {
        self.max_retries + 1
    }

    pub fn delay_for(&self, retry: u32) -> Duration {
        let factor = self.multiplier.saturating_pow(retry.saturating_sub(1));
        self.base_delay.saturating_mul(factor)
    }

    /// Every backoff delay the policy can produce, in order.
    pub fn delays(&self) -> impl Iterator<Item = Duration> + '_ {
        (1..=self.max_retries).map(|n| self.delay_for(n))
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::RetryPolicy;

    #[test]
    fn default_backoff_doubles_from_one_second() {
        let p = RetryPolicy::default();
        let delays: Vec<_> = p.delays().collect();
        assert_eq!(
            delays,
            [Duration::from_secs(1), Duration::from_secs(2), Duration::from_secs(4)]
        );
        assert_eq!(p.max_attempts(), 4);
    }

    #[test]
    fn large_retry_counts_saturate() {
        let p = RetryPolicy {
            base_delay: Duration::from_secs(1),
            multiplier: 10,
            max_retries: 64,
        };
        assert_eq!(p.delay_for(64), Duration::from_secs(u32::MAX as u64));
    }
}
