use std::time::Duration;

/// Bounded exponential backoff for calls to external providers.
///
/// Attempt `n` (1-based) sleeps `base_delay * 2^(n-1)` before running,
/// capped at `max_delay`; the first attempt runs immediately.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            max_attempts,
            base_delay,
            max_delay,
        }
    }

    /// Delay before retrying after `attempt` failures.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.base_delay
            .saturating_mul(factor)
            .min(self.max_delay)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay: Duration::from_millis(200),
            max_delay: Duration::from_secs(5),
        }
    }
}

/// Tuning knobs for workers and trackers.
#[derive(Debug, Clone)]
pub struct FulfillmentConfig {
    /// How often polling workers ask a provider for fresh status.
    pub poll_interval: Duration,
    /// How long an order's tracking record stays alive without updates.
    pub order_ttl: Duration,
    /// How long an external order mapping stays resolvable for webhooks.
    pub mapping_ttl: Duration,
    pub retry: RetryPolicy,
}

impl Default for FulfillmentConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(1),
            order_ttl: Duration::from_secs(24 * 60 * 60),
            mapping_ttl: Duration::from_secs(24 * 60 * 60),
            retry: RetryPolicy::default(),
        }
    }
}
