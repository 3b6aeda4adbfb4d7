//! Retry budget and backoff computation for quota failures.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::config::duration_secs;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Retries allowed after the first attempt.
    pub max_retries: u32,
    /// Wait used when the provider suggests none.
    #[serde(with = "duration_secs", rename = "default_backoff_secs")]
    pub default_backoff: Duration,
    /// Added on top of a provider-suggested wait.
    #[serde(with = "duration_secs", rename = "safety_margin_secs")]
    pub safety_margin: Duration,
    /// Upper bound on any computed delay.
    #[serde(with = "duration_secs", rename = "max_backoff_secs")]
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 5,
            default_backoff: Duration::from_secs(60),
            safety_margin: Duration::from_secs(1),
            max_backoff: Duration::from_secs(3600),
        }
    }
}

/// Round up to whole seconds.
fn ceil_secs(wait: Duration) -> u64 {
    wait.as_secs().saturating_add(u64::from(wait.subsec_nanos() > 0))
}

impl RetryPolicy {
    /// Delay before the next attempt.
    pub fn backoff(&self, retry_after: Option<Duration>) -> Duration {
        let delay = match retry_after {
            Some(wait) => Duration::from_secs(ceil_secs(wait)).saturating_add(self.safety_margin),
            None => self.default_backoff,
        };
        delay.min(self.max_backoff)
    }

    /// The attempt count to schedule after `attempt_count`, or `None` once the
    /// budget is spent.
    pub fn next_attempt(&self, attempt_count: u32) -> Option<u32> {
        let next = attempt_count.saturating_add(1);
        (next <= self.max_retries).then_some(next)
    }
}

/// Error recorded on a job whose retries ran out.
pub fn exhausted_message(attempts: u32) -> String {
    format!("retry budget exhausted after {attempts} attempts")
}
