use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::shared::ValidationError;

/// Configuration for a token bucket rate limiter.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct RateLimiterConfig {
    /// Number of tokens added to the bucket per second.
    #[serde(default = "default_rate_per_sec")]
    pub rate_per_sec: u32,
    /// Maximum number of tokens the bucket holds, which is also the initial fill.
    #[serde(default = "default_burst")]
    pub burst: u32,
}

impl RateLimiterConfig {
    /// Default refill rate: 20 tokens per second.
    pub const DEFAULT_RATE_PER_SEC: u32 = 20;

    /// Default burst: 10 tokens.
    pub const DEFAULT_BURST: u32 = 10;

    /// Returns the interval between two refills.
    ///
    /// A zero rate is treated as one token per second.
    pub fn refill_interval(&self) -> Duration {
        Duration::from_secs(1) / self.rate_per_sec.max(1)
    }

    /// Validates the rate limiter configuration.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.rate_per_sec == 0 {
            return Err(ValidationError::zero("rate_limiter.rate_per_sec"));
        }

        if self.burst == 0 {
            return Err(ValidationError::zero("rate_limiter.burst"));
        }

        Ok(())
    }
}

impl Default for RateLimiterConfig {
    fn default() -> Self {
        Self {
            rate_per_sec: default_rate_per_sec(),
            burst: default_burst(),
        }
    }
}

fn default_rate_per_sec() -> u32 {
    RateLimiterConfig::DEFAULT_RATE_PER_SEC
}

fn default_burst() -> u32 {
    RateLimiterConfig::DEFAULT_BURST
}
