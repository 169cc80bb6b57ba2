use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::shared::ValidationError;

/// Configuration for an expiring cache.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct CacheConfig {
    /// Time to live, in milliseconds, applied to every entry when it is set.
    #[serde(default = "default_ttl_ms")]
    pub ttl_ms: u64,
    /// Interval, in milliseconds, between background sweeps of expired entries.
    ///
    /// When absent, expired entries are only removed by explicit cleanup calls.
    #[serde(default)]
    pub sweep_interval_ms: Option<u64>,
}

impl CacheConfig {
    /// Default time to live: 5 seconds.
    pub const DEFAULT_TTL_MS: u64 = 5_000;

    /// Returns the entry time to live.
    pub fn ttl(&self) -> Duration {
        Duration::from_millis(self.ttl_ms)
    }

    /// Returns the background sweep interval, if one is configured.
    pub fn sweep_interval(&self) -> Option<Duration> {
        self.sweep_interval_ms.map(Duration::from_millis)
    }

    /// Validates the cache configuration.
    ///
    /// Ensures the TTL and, when present, the sweep interval are non-zero.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.ttl_ms == 0 {
            return Err(ValidationError::zero("cache.ttl_ms"));
        }

        if self.sweep_interval_ms == Some(0) {
            return Err(ValidationError::zero("cache.sweep_interval_ms"));
        }

        Ok(())
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_ms: default_ttl_ms(),
            sweep_interval_ms: None,
        }
    }
}

fn default_ttl_ms() -> u64 {
    CacheConfig::DEFAULT_TTL_MS
}
