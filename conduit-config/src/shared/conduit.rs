use serde::{Deserialize, Serialize};

use crate::shared::{
    CacheConfig, PipelineConfig, RateLimiterConfig, ValidationError, WorkerPoolConfig,
};

/// Top-level configuration grouping every conduit component.
///
/// Every section is optional in the source files and falls back to its defaults.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ConduitConfig {
    #[serde(default)]
    pub pool: WorkerPoolConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub rate_limiter: RateLimiterConfig,
    #[serde(default)]
    pub pipeline: PipelineConfig,
    /// Maximum number of concurrently admitted operations guarded by a semaphore.
    #[serde(default = "default_max_in_flight")]
    pub max_in_flight: usize,
}

impl ConduitConfig {
    /// Default number of concurrently admitted operations.
    pub const DEFAULT_MAX_IN_FLIGHT: usize = 2;

    /// Validates every section of the configuration.
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.pool.validate()?;
        self.cache.validate()?;
        self.rate_limiter.validate()?;
        self.pipeline.validate()?;

        if self.max_in_flight == 0 {
            return Err(ValidationError::zero("max_in_flight"));
        }

        Ok(())
    }
}

impl Default for ConduitConfig {
    fn default() -> Self {
        Self {
            pool: WorkerPoolConfig::default(),
            cache: CacheConfig::default(),
            rate_limiter: RateLimiterConfig::default(),
            pipeline: PipelineConfig::default(),
            max_in_flight: default_max_in_flight(),
        }
    }
}

fn default_max_in_flight() -> usize {
    ConduitConfig::DEFAULT_MAX_IN_FLIGHT
}
