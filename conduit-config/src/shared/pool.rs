use serde::{Deserialize, Serialize};

use crate::shared::ValidationError;

/// Configuration for a bounded worker pool.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct WorkerPoolConfig {
    /// Name of the pool, used in logs and as the metrics label.
    #[serde(default = "default_name")]
    pub name: String,
    /// Number of workers processing jobs in parallel.
    #[serde(default = "default_num_workers")]
    pub num_workers: usize,
    /// Maximum number of queued jobs before submitters start waiting.
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
    /// Maximum number of undelivered results before workers start waiting.
    #[serde(default = "default_result_capacity")]
    pub result_capacity: usize,
}

impl WorkerPoolConfig {
    /// Default pool name.
    pub const DEFAULT_NAME: &'static str = "default";

    /// Default number of workers.
    pub const DEFAULT_NUM_WORKERS: usize = 4;

    /// Default job queue capacity.
    pub const DEFAULT_QUEUE_CAPACITY: usize = 100;

    /// Default result queue capacity.
    pub const DEFAULT_RESULT_CAPACITY: usize = 100;

    /// Creates a configuration with `num_workers` workers and default capacities.
    pub fn with_workers(num_workers: usize) -> Self {
        Self {
            num_workers,
            ..Self::default()
        }
    }

    /// Validates the pool configuration.
    ///
    /// Ensures the worker count and both queue capacities are non-zero.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.num_workers == 0 {
            return Err(ValidationError::zero("pool.num_workers"));
        }

        if self.queue_capacity == 0 {
            return Err(ValidationError::zero("pool.queue_capacity"));
        }

        if self.result_capacity == 0 {
            return Err(ValidationError::zero("pool.result_capacity"));
        }

        Ok(())
    }
}

impl Default for WorkerPoolConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            num_workers: default_num_workers(),
            queue_capacity: default_queue_capacity(),
            result_capacity: default_result_capacity(),
        }
    }
}

fn default_name() -> String {
    WorkerPoolConfig::DEFAULT_NAME.to_string()
}

fn default_num_workers() -> usize {
    WorkerPoolConfig::DEFAULT_NUM_WORKERS
}

fn default_queue_capacity() -> usize {
    WorkerPoolConfig::DEFAULT_QUEUE_CAPACITY
}

fn default_result_capacity() -> usize {
    WorkerPoolConfig::DEFAULT_RESULT_CAPACITY
}
