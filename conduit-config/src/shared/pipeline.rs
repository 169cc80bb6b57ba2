use serde::{Deserialize, Serialize};

use crate::shared::ValidationError;

/// Configuration for streaming pipelines and fan-out/fan-in stages.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct PipelineConfig {
    /// Capacity of the channel connecting two consecutive stages.
    ///
    /// A capacity of 1 makes every stage hand items over one at a time.
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
    /// Number of parallel workers used when a stage is fanned out.
    #[serde(default = "default_fan_out_workers")]
    pub fan_out_workers: usize,
}

impl PipelineConfig {
    /// Default channel capacity between stages.
    pub const DEFAULT_CHANNEL_CAPACITY: usize = 1;

    /// Default number of fan-out workers.
    pub const DEFAULT_FAN_OUT_WORKERS: usize = 3;

    /// Validates the pipeline configuration.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.channel_capacity == 0 {
            return Err(ValidationError::zero("pipeline.channel_capacity"));
        }

        if self.fan_out_workers == 0 {
            return Err(ValidationError::zero("pipeline.fan_out_workers"));
        }

        Ok(())
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            channel_capacity: default_channel_capacity(),
            fan_out_workers: default_fan_out_workers(),
        }
    }
}

fn default_channel_capacity() -> usize {
    PipelineConfig::DEFAULT_CHANNEL_CAPACITY
}

fn default_fan_out_workers() -> usize {
    PipelineConfig::DEFAULT_FAN_OUT_WORKERS
}
