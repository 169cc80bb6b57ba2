//! Shared configuration types for conduit components.

mod base;
mod cache;
mod conduit;
mod pipeline;
mod pool;
mod rate_limit;

pub use base::ValidationError;
pub use cache::CacheConfig;
pub use conduit::ConduitConfig;
pub use pipeline::PipelineConfig;
pub use pool::WorkerPoolConfig;
pub use rate_limit::RateLimiterConfig;
