//! In-process concurrency primitives and streaming patterns built on tokio.
//!
//! The crate provides a lock-free [`counter::AtomicCounter`], a TTL based
//! [`cache::ExpiringCache`], a [`semaphore::CountingSemaphore`], a token bucket
//! [`rate_limit::RateLimiter`], a bounded [`pool::WorkerPool`], composable streaming
//! [`pipeline`] stages and [`fan`] out/in helpers.
//!
//! Streaming tasks observe a shared cancellation signal from [`concurrency::cancel`], while the
//! worker pool drains and joins its workers on shutdown.

pub mod cache;
pub mod concurrency;
pub mod counter;
pub mod error;
pub mod fan;
mod macros;
pub mod metrics;
pub mod pipeline;
pub mod pool;
pub mod rate_limit;
pub mod semaphore;
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
