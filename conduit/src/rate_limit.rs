use std::sync::{Arc, Weak};
use std::time::Duration;

use conduit_config::shared::RateLimiterConfig;
use metrics::counter;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, trace};

use crate::concurrency::cancel::CancelRx;
use crate::conduit_error;
use crate::error::{ConduitResult, ErrorKind};
use crate::metrics::CONDUIT_RATE_LIMITER_REJECTED_TOTAL;

/// Token bucket rate limiter.
///
/// The bucket starts full with `burst` tokens. A background task adds one token every
/// `1s / rate_per_sec` as long as the bucket holds fewer than `burst` tokens, so idle periods
/// never accumulate more than a single burst. Acquiring consumes one token and tokens are
/// never returned.
///
/// The refill task is aborted when the limiter is dropped.
#[derive(Debug)]
pub struct RateLimiter {
    tokens: Arc<Semaphore>,
    burst: usize,
    refill_interval: Duration,
    refill_task: JoinHandle<()>,
}

impl RateLimiter {
    /// Creates a limiter refilling `rate_per_sec` tokens per second up to `burst` tokens.
    ///
    /// Zero values for either argument are treated as one.
    ///
    /// # Panics
    ///
    /// Panics if called outside of a tokio runtime.
    pub fn new(rate_per_sec: u32, burst: u32) -> Self {
        let rate_per_sec = rate_per_sec.max(1);
        let burst = burst.max(1) as usize;
        let refill_interval = Duration::from_secs(1) / rate_per_sec;

        let tokens = Arc::new(Semaphore::new(burst));
        let refill_task = tokio::spawn(refill_loop(
            Arc::downgrade(&tokens),
            burst,
            refill_interval,
        ));

        debug!(rate_per_sec, burst, ?refill_interval, "rate limiter created");

        Self {
            tokens,
            burst,
            refill_interval,
            refill_task,
        }
    }

    /// Creates a limiter from `config`.
    pub fn from_config(config: &RateLimiterConfig) -> Self {
        Self::new(config.rate_per_sec, config.burst)
    }

    /// Returns the maximum number of tokens the bucket holds.
    pub fn burst(&self) -> usize {
        self.burst
    }

    /// Returns the interval between two refills.
    pub fn refill_interval(&self) -> Duration {
        self.refill_interval
    }

    /// Returns the number of tokens currently in the bucket.
    pub fn available(&self) -> usize {
        self.tokens.available_permits()
    }

    /// Waits until a token is available and consumes it.
    pub async fn acquire(&self) {
        let Ok(permit) = self.tokens.acquire().await else {
            unreachable!("rate limiter tokens are never closed");
        };
        permit.forget();
    }

    /// Consumes a token if one is available right now.
    pub fn try_acquire(&self) -> bool {
        match self.tokens.try_acquire() {
            Ok(permit) => {
                permit.forget();
                true
            }
            Err(_) => {
                counter!(CONDUIT_RATE_LIMITER_REJECTED_TOTAL).increment(1);
                false
            }
        }
    }

    /// Waits for a token unless `cancel_rx` fires first.
    pub async fn acquire_cancellable(&self, cancel_rx: &mut CancelRx) -> ConduitResult<()> {
        tokio::select! {
            biased;

            _ = cancel_rx.cancelled() => {
                Err(conduit_error!(
                    ErrorKind::Cancelled,
                    "Rate limiter acquisition cancelled"
                ))
            }
            _ = self.acquire() => Ok(()),
        }
    }
}

impl Drop for RateLimiter {
    fn drop(&mut self) {
        self.refill_task.abort();
    }
}

/// Adds one token per tick while the bucket is below `burst`.
///
/// Only this task adds tokens, so checking then adding cannot overshoot `burst`.
async fn refill_loop(tokens: Weak<Semaphore>, burst: usize, refill_interval: Duration) {
    let mut ticker = tokio::time::interval(refill_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    // The first tick completes immediately and the bucket starts full.
    ticker.tick().await;

    loop {
        ticker.tick().await;

        let Some(tokens) = tokens.upgrade() else {
            return;
        };

        if tokens.available_permits() < burst {
            tokens.add_permits(1);
            trace!("rate limiter token added");
        }
    }
}
