use tokio::sync::Semaphore;

use crate::concurrency::cancel::CancelRx;
use crate::conduit_error;
use crate::counter::AtomicCounter;
use crate::error::{ConduitResult, ErrorKind};

/// Bounds the number of concurrent holders of a resource.
///
/// Unlike [`tokio::sync::Semaphore`] permits, holders do not carry a permit object: a successful
/// acquisition must be paired with exactly one [`CountingSemaphore::release`] call, or the
/// [`SemaphoreGuard`] returned by [`CountingSemaphore::acquire_guard`] can release on drop.
///
/// Releasing more often than acquiring is a caller error. Debug builds assert on it, release
/// builds let the bound grow.
#[derive(Debug)]
pub struct CountingSemaphore {
    permits: Semaphore,
    held: AtomicCounter,
    limit: usize,
}

impl CountingSemaphore {
    /// Creates a semaphore admitting `limit` concurrent holders, with a minimum of one.
    pub fn new(limit: usize) -> Self {
        let limit = limit.max(1);
        Self {
            permits: Semaphore::new(limit),
            held: AtomicCounter::new(),
            limit,
        }
    }

    /// Returns the maximum number of concurrent holders.
    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Returns the number of permits that can be acquired without waiting.
    pub fn available(&self) -> usize {
        self.permits.available_permits()
    }

    /// Returns the number of permits currently held.
    pub fn held(&self) -> i64 {
        self.held.value()
    }

    /// Waits until a permit is available and takes it.
    pub async fn acquire(&self) {
        let Ok(permit) = self.permits.acquire().await else {
            unreachable!("counting semaphore permits are never closed");
        };
        permit.forget();
        self.held.increment();
    }

    /// Takes a permit if one is available right now.
    pub fn try_acquire(&self) -> bool {
        match self.permits.try_acquire() {
            Ok(permit) => {
                permit.forget();
                self.held.increment();
                true
            }
            Err(_) => false,
        }
    }

    /// Waits for a permit unless `cancel_rx` fires first.
    ///
    /// No permit is taken when cancellation wins.
    pub async fn acquire_cancellable(&self, cancel_rx: &mut CancelRx) -> ConduitResult<()> {
        tokio::select! {
            biased;

            _ = cancel_rx.cancelled() => {
                Err(conduit_error!(
                    ErrorKind::Cancelled,
                    "Semaphore acquisition cancelled"
                ))
            }
            _ = self.acquire() => Ok(()),
        }
    }

    /// Waits for a permit and returns a guard releasing it on drop.
    pub async fn acquire_guard(&self) -> SemaphoreGuard<'_> {
        self.acquire().await;
        SemaphoreGuard { semaphore: self }
    }

    /// Returns one permit.
    pub fn release(&self) {
        let held = self.held.decrement();
        debug_assert!(held >= 0, "semaphore released more times than acquired");
        self.permits.add_permits(1);
    }
}

/// Holds one permit of a [`CountingSemaphore`] until dropped.
#[derive(Debug)]
pub struct SemaphoreGuard<'a> {
    semaphore: &'a CountingSemaphore,
}

impl Drop for SemaphoreGuard<'_> {
    fn drop(&mut self) {
        self.semaphore.release();
    }
}
