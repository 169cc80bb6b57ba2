use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};

/// Lock-free signed 64-bit counter.
///
/// Every mutation is a single atomic read-modify-write, so concurrent updates never lose an
/// increment. All methods return the value after the update, which makes the counter usable
/// for tracking peaks (e.g. "how many holders are active right now").
///
/// The counter is shared by wrapping it in an [`std::sync::Arc`]; it is also embedded in other
/// primitives of this crate to track live tasks, active workers, and held permits.
#[derive(Debug, Default)]
pub struct AtomicCounter {
    value: AtomicI64,
}

impl AtomicCounter {
    /// Creates a new [`AtomicCounter`] starting at zero.
    pub const fn new() -> Self {
        Self {
            value: AtomicI64::new(0),
        }
    }

    /// Adds one and returns the new value.
    pub fn increment(&self) -> i64 {
        self.add(1)
    }

    /// Subtracts one and returns the new value.
    pub fn decrement(&self) -> i64 {
        self.add(-1)
    }

    /// Adds `delta` (which may be negative) and returns the new value.
    pub fn add(&self, delta: i64) -> i64 {
        self.value.fetch_add(delta, Ordering::AcqRel) + delta
    }

    /// Returns the current value.
    pub fn value(&self) -> i64 {
        self.value.load(Ordering::Acquire)
    }
}

/// RAII guard that increments a counter on creation and decrements it on drop.
///
/// Drop runs on normal exit, early return, and unwinding, so a counted task that panics is
/// still uncounted.
#[derive(Debug)]
pub(crate) struct CounterGuard {
    counter: Arc<AtomicCounter>,
}

impl CounterGuard {
    pub(crate) fn new(counter: Arc<AtomicCounter>) -> Self {
        counter.increment();
        Self { counter }
    }
}

impl Drop for CounterGuard {
    fn drop(&mut self) {
        self.counter.decrement();
    }
}
