use std::sync::atomic::{AtomicI64, Ordering};

use crate::counter::AtomicCounter;

/// Tracks the current and highest number of concurrently active holders.
#[derive(Debug, Default)]
pub struct PeakTracker {
    active: AtomicCounter,
    peak: AtomicI64,
}

impl PeakTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks a holder as active until the returned guard is dropped.
    pub fn enter(&self) -> PeakGuard<'_> {
        let active = self.active.increment();
        self.peak.fetch_max(active, Ordering::AcqRel);

        PeakGuard { tracker: self }
    }

    /// Returns the number of holders active right now.
    pub fn active(&self) -> i64 {
        self.active.value()
    }

    /// Returns the highest number of holders observed at once.
    pub fn peak(&self) -> i64 {
        self.peak.load(Ordering::Acquire)
    }
}

/// Guard returned by [`PeakTracker::enter`].
#[derive(Debug)]
pub struct PeakGuard<'a> {
    tracker: &'a PeakTracker,
}

impl Drop for PeakGuard<'_> {
    fn drop(&mut self) {
        self.tracker.active.decrement();
    }
}
