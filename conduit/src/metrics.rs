//! Metrics definitions for worker pools and rate limiters.
//!
//! Only metric names and labels live here. Values are emitted through the [`metrics`] facade
//! and nothing is recorded unless the application installs a recorder.

/// Label for the worker pool name in metrics.
pub const POOL_NAME_LABEL: &str = "pool_name";

// Worker pool metrics

/// Counter for jobs accepted by a worker pool.
pub const CONDUIT_POOL_JOBS_SUBMITTED_TOTAL: &str = "conduit_pool_jobs_submitted_total";

/// Counter for jobs whose processor returned successfully.
pub const CONDUIT_POOL_JOBS_COMPLETED_TOTAL: &str = "conduit_pool_jobs_completed_total";

/// Counter for jobs whose processor returned an error.
pub const CONDUIT_POOL_JOBS_FAILED_TOTAL: &str = "conduit_pool_jobs_failed_total";

/// Counter for results dropped because the pool shut down before they were published.
pub const CONDUIT_POOL_RESULTS_DROPPED_TOTAL: &str = "conduit_pool_results_dropped_total";

/// Gauge for workers currently running in a pool.
pub const CONDUIT_POOL_ACTIVE_WORKERS: &str = "conduit_pool_active_workers";

// Rate limiter metrics

/// Counter for acquisitions rejected by a non-blocking rate limiter check.
pub const CONDUIT_RATE_LIMITER_REJECTED_TOTAL: &str = "conduit_rate_limiter_rejected_total";
