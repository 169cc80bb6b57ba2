//! Logging and metrics setup shared by conduit binaries and tests.

pub mod metrics;
pub mod tracing;
