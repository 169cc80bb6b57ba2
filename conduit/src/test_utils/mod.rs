//! Testing utilities for concurrent primitives and streaming pipelines.
//!
//! - [`stream`] drains stream receivers into vectors, optionally bounded by a timeout.
//! - [`peak`] records how many holders of a resource were active at the same time.
//! - [`wait`] polls a condition until it holds, failing the test if it never does.
//!
//! All waiting helpers panic on timeout so a broken test fails fast instead of hanging.

pub mod peak;
pub mod stream;
pub mod wait;
