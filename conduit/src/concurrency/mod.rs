//! Cancellation and coordination utilities shared by the streaming primitives.
//!
//! Generators, pipeline stages, and fan-out/fan-in tasks all run as independent tokio tasks.
//! Each of them races every blocking step (receiving from its input, sending to its output)
//! against a shared cancellation signal, preferring cancellation once it fired.
//!
//! - [`cancel`] provides the sticky cancellation signal and counts the tasks bound to it.
//! - [`future`] turns a cancellation or a timer into a [`crate::error::ErrorKind::Cancelled`] or
//!   [`crate::error::ErrorKind::TimedOut`] error for arbitrary futures.
//! - [`stream`] adapts any [`futures::Stream`] so that it ends once cancellation fires.
//!
//! The worker pool owns a private cancel channel as its shutdown signal. Its workers only race
//! claiming a job and publishing a result against it, so a claimed job always runs to completion.

pub mod cancel;
pub mod future;
pub mod stream;
