use core::future::Future;
use std::time::Duration;

use crate::concurrency::cancel::CancelRx;
use crate::conduit_error;
use crate::error::{ConduitResult, ErrorKind};

/// Races `future` against the cancellation signal.
///
/// Returns [`ErrorKind::Cancelled`] if the signal fires first. Cancellation wins ties, so a
/// signal that already fired never lets `future` run.
pub async fn cancellable<F>(cancel_rx: &mut CancelRx, future: F) -> ConduitResult<F::Output>
where
    F: Future,
{
    tokio::select! {
        biased;

        _ = cancel_rx.cancelled() => {
            Err(conduit_error!(ErrorKind::Cancelled, "Operation cancelled"))
        }

        output = future => Ok(output),
    }
}

/// Races `future` against a timer of `duration`.
///
/// Returns [`ErrorKind::TimedOut`] if the timer elapses first.
pub async fn with_timeout<F>(duration: Duration, future: F) -> ConduitResult<F::Output>
where
    F: Future,
{
    tokio::time::timeout(duration, future).await.map_err(|_| {
        conduit_error!(
            ErrorKind::TimedOut,
            "Operation timed out",
            detail = format!("gave up after {duration:?}")
        )
    })
}
