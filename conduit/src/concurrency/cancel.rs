//! Cancellation signal threaded through generators, stages, and fan-out/fan-in tasks.
//!
//! A cancel channel is a `watch` channel over a `bool` that flips from `false` to `true` exactly
//! once and then stays fired. Any number of [`CancelRx`] subscribers can observe it, and every
//! blocking step of a streaming task races its own progress against [`CancelRx::cancelled`].
//!
//! Each channel also counts the tasks spawned through [`CancelRx::spawn`]. Once cancellation
//! fires, every such task is expected to exit promptly; [`CancelTx::active_tasks`] dropping back
//! to zero is how callers verify that nothing leaked.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::counter::{AtomicCounter, CounterGuard};

/// Transmitter side of the cancel channel.
#[derive(Debug, Clone)]
pub struct CancelTx {
    tx: watch::Sender<bool>,
    tasks: Arc<AtomicCounter>,
}

impl CancelTx {
    /// Fires the cancellation signal.
    ///
    /// Calling this more than once has no further effect.
    pub fn cancel(&self) {
        // Use infallible send to support cancelling before any receivers subscribe.
        let was_cancelled = self.tx.send_replace(true);
        if !was_cancelled {
            debug!("cancellation signal fired");
        }
    }

    /// Fires the cancellation signal once `duration` has elapsed.
    ///
    /// The returned handle can be aborted to disarm the timer.
    pub fn cancel_after(&self, duration: Duration) -> JoinHandle<()> {
        let this = self.clone();
        tokio::spawn(async move {
            tokio::time::sleep(duration).await;
            debug!(?duration, "cancellation timer elapsed");
            this.cancel();
        })
    }

    /// Returns `true` once the signal has fired.
    pub fn is_cancelled(&self) -> bool {
        *self.tx.borrow()
    }

    /// Creates a new subscription to this channel.
    pub fn subscribe(&self) -> CancelRx {
        CancelRx {
            rx: self.tx.subscribe(),
            tasks: self.tasks.clone(),
        }
    }

    /// Returns the number of tasks spawned through this channel that are still alive.
    pub fn active_tasks(&self) -> i64 {
        self.tasks.value()
    }
}

/// Receiver side of the cancel channel.
#[derive(Debug, Clone)]
pub struct CancelRx {
    rx: watch::Receiver<bool>,
    tasks: Arc<AtomicCounter>,
}

impl CancelRx {
    /// Returns `true` once the signal has fired.
    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    /// Waits until the signal fires.
    ///
    /// Resolves immediately if it already fired. If every [`CancelTx`] is dropped without
    /// cancelling, the signal can no longer fire and this future never resolves.
    pub async fn cancelled(&mut self) {
        loop {
            if *self.rx.borrow_and_update() {
                return;
            }

            if self.rx.changed().await.is_err() {
                std::future::pending::<()>().await;
            }
        }
    }

    /// Spawns `future` as a task that is counted by this channel while it runs.
    ///
    /// The count is released when the task completes, panics, or is aborted.
    pub fn spawn<F>(&self, future: F) -> JoinHandle<F::Output>
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        let guard = CounterGuard::new(self.tasks.clone());
        tokio::spawn(async move {
            let _guard = guard;
            future.await
        })
    }

    /// Returns the number of tasks spawned through this channel that are still alive.
    pub fn active_tasks(&self) -> i64 {
        self.tasks.value()
    }

    /// Returns a fresh watch receiver observing the same signal.
    pub(crate) fn watch(&self) -> watch::Receiver<bool> {
        self.rx.clone()
    }
}

/// Creates a new cancel channel in the not-cancelled state.
pub fn create_cancel_channel() -> (CancelTx, CancelRx) {
    let (tx, rx) = watch::channel(false);
    let tasks = Arc::new(AtomicCounter::new());

    (
        CancelTx {
            tx,
            tasks: tasks.clone(),
        },
        CancelRx { rx, tasks },
    )
}
