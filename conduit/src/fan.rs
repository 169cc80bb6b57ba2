//! Distribution of one stream across several workers and merging of several streams into one.
//!
//! Neither direction preserves ordering across streams: [`fan_out`] workers claim whatever item
//! is next when they become free, and [`fan_in`] forwards items as soon as any source yields.

use std::sync::Arc;

use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinSet;
use tracing::{debug, warn};

use crate::concurrency::cancel::CancelRx;
use crate::pipeline::{DEFAULT_CHANNEL_CAPACITY, StreamRx, recv_or_cancel, send_or_cancel};

/// Starts `workers` consumers sharing `input` and returns one output stream per consumer.
///
/// Each consumer applies `worker_fn` to the items it claims and publishes the results on its own
/// stream. A worker count of zero is treated as one.
pub fn fan_out<T, R, F>(
    cancel_rx: &CancelRx,
    input: StreamRx<T>,
    workers: usize,
    worker_fn: F,
) -> Vec<StreamRx<R>>
where
    T: Send + 'static,
    R: Send + 'static,
    F: Fn(T) -> R + Send + Sync + 'static,
{
    let workers = workers.max(1);
    let input = Arc::new(Mutex::new(input));
    let worker_fn = Arc::new(worker_fn);

    debug!(workers, "fanning out stream");

    (0..workers)
        .map(|worker_id| {
            let (tx, rx) = mpsc::channel(DEFAULT_CHANNEL_CAPACITY);
            let input = input.clone();
            let worker_fn = worker_fn.clone();
            let mut task_cancel_rx = cancel_rx.clone();

            cancel_rx.spawn(async move {
                let mut processed = 0usize;
                loop {
                    // Held only while waiting for the next item.
                    let item = {
                        let mut input = input.lock().await;
                        recv_or_cancel(&mut input, &mut task_cancel_rx).await
                    };

                    let Some(item) = item else {
                        break;
                    };

                    if !send_or_cancel(&tx, worker_fn(item), &mut task_cancel_rx).await {
                        break;
                    }
                    processed += 1;
                }

                debug!(worker_id, processed, "fan-out worker finished");
            });

            rx
        })
        .collect()
}

/// Merges `sources` into a single stream.
///
/// The merged stream closes once every source is exhausted or cancellation fires.
pub fn fan_in<T>(cancel_rx: &CancelRx, sources: Vec<StreamRx<T>>) -> StreamRx<T>
where
    T: Send + 'static,
{
    let (tx, rx) = mpsc::channel(DEFAULT_CHANNEL_CAPACITY);
    let source_count = sources.len();

    let mut forwarders = JoinSet::new();
    for mut source in sources {
        let tx = tx.clone();
        let mut task_cancel_rx = cancel_rx.clone();

        forwarders.spawn(async move {
            while let Some(item) = recv_or_cancel(&mut source, &mut task_cancel_rx).await {
                if !send_or_cancel(&tx, item, &mut task_cancel_rx).await {
                    break;
                }
            }
        });
    }
    drop(tx);

    // The supervisor outlives every forwarder, so its task count covers them as well.
    cancel_rx.spawn(async move {
        while let Some(result) = forwarders.join_next().await {
            if let Err(err) = result {
                warn!(error = %err, "fan-in forwarder failed");
            }
        }

        debug!(sources = source_count, "fan-in finished");
    });

    rx
}
