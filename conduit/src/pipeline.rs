//! Composable streaming stages connected by bounded channels.
//!
//! Every generator and stage runs as its own task spawned through [`CancelRx::spawn`]. A task
//! ends and drops its output sender, which closes the stream downstream, as soon as its input
//! is exhausted, its consumer is gone, or the cancellation signal fires. Receiving and sending
//! are both raced against the signal with cancellation preferred, so a blocked stage never
//! outlives a cancelled pipeline.
//!
//! Within a linear chain of stages items keep their order.

use std::future::Future;
use std::ops::Mul;
use std::sync::Arc;

use conduit_config::shared::PipelineConfig;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, trace};

use crate::concurrency::cancel::CancelRx;
use crate::concurrency::stream::CancellableStream;

/// Receiving end of a stream produced by a generator or a stage.
pub type StreamRx<T> = mpsc::Receiver<T>;

/// Channel capacity used when none is given.
pub const DEFAULT_CHANNEL_CAPACITY: usize = PipelineConfig::DEFAULT_CHANNEL_CAPACITY;

/// Receives the next item unless cancellation fires first.
///
/// Returns `None` when the input is exhausted or the pipeline is cancelled.
pub(crate) async fn recv_or_cancel<T>(
    input: &mut StreamRx<T>,
    cancel_rx: &mut CancelRx,
) -> Option<T> {
    tokio::select! {
        biased;

        _ = cancel_rx.cancelled() => None,
        item = input.recv() => item,
    }
}

/// Sends `item` unless cancellation fires first.
///
/// Returns `false` when the pipeline is cancelled or the receiver was dropped, in which case
/// the caller must stop producing.
pub(crate) async fn send_or_cancel<T>(
    output: &mpsc::Sender<T>,
    item: T,
    cancel_rx: &mut CancelRx,
) -> bool {
    tokio::select! {
        biased;

        _ = cancel_rx.cancelled() => false,
        sent = output.send(item) => sent.is_ok(),
    }
}

/// Publishes every item of `iter` on a new stream.
///
/// `iter` may be infinite, in which case the producer runs until cancellation fires or the
/// stream is dropped.
pub fn generate<I>(cancel_rx: &CancelRx, iter: I, capacity: usize) -> StreamRx<I::Item>
where
    I: IntoIterator + Send + 'static,
    I::IntoIter: Send,
    I::Item: Send + 'static,
{
    let (tx, rx) = mpsc::channel(capacity.max(1));
    let mut task_cancel_rx = cancel_rx.clone();

    cancel_rx.spawn(async move {
        let mut produced = 0usize;
        for item in iter {
            if !send_or_cancel(&tx, item, &mut task_cancel_rx).await {
                debug!(produced, "generator stopped early");
                return;
            }
            produced += 1;
        }

        trace!(produced, "generator exhausted");
    });

    rx
}

/// Publishes the integers `0..n` on a new stream.
pub fn generator(cancel_rx: &CancelRx, n: i64) -> StreamRx<i64> {
    generate(cancel_rx, 0..n, DEFAULT_CHANNEL_CAPACITY)
}

/// Applies `f` to every item of `input`.
pub fn map_stream<T, R, F>(
    cancel_rx: &CancelRx,
    mut input: StreamRx<T>,
    capacity: usize,
    f: F,
) -> StreamRx<R>
where
    T: Send + 'static,
    R: Send + 'static,
    F: Fn(T) -> R + Send + 'static,
{
    let (tx, rx) = mpsc::channel(capacity.max(1));
    let mut task_cancel_rx = cancel_rx.clone();

    cancel_rx.spawn(async move {
        while let Some(item) = recv_or_cancel(&mut input, &mut task_cancel_rx).await {
            if !send_or_cancel(&tx, f(item), &mut task_cancel_rx).await {
                break;
            }
        }
    });

    rx
}

/// Applies the asynchronous `f` to every item of `input`, one item at a time.
///
/// The future returned by `f` is raced against cancellation as well, so a slow item does not
/// delay shutdown.
pub fn then_stream<T, R, F, Fut>(
    cancel_rx: &CancelRx,
    mut input: StreamRx<T>,
    capacity: usize,
    f: F,
) -> StreamRx<R>
where
    T: Send + 'static,
    R: Send + 'static,
    F: Fn(T) -> Fut + Send + 'static,
    Fut: Future<Output = R> + Send + 'static,
{
    let (tx, rx) = mpsc::channel(capacity.max(1));
    let mut task_cancel_rx = cancel_rx.clone();

    cancel_rx.spawn(async move {
        while let Some(item) = recv_or_cancel(&mut input, &mut task_cancel_rx).await {
            let output = tokio::select! {
                biased;

                _ = task_cancel_rx.cancelled() => break,
                output = f(item) => output,
            };

            if !send_or_cancel(&tx, output, &mut task_cancel_rx).await {
                break;
            }
        }
    });

    rx
}

/// Forwards the items of `input` for which `predicate` returns `true`.
pub fn filter_stream<T, F>(
    cancel_rx: &CancelRx,
    mut input: StreamRx<T>,
    capacity: usize,
    predicate: F,
) -> StreamRx<T>
where
    T: Send + 'static,
    F: Fn(&T) -> bool + Send + 'static,
{
    let (tx, rx) = mpsc::channel(capacity.max(1));
    let mut task_cancel_rx = cancel_rx.clone();

    cancel_rx.spawn(async move {
        while let Some(item) = recv_or_cancel(&mut input, &mut task_cancel_rx).await {
            if !predicate(&item) {
                continue;
            }

            if !send_or_cancel(&tx, item, &mut task_cancel_rx).await {
                break;
            }
        }
    });

    rx
}

/// Wraps a stream receiver into a [`futures::Stream`] that ends once cancellation fires.
pub fn into_stream<T>(
    cancel_rx: &CancelRx,
    rx: StreamRx<T>,
) -> CancellableStream<ReceiverStream<T>> {
    CancellableStream::wrap(ReceiverStream::new(rx), cancel_rx.clone())
}

/// A transformation from one stream of `T` to another.
///
/// Implementations spawn their work and return the output stream immediately. The output must
/// be closed once the input is exhausted or `cancel_rx` fires.
pub trait Stage<T>: Send + Sync {
    fn spawn(&self, cancel_rx: CancelRx, input: StreamRx<T>, capacity: usize) -> StreamRx<T>;
}

impl<T, F> Stage<T> for F
where
    F: Fn(CancelRx, StreamRx<T>, usize) -> StreamRx<T> + Send + Sync,
{
    fn spawn(&self, cancel_rx: CancelRx, input: StreamRx<T>, capacity: usize) -> StreamRx<T> {
        self(cancel_rx, input, capacity)
    }
}

/// Stage applying `f` to every item.
pub fn map<T, F>(f: F) -> impl Stage<T>
where
    T: Send + 'static,
    F: Fn(T) -> T + Send + Sync + 'static,
{
    let f = Arc::new(f);
    move |cancel_rx: CancelRx, input: StreamRx<T>, capacity: usize| {
        let f = f.clone();
        map_stream(&cancel_rx, input, capacity, move |item| f(item))
    }
}

/// Stage applying the asynchronous `f` to every item.
pub fn then<T, F, Fut>(f: F) -> impl Stage<T>
where
    T: Send + 'static,
    F: Fn(T) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = T> + Send + 'static,
{
    let f = Arc::new(f);
    move |cancel_rx: CancelRx, input: StreamRx<T>, capacity: usize| {
        let f = f.clone();
        then_stream(&cancel_rx, input, capacity, move |item| f(item))
    }
}

/// Stage multiplying every item by `factor`.
pub fn multiplier<T>(factor: T) -> impl Stage<T>
where
    T: Mul<Output = T> + Copy + Send + Sync + 'static,
{
    map(move |item: T| item * factor)
}

/// Stage dropping the items for which `predicate` returns `false`.
pub fn filter<T, F>(predicate: F) -> impl Stage<T>
where
    T: Send + 'static,
    F: Fn(&T) -> bool + Send + Sync + 'static,
{
    let predicate = Arc::new(predicate);
    move |cancel_rx: CancelRx, input: StreamRx<T>, capacity: usize| {
        let predicate = predicate.clone();
        filter_stream(&cancel_rx, input, capacity, move |item: &T| predicate(item))
    }
}

/// Ordered sequence of stages.
///
/// [`Pipeline::run`] connects the stages registered so far in registration order. Stages added
/// afterwards only affect later runs.
pub struct Pipeline<T> {
    stages: Vec<Box<dyn Stage<T>>>,
    capacity: usize,
}

impl<T> Pipeline<T>
where
    T: Send + 'static,
{
    /// Creates an empty pipeline with [`DEFAULT_CHANNEL_CAPACITY`] between stages.
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CHANNEL_CAPACITY)
    }

    /// Creates an empty pipeline with `capacity` items buffered between stages.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            stages: Vec::new(),
            capacity: capacity.max(1),
        }
    }

    /// Creates an empty pipeline from `config`.
    pub fn from_config(config: &PipelineConfig) -> Self {
        Self::with_capacity(config.channel_capacity)
    }

    /// Appends `stage` to the pipeline.
    pub fn add_stage<S>(&mut self, stage: S) -> &mut Self
    where
        S: Stage<T> + 'static,
    {
        self.stages.push(Box::new(stage));
        self
    }

    /// Returns the number of stages.
    pub fn len(&self) -> usize {
        self.stages.len()
    }

    /// Returns `true` if the pipeline has no stages.
    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// Returns the channel capacity between stages.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Connects every stage to its predecessor, starting from `input`, and returns the output
    /// of the last stage.
    ///
    /// With no stages `input` is returned unchanged.
    pub fn run(&self, cancel_rx: &CancelRx, input: StreamRx<T>) -> StreamRx<T> {
        debug!(stages = self.stages.len(), capacity = self.capacity, "running pipeline");

        self.stages.iter().fold(input, |stream, stage| {
            stage.spawn(cancel_rx.clone(), stream, self.capacity)
        })
    }
}

impl<T> Default for Pipeline<T>
where
    T: Send + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}
