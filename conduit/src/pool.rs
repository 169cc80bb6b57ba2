//! Fixed-size worker pool pulling jobs from a shared bounded queue.
//!
//! A [`WorkerPool`] moves through [`PoolState::Created`], [`PoolState::Running`],
//! [`PoolState::Stopping`] and [`PoolState::Stopped`]. While running, each worker repeatedly
//! claims a job from the shared queue, hands it to the [`Processor`] and publishes the
//! [`JobResult`] on the shared result queue.
//!
//! Shutdown has two parts: new submissions are rejected and a private shutdown signal tells
//! workers to stop claiming jobs, then [`WorkerPool::stop`] joins every worker before closing
//! the result queue. A job that a worker already claimed always runs to completion. Jobs still
//! waiting in the queue when the shutdown signal fires are dropped.

use std::fmt;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use conduit_config::shared::WorkerPoolConfig;
use metrics::{counter, gauge};
use tokio::sync::{Mutex as AsyncMutex, mpsc};
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::concurrency::cancel::{CancelRx, CancelTx, create_cancel_channel};
use crate::counter::AtomicCounter;
use crate::error::{ConduitError, ConduitResult, ErrorKind};
use crate::metrics::{
    CONDUIT_POOL_ACTIVE_WORKERS, CONDUIT_POOL_JOBS_COMPLETED_TOTAL, CONDUIT_POOL_JOBS_FAILED_TOTAL,
    CONDUIT_POOL_JOBS_SUBMITTED_TOTAL, CONDUIT_POOL_RESULTS_DROPPED_TOTAL, POOL_NAME_LABEL,
};
use crate::{bail, conduit_error};

/// Identifier of a job, echoed back in its [`JobResult`].
pub type JobId = u64;

/// A unit of work submitted to a [`WorkerPool`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Job<P> {
    pub id: JobId,
    pub payload: P,
}

impl<P> Job<P> {
    pub fn new(id: JobId, payload: P) -> Self {
        Self { id, payload }
    }
}

/// Outcome of processing one [`Job`].
///
/// Failures reported by the processor are carried in `output` and never interpreted by the pool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobResult<O, E> {
    pub job_id: JobId,
    pub output: Result<O, E>,
}

impl<O, E> JobResult<O, E> {
    /// Returns `true` if the processor succeeded.
    pub fn is_ok(&self) -> bool {
        self.output.is_ok()
    }
}

/// Processes the jobs of a [`WorkerPool`].
///
/// Implemented for every `Fn(Job<P>) -> impl Future<Output = Result<O, E>>` closure.
///
/// A processor that panics terminates the worker running it. The job yields no result and the
/// panic is reported by [`WorkerPool::stop`].
pub trait Processor<P>: Send + Sync + 'static {
    /// Value produced for a successful job.
    type Output: Send + 'static;
    /// Error produced for a failed job.
    type Error: Send + 'static;

    fn process(
        &self,
        job: Job<P>,
    ) -> impl Future<Output = Result<Self::Output, Self::Error>> + Send;
}

impl<P, F, Fut, O, E> Processor<P> for F
where
    F: Fn(Job<P>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<O, E>> + Send,
    O: Send + 'static,
    E: Send + 'static,
{
    type Output = O;
    type Error = E;

    fn process(&self, job: Job<P>) -> impl Future<Output = Result<O, E>> + Send {
        self(job)
    }
}

/// Lifecycle state of a [`WorkerPool`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoolState {
    /// Jobs can be queued but no worker runs yet.
    Created,
    /// Workers are processing jobs.
    Running,
    /// Shutdown began and workers are being joined.
    Stopping,
    /// Every worker exited and the result queue is closed. Terminal.
    Stopped,
}

impl fmt::Display for PoolState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = match self {
            PoolState::Created => "created",
            PoolState::Running => "running",
            PoolState::Stopping => "stopping",
            PoolState::Stopped => "stopped",
        };
        f.write_str(state)
    }
}

/// Receive side of a pool's result queue.
///
/// Clones share the same queue, so every result is delivered to exactly one receiver.
#[derive(Debug)]
pub struct ResultStream<O, E> {
    rx: Arc<AsyncMutex<mpsc::Receiver<JobResult<O, E>>>>,
}

impl<O, E> ResultStream<O, E> {
    /// Waits for the next result.
    ///
    /// Returns `None` once the pool is stopped and every buffered result was received.
    pub async fn recv(&self) -> Option<JobResult<O, E>> {
        self.rx.lock().await.recv().await
    }

    /// Returns a buffered result without waiting.
    ///
    /// Returns `None` if no result is buffered or another receiver is currently waiting.
    pub fn try_recv(&self) -> Option<JobResult<O, E>> {
        self.rx.try_lock().ok()?.try_recv().ok()
    }
}

impl<O, E> Clone for ResultStream<O, E> {
    fn clone(&self) -> Self {
        Self {
            rx: self.rx.clone(),
        }
    }
}

/// Mutable lifecycle bookkeeping of a [`WorkerPool`].
#[derive(Debug)]
struct PoolInner {
    state: PoolState,
    workers: JoinSet<()>,
}

/// Bounded pool of workers processing [`Job`]s with a shared [`Processor`].
pub struct WorkerPool<P, T: Processor<P>> {
    config: Arc<WorkerPoolConfig>,
    processor: Arc<T>,
    inner: Mutex<PoolInner>,
    jobs_tx: Mutex<Option<mpsc::Sender<Job<P>>>>,
    jobs_rx: Arc<AsyncMutex<mpsc::Receiver<Job<P>>>>,
    results_tx: Mutex<Option<mpsc::Sender<JobResult<T::Output, T::Error>>>>,
    results: ResultStream<T::Output, T::Error>,
    shutdown_tx: CancelTx,
    stopped_tx: CancelTx,
    active_workers: Arc<AtomicCounter>,
}

impl<P, T> WorkerPool<P, T>
where
    P: Send + 'static,
    T: Processor<P>,
{
    /// Creates a pool in the [`PoolState::Created`] state.
    ///
    /// Returns [`ErrorKind::ConfigError`] if `config` is invalid.
    pub fn new(config: WorkerPoolConfig, processor: T) -> ConduitResult<Self> {
        config.validate()?;

        let (jobs_tx, jobs_rx) = mpsc::channel(config.queue_capacity);
        let (results_tx, results_rx) = mpsc::channel(config.result_capacity);
        let (shutdown_tx, _) = create_cancel_channel();
        let (stopped_tx, _) = create_cancel_channel();

        Ok(Self {
            config: Arc::new(config),
            processor: Arc::new(processor),
            inner: Mutex::new(PoolInner {
                state: PoolState::Created,
                workers: JoinSet::new(),
            }),
            jobs_tx: Mutex::new(Some(jobs_tx)),
            jobs_rx: Arc::new(AsyncMutex::new(jobs_rx)),
            results_tx: Mutex::new(Some(results_tx)),
            results: ResultStream {
                rx: Arc::new(AsyncMutex::new(results_rx)),
            },
            shutdown_tx,
            stopped_tx,
            active_workers: Arc::new(AtomicCounter::new()),
        })
    }

    /// Returns the name of the pool.
    pub fn name(&self) -> &str {
        &self.config.name
    }

    /// Returns the current lifecycle state.
    pub fn state(&self) -> PoolState {
        lock(&self.inner).state
    }

    /// Returns the number of workers currently running.
    pub fn active_workers(&self) -> i64 {
        self.active_workers.value()
    }

    /// Spawns the configured number of workers.
    ///
    /// Returns [`ErrorKind::InvalidState`] unless the pool is in [`PoolState::Created`].
    pub fn start(&self) -> ConduitResult<()> {
        let mut inner = lock(&self.inner);
        if inner.state != PoolState::Created {
            bail!(
                ErrorKind::InvalidState,
                "Worker pool can only be started once",
                format!("pool={}, state={}", self.config.name, inner.state)
            );
        }

        let Some(results_tx) = lock(&self.results_tx).clone() else {
            bail!(
                ErrorKind::InvalidState,
                "Worker pool result queue is closed",
                format!("pool={}", self.config.name)
            );
        };

        for worker_id in 0..self.config.num_workers {
            let worker = Worker {
                id: worker_id,
                pool_name: self.config.name.clone(),
                processor: self.processor.clone(),
                jobs_rx: self.jobs_rx.clone(),
                results_tx: results_tx.clone(),
                shutdown_rx: self.shutdown_tx.subscribe(),
                active_workers: self.active_workers.clone(),
            };
            inner.workers.spawn(worker.run());
        }
        inner.state = PoolState::Running;

        info!(
            pool = %self.config.name,
            workers = self.config.num_workers,
            queue_capacity = self.config.queue_capacity,
            "worker pool started"
        );

        Ok(())
    }

    /// Enqueues `job`, waiting while the queue is full.
    ///
    /// Jobs submitted before [`WorkerPool::start`] wait in the queue. Returns
    /// [`ErrorKind::PoolStopped`] once [`WorkerPool::stop`] has begun, including for submitters
    /// that were waiting on a full queue at that moment.
    pub async fn submit(&self, job: Job<P>) -> ConduitResult<()> {
        let job_id = job.id;
        let Some(jobs_tx) = lock(&self.jobs_tx).clone() else {
            return Err(self.stopped_error(job_id));
        };

        let mut shutdown_rx = self.shutdown_tx.subscribe();
        let sent = tokio::select! {
            biased;

            _ = shutdown_rx.cancelled() => false,
            result = jobs_tx.send(job) => result.is_ok(),
        };

        if !sent {
            return Err(self.stopped_error(job_id));
        }

        counter!(
            CONDUIT_POOL_JOBS_SUBMITTED_TOTAL,
            POOL_NAME_LABEL => self.config.name.clone()
        )
        .increment(1);
        debug!(pool = %self.config.name, job_id, "job submitted");

        Ok(())
    }

    /// Returns a handle to the result queue.
    pub fn results(&self) -> ResultStream<T::Output, T::Error> {
        self.results.clone()
    }

    /// Stops the pool and waits for every worker to exit.
    ///
    /// Rejects further submissions, signals workers to stop claiming jobs, joins them and
    /// closes the result queue. Buffered results remain receivable. A call overlapping an
    /// ongoing stop waits for that stop to complete and returns `Ok(())`, so no result is
    /// produced after any call returned. If the ongoing stop is dropped before completing,
    /// overlapping calls never return.
    ///
    /// Workers that panicked are reported together as [`ErrorKind::WorkerPanic`] errors after
    /// every worker was joined.
    pub async fn stop(&self) -> ConduitResult<()> {
        let workers = {
            let mut inner = lock(&self.inner);
            match inner.state {
                PoolState::Created | PoolState::Running => {
                    inner.state = PoolState::Stopping;
                    Some(std::mem::take(&mut inner.workers))
                }
                PoolState::Stopping | PoolState::Stopped => None,
            }
        };

        let Some(mut workers) = workers else {
            debug!(pool = %self.config.name, "waiting for ongoing worker pool stop");
            self.stopped_tx.subscribe().cancelled().await;
            return Ok(());
        };

        info!(pool = %self.config.name, "stopping worker pool");

        lock(&self.jobs_tx).take();
        self.shutdown_tx.cancel();

        let mut errors: Vec<ConduitError> = Vec::new();
        while let Some(result) = workers.join_next().await {
            if let Err(join_err) = result {
                if join_err.is_cancelled() {
                    debug!(pool = %self.config.name, "worker task was cancelled");
                } else {
                    error!(pool = %self.config.name, error = %join_err, "worker panicked");
                    errors.push(conduit_error!(
                        ErrorKind::WorkerPanic,
                        "Worker pool worker panicked",
                        join_err
                    ));
                }
            }
        }

        let dropped_jobs = {
            let mut jobs_rx = self.jobs_rx.lock().await;
            jobs_rx.close();
            let mut dropped = 0usize;
            while jobs_rx.try_recv().is_ok() {
                dropped += 1;
            }
            dropped
        };
        if dropped_jobs > 0 {
            warn!(pool = %self.config.name, dropped_jobs, "dropped queued jobs on shutdown");
        }

        lock(&self.results_tx).take();
        lock(&self.inner).state = PoolState::Stopped;
        self.stopped_tx.cancel();

        info!(pool = %self.config.name, "worker pool stopped");

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors.into())
        }
    }

    fn stopped_error(&self, job_id: JobId) -> ConduitError {
        conduit_error!(
            ErrorKind::PoolStopped,
            "Job submitted to a stopped worker pool",
            format!("pool={}, job_id={job_id}", self.config.name)
        )
    }
}

impl<P, T: Processor<P>> Drop for WorkerPool<P, T> {
    fn drop(&mut self) {
        // Workers of a pool dropped without stop exit at their next claim.
        self.shutdown_tx.cancel();
    }
}

impl<P, T: Processor<P>> fmt::Debug for WorkerPool<P, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkerPool")
            .field("config", &self.config)
            .field("active_workers", &self.active_workers.value())
            .finish()
    }
}

/// State moved into a single worker task.
struct Worker<P, T: Processor<P>> {
    id: usize,
    pool_name: String,
    processor: Arc<T>,
    jobs_rx: Arc<AsyncMutex<mpsc::Receiver<Job<P>>>>,
    results_tx: mpsc::Sender<JobResult<T::Output, T::Error>>,
    shutdown_rx: CancelRx,
    active_workers: Arc<AtomicCounter>,
}

impl<P, T> Worker<P, T>
where
    P: Send + 'static,
    T: Processor<P>,
{
    async fn run(mut self) {
        let _active = ActiveWorker::new(self.active_workers.clone(), self.pool_name.clone());
        debug!(pool = %self.pool_name, worker_id = self.id, "worker started");

        loop {
            let job = tokio::select! {
                biased;

                _ = self.shutdown_rx.cancelled() => break,
                job = recv_job(&self.jobs_rx) => job,
            };

            let Some(job) = job else {
                break;
            };

            let job_id = job.id;
            let output = self.processor.process(job).await;
            let metric = if output.is_ok() {
                CONDUIT_POOL_JOBS_COMPLETED_TOTAL
            } else {
                CONDUIT_POOL_JOBS_FAILED_TOTAL
            };
            counter!(metric, POOL_NAME_LABEL => self.pool_name.clone()).increment(1);

            let result = JobResult { job_id, output };
            let published = tokio::select! {
                biased;

                sent = self.results_tx.send(result) => sent.is_ok(),
                _ = self.shutdown_rx.cancelled() => false,
            };

            if !published {
                counter!(
                    CONDUIT_POOL_RESULTS_DROPPED_TOTAL,
                    POOL_NAME_LABEL => self.pool_name.clone()
                )
                .increment(1);
                warn!(
                    pool = %self.pool_name,
                    worker_id = self.id,
                    job_id,
                    "result dropped because the pool is stopping"
                );
                break;
            }
        }

        debug!(pool = %self.pool_name, worker_id = self.id, "worker exited");
    }
}

async fn recv_job<P>(jobs_rx: &AsyncMutex<mpsc::Receiver<Job<P>>>) -> Option<Job<P>> {
    jobs_rx.lock().await.recv().await
}

/// Counts a running worker and mirrors the count into the active workers gauge.
struct ActiveWorker {
    counter: Arc<AtomicCounter>,
    pool_name: String,
}

impl ActiveWorker {
    fn new(counter: Arc<AtomicCounter>, pool_name: String) -> Self {
        let active = counter.increment();
        gauge!(CONDUIT_POOL_ACTIVE_WORKERS, POOL_NAME_LABEL => pool_name.clone())
            .set(active as f64);

        Self { counter, pool_name }
    }
}

impl Drop for ActiveWorker {
    fn drop(&mut self) {
        let active = self.counter.decrement();
        gauge!(CONDUIT_POOL_ACTIVE_WORKERS, POOL_NAME_LABEL => self.pool_name.clone())
            .set(active as f64);
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
