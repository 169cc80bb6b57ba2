/*

Conduit Demo

Runs every conduit primitive once and logs what it observed:
  - an atomic counter shared by many tasks
  - an expiring cache memoizing request fingerprints, with a background sweeper
  - a worker pool processing jobs of random duration
  - a pipeline of generator, map, multiplier and filter stages
  - a fan-out/fan-in squaring stage
  - a counting semaphore gating in-flight requests
  - a token bucket rate limiter

Usage:
    cargo run -p conduit-examples --bin conduit-demo -- \
        --jobs 20 \
        --items 10 \
        --print-metrics

When `--config-dir` is given, configuration is read from `base.*` and `{env}.*` in that
directory, otherwise defaults are used. `APP_`-prefixed environment variables
override file values, e.g. `APP_POOL__NUM_WORKERS=8`.

*/

use std::convert::Infallible;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Duration;

use clap::Parser;
use conduit::cache::ExpiringCache;
use conduit::concurrency::cancel::create_cancel_channel;
use conduit::counter::AtomicCounter;
use conduit::fan::{fan_in, fan_out};
use conduit::pipeline::{Pipeline, filter, generator, into_stream, map, multiplier};
use conduit::pool::{Job, WorkerPool};
use conduit::rate_limit::RateLimiter;
use conduit::semaphore::CountingSemaphore;
use conduit_config::load_config_from_directory;
use conduit_config::shared::ConduitConfig;
use conduit_telemetry::metrics::init_metrics_handle;
use conduit_telemetry::tracing::init_tracing;
use futures::StreamExt;
use rand::Rng;
use tokio::task::JoinSet;
use tokio::time::Instant;
use tracing::{error, info};

/// Conduit demo command line arguments.
#[derive(Debug, Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Directory containing `base` and environment configuration files
    #[arg(long)]
    config_dir: Option<PathBuf>,
    /// Number of jobs submitted to the worker pool
    #[arg(long, default_value = "20")]
    jobs: u64,
    /// Number of items emitted by the pipeline generator
    #[arg(long, default_value = "10")]
    items: i64,
    /// Render the recorded Prometheus metrics before exiting
    #[arg(long)]
    print_metrics: bool,
}

/// Entry point, handles error reporting and process exit.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if let Err(err) = main_impl().await {
        error!("{err:#}");
        std::process::exit(1);
    }

    Ok(())
}

async fn main_impl() -> anyhow::Result<()> {
    // Without `RUST_LOG`, logs `conduit_demo` and `conduit` at info.
    init_tracing("conduit-demo")?;
    let metrics_handle = init_metrics_handle()?;

    let args = Args::parse();

    let config = match &args.config_dir {
        Some(directory) => load_config_from_directory::<ConduitConfig>(directory)?,
        None => ConduitConfig::default(),
    };
    config.validate()?;
    info!(?config, "configuration loaded");

    counter_demo().await?;
    cache_demo(&config).await?;
    pool_demo(&config, args.jobs).await?;
    pipeline_demo(&config, args.items).await;
    fan_demo(&config, args.items).await;
    semaphore_demo(&config).await?;
    rate_limiter_demo(&config).await;

    if args.print_metrics {
        println!("{}", metrics_handle.render());
    }

    info!("demo finished");

    Ok(())
}

async fn counter_demo() -> anyhow::Result<()> {
    let counter = Arc::new(AtomicCounter::new());

    let mut tasks = JoinSet::new();
    for _ in 0..10 {
        let counter = counter.clone();
        tasks.spawn(async move {
            for _ in 0..100 {
                counter.increment();
            }
        });
    }
    while let Some(result) = tasks.join_next().await {
        result?;
    }

    info!(value = counter.value(), "counter demo finished");

    Ok(())
}

async fn cache_demo(config: &ConduitConfig) -> anyhow::Result<()> {
    let cache = Arc::new(ExpiringCache::from_config(&config.cache));
    let (cancel_tx, cancel_rx) = create_cancel_channel();

    let sweeper = config
        .cache
        .sweep_interval()
        .map(|interval| cache.clone().spawn_sweeper(interval, cancel_rx));

    let fingerprints = ["GET /users/1", "GET /users/2", "GET /users/1", "GET /users/1"];
    let mut computed = 0;
    for fingerprint in fingerprints {
        let response = cache.get_or_insert_with(fingerprint.to_string(), || {
            computed += 1;
            format!("response for {fingerprint}")
        });
        info!(fingerprint, %response, "served request");
    }

    info!(
        requests = fingerprints.len(),
        computed,
        cached = cache.size(),
        "cache demo finished"
    );

    cancel_tx.cancel();
    if let Some(sweeper) = sweeper {
        sweeper.await?;
    }

    Ok(())
}

async fn pool_demo(config: &ConduitConfig, jobs: u64) -> anyhow::Result<()> {
    let pool = WorkerPool::new(config.pool.clone(), |job: Job<u64>| async move {
        let millis = rand::thread_rng().gen_range(5..50);
        tokio::time::sleep(Duration::from_millis(millis)).await;
        Ok::<_, Infallible>(job.payload * job.payload)
    })?;
    pool.start()?;

    let results = pool.results();
    let collector = tokio::spawn(async move {
        let mut sum = 0;
        for _ in 0..jobs {
            let Some(result) = results.recv().await else {
                break;
            };
            if let Ok(output) = result.output {
                sum += output;
            }
        }
        sum
    });

    let start = Instant::now();
    for id in 0..jobs {
        pool.submit(Job::new(id, id)).await?;
    }
    let sum = collector.await?;
    pool.stop().await?;

    info!(
        pool = pool.name(),
        jobs,
        sum,
        elapsed_ms = start.elapsed().as_millis() as u64,
        "pool demo finished"
    );

    Ok(())
}

async fn pipeline_demo(config: &ConduitConfig, items: i64) {
    let (_cancel_tx, cancel_rx) = create_cancel_channel();

    let mut pipeline = Pipeline::from_config(&config.pipeline);
    pipeline
        .add_stage(map(|x: i64| x + 1))
        .add_stage(multiplier(2))
        .add_stage(filter(|x: &i64| x % 3 != 0));

    let output = pipeline.run(&cancel_rx, generator(&cancel_rx, items));
    let values: Vec<i64> = into_stream(&cancel_rx, output).collect().await;

    info!(stages = pipeline.len(), ?values, "pipeline demo finished");
}

async fn fan_demo(config: &ConduitConfig, items: i64) {
    let (_cancel_tx, cancel_rx) = create_cancel_channel();

    let squares = fan_out(
        &cancel_rx,
        generator(&cancel_rx, items),
        config.pipeline.fan_out_workers,
        |x| x * x,
    );
    let mut values: Vec<i64> = into_stream(&cancel_rx, fan_in(&cancel_rx, squares))
        .collect()
        .await;
    values.sort_unstable();

    info!(
        workers = config.pipeline.fan_out_workers,
        ?values,
        "fan demo finished"
    );
}

async fn semaphore_demo(config: &ConduitConfig) -> anyhow::Result<()> {
    let semaphore = Arc::new(CountingSemaphore::new(config.max_in_flight));
    let peak = Arc::new(AtomicI64::new(0));
    let in_flight = Arc::new(AtomicCounter::new());

    let mut requests = JoinSet::new();
    for _ in 0..10 {
        let semaphore = semaphore.clone();
        let peak = peak.clone();
        let in_flight = in_flight.clone();
        requests.spawn(async move {
            let _permit = semaphore.acquire_guard().await;
            peak.fetch_max(in_flight.increment(), Ordering::AcqRel);
            tokio::time::sleep(Duration::from_millis(10)).await;
            in_flight.decrement();
        });
    }
    while let Some(result) = requests.join_next().await {
        result?;
    }

    info!(
        limit = semaphore.limit(),
        observed_peak = peak.load(Ordering::Acquire),
        "semaphore demo finished"
    );

    Ok(())
}

async fn rate_limiter_demo(config: &ConduitConfig) {
    let limiter = RateLimiter::from_config(&config.rate_limiter);
    let requests = limiter.burst() * 2;

    let start = Instant::now();
    for _ in 0..requests {
        limiter.acquire().await;
    }

    info!(
        requests,
        burst = limiter.burst(),
        refill_interval_ms = limiter.refill_interval().as_millis() as u64,
        elapsed_ms = start.elapsed().as_millis() as u64,
        "rate limiter demo finished"
    );
}
