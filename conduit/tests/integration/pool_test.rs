use std::collections::HashMap;
use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use conduit::counter::AtomicCounter;
use conduit::pool::{Job, PoolState, WorkerPool};
use conduit::test_utils::wait::wait_until;
use conduit_config::shared::WorkerPoolConfig;
use conduit_telemetry::tracing::init_test_tracing;
use tokio::task::JoinSet;
use tokio::time::Instant;

fn pool_config(name: &str, num_workers: usize) -> WorkerPoolConfig {
    WorkerPoolConfig {
        name: name.to_string(),
        ..WorkerPoolConfig::with_workers(num_workers)
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn doubled_ids_are_returned_once_per_job() {
    init_test_tracing();
    let pool = WorkerPool::new(pool_config("doubler", 2), |job: Job<u64>| async move {
        Ok::<_, Infallible>(job.id * 2)
    })
    .unwrap();
    pool.start().unwrap();

    for id in 0..5 {
        pool.submit(Job::new(id, ())).await.unwrap();
    }

    let results = pool.results();
    let mut outputs = HashMap::new();
    for _ in 0..5 {
        let result = results.recv().await.unwrap();
        assert!(outputs.insert(result.job_id, result.output.unwrap()).is_none());
    }

    pool.stop().await.unwrap();
    assert!(results.recv().await.is_none());
    assert_eq!(
        outputs,
        HashMap::from([(0, 0), (1, 2), (2, 4), (3, 6), (4, 8)])
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn four_workers_overlap_slow_jobs() {
    init_test_tracing();
    let pool = WorkerPool::new(pool_config("sleeper", 4), |job: Job<()>| async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        Ok::<_, Infallible>(job.id)
    })
    .unwrap();
    pool.start().unwrap();

    let start = Instant::now();
    for id in 0..4 {
        pool.submit(Job::new(id, ())).await.unwrap();
    }
    let results = pool.results();
    for _ in 0..4 {
        results.recv().await.unwrap();
    }
    let elapsed = start.elapsed();

    pool.stop().await.unwrap();
    assert!(elapsed < Duration::from_millis(150), "took {elapsed:?}");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_submitters_and_consumers_see_every_job() {
    init_test_tracing();
    const SUBMITTERS: u64 = 8;
    const JOBS_PER_SUBMITTER: u64 = 50;
    const TOTAL: u64 = SUBMITTERS * JOBS_PER_SUBMITTER;

    let config = WorkerPoolConfig {
        name: "contended".to_string(),
        num_workers: 3,
        queue_capacity: 4,
        result_capacity: 4,
    };
    let pool = Arc::new(
        WorkerPool::new(config, |job: Job<u64>| async move {
            Ok::<_, Infallible>(job.payload + 1)
        })
        .unwrap(),
    );
    pool.start().unwrap();

    let received = Arc::new(AtomicCounter::new());
    let mut consumers = JoinSet::new();
    for _ in 0..2 {
        let results = pool.results();
        let received = received.clone();
        consumers.spawn(async move {
            let mut seen = Vec::new();
            while let Some(result) = results.recv().await {
                seen.push((result.job_id, result.output.unwrap()));
                received.increment();
            }
            seen
        });
    }

    let mut submitters = JoinSet::new();
    for submitter in 0..SUBMITTERS {
        let pool = pool.clone();
        submitters.spawn(async move {
            for n in 0..JOBS_PER_SUBMITTER {
                let id = submitter * JOBS_PER_SUBMITTER + n;
                pool.submit(Job::new(id, id)).await.unwrap();
            }
        });
    }
    while let Some(result) = submitters.join_next().await {
        result.unwrap();
    }

    // Queued jobs are dropped at stop, so wait for every result first.
    wait_until(|| received.value() == TOTAL as i64).await;
    pool.stop().await.unwrap();

    let mut seen = Vec::new();
    while let Some(result) = consumers.join_next().await {
        seen.extend(result.unwrap());
    }
    seen.sort_unstable();

    let expected: Vec<_> = (0..TOTAL).map(|id| (id, id + 1)).collect();
    assert_eq!(seen, expected);
    assert_eq!(pool.state(), PoolState::Stopped);
    assert_eq!(pool.active_workers(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn pool_gates_requests_and_correlates_responses() {
    init_test_tracing();
    let pool = Arc::new(
        WorkerPool::new(pool_config("requests", 2), |job: Job<String>| async move {
            if job.payload.is_empty() {
                return Err("empty request".to_string());
            }
            Ok(job.payload.to_uppercase())
        })
        .unwrap(),
    );
    pool.start().unwrap();

    let requests = ["alpha", "", "gamma"];
    for (id, request) in requests.iter().enumerate() {
        pool.submit(Job::new(id as u64, request.to_string()))
            .await
            .unwrap();
    }

    let results = pool.results();
    let mut responses = HashMap::new();
    for _ in 0..requests.len() {
        let result = results.recv().await.unwrap();
        responses.insert(result.job_id, result.output);
    }
    pool.stop().await.unwrap();

    assert_eq!(responses[&0], Ok("ALPHA".to_string()));
    assert_eq!(responses[&1], Err("empty request".to_string()));
    assert_eq!(responses[&2], Ok("GAMMA".to_string()));
}
