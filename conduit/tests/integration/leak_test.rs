use std::convert::Infallible;
use std::time::Duration;

use conduit::concurrency::cancel::create_cancel_channel;
use conduit::fan::{fan_in, fan_out};
use conduit::pipeline::{Pipeline, generate, map};
use conduit::pool::{Job, WorkerPool};
use conduit::test_utils::wait::wait_until;
use conduit_config::shared::WorkerPoolConfig;
use conduit_telemetry::tracing::init_test_tracing;
use tokio::runtime::Handle;

fn alive_tasks() -> usize {
    Handle::current().metrics().num_alive_tasks()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn stopped_pools_leave_no_tasks_behind() {
    init_test_tracing();
    let baseline = alive_tasks();

    for round in 0..5u64 {
        let pool = WorkerPool::new(
            WorkerPoolConfig::with_workers(4),
            |job: Job<u64>| async move {
                tokio::time::sleep(Duration::from_millis(1)).await;
                Ok::<_, Infallible>(job.payload)
            },
        )
        .unwrap();
        pool.start().unwrap();
        wait_until(|| pool.active_workers() == 4).await;
        assert_eq!(alive_tasks(), baseline + 4);

        for id in 0..10 {
            pool.submit(Job::new(id, round)).await.unwrap();
        }
        let results = pool.results();
        for _ in 0..10 {
            assert_eq!(results.recv().await.unwrap().output, Ok(round));
        }

        pool.stop().await.unwrap();
        wait_until(|| alive_tasks() == baseline).await;
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn dropping_a_running_pool_releases_its_workers() {
    init_test_tracing();
    let baseline = alive_tasks();

    let pool = WorkerPool::new(
        WorkerPoolConfig::with_workers(3),
        |job: Job<u64>| async move { Ok::<_, Infallible>(job.payload) },
    )
    .unwrap();
    pool.start().unwrap();
    wait_until(|| alive_tasks() == baseline + 3).await;

    drop(pool);
    wait_until(|| alive_tasks() == baseline).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn abandoned_streams_stop_after_cancellation() {
    init_test_tracing();
    let baseline = alive_tasks();
    let (cancel_tx, cancel_rx) = create_cancel_channel();

    // Infinite input whose consumer reads a single item and walks away.
    let workers = fan_out(&cancel_rx, generate(&cancel_rx, 0i64.., 1), 3, |x| x * 2);
    let merged = fan_in(&cancel_rx, workers);

    let mut pipeline = Pipeline::new();
    pipeline.add_stage(map(|x: i64| x + 1));
    let mut output = pipeline.run(&cancel_rx, merged);

    assert!(output.recv().await.is_some());
    assert!(cancel_tx.active_tasks() > 0);

    cancel_tx.cancel();
    wait_until(|| cancel_tx.active_tasks() == 0).await;
    wait_until(|| alive_tasks() == baseline).await;
    drop(output);
}
