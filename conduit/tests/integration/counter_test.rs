use std::sync::Arc;

use conduit::counter::AtomicCounter;
use conduit_telemetry::tracing::init_test_tracing;
use tokio::task::JoinSet;

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn concurrent_increments_are_never_lost() {
    init_test_tracing();
    const TASKS: i64 = 100;
    const INCREMENTS: i64 = 1000;

    let counter = Arc::new(AtomicCounter::new());

    let mut tasks = JoinSet::new();
    for _ in 0..TASKS {
        let counter = counter.clone();
        tasks.spawn(async move {
            for _ in 0..INCREMENTS {
                counter.increment();
            }
        });
    }
    while let Some(result) = tasks.join_next().await {
        result.unwrap();
    }

    assert_eq!(counter.value(), TASKS * INCREMENTS);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn balanced_increments_and_decrements_return_to_zero() {
    init_test_tracing();
    let counter = Arc::new(AtomicCounter::new());

    let mut tasks = JoinSet::new();
    for i in 0..20 {
        let counter = counter.clone();
        tasks.spawn(async move {
            for _ in 0..500 {
                if i % 2 == 0 {
                    counter.increment();
                } else {
                    counter.decrement();
                }
            }
        });
    }
    while let Some(result) = tasks.join_next().await {
        result.unwrap();
    }

    assert_eq!(counter.value(), 0);
}
