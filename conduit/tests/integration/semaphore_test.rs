use std::sync::Arc;
use std::time::Duration;

use conduit::concurrency::cancel::create_cancel_channel;
use conduit::error::ErrorKind;
use conduit::semaphore::CountingSemaphore;
use conduit::test_utils::peak::PeakTracker;
use conduit_telemetry::tracing::init_test_tracing;
use tokio::task::JoinSet;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_holders_never_exceed_limit() {
    init_test_tracing();
    let semaphore = Arc::new(CountingSemaphore::new(2));
    let tracker = Arc::new(PeakTracker::new());

    let mut workers = JoinSet::new();
    for _ in 0..10 {
        let semaphore = semaphore.clone();
        let tracker = tracker.clone();
        workers.spawn(async move {
            semaphore.acquire().await;
            {
                let _active = tracker.enter();
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
            semaphore.release();
        });
    }
    while let Some(result) = workers.join_next().await {
        result.unwrap();
    }

    assert!(tracker.peak() <= 2, "peak was {}", tracker.peak());
    assert!(tracker.peak() >= 1);
    assert_eq!(semaphore.held(), 0);
    assert_eq!(semaphore.available(), 2);
}

#[tokio::test]
async fn try_acquire_does_not_block() {
    init_test_tracing();
    let semaphore = CountingSemaphore::new(1);

    assert!(semaphore.try_acquire());
    assert!(!semaphore.try_acquire());

    semaphore.release();
    assert!(semaphore.try_acquire());
}

#[tokio::test]
async fn cancellation_interrupts_a_blocked_acquire() {
    init_test_tracing();
    let semaphore = CountingSemaphore::new(1);
    let (cancel_tx, mut cancel_rx) = create_cancel_channel();

    semaphore.acquire().await;
    let _timer = cancel_tx.cancel_after(Duration::from_millis(20));

    let err = semaphore
        .acquire_cancellable(&mut cancel_rx)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Cancelled);
    assert_eq!(semaphore.held(), 1);
}
