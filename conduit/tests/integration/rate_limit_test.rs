use std::time::Duration;

use conduit::concurrency::cancel::create_cancel_channel;
use conduit::error::ErrorKind;
use conduit::rate_limit::RateLimiter;
use conduit::test_utils::wait::wait_until;
use conduit_telemetry::tracing::init_test_tracing;
use tokio::time::Instant;

#[tokio::test]
async fn burst_is_served_immediately_then_refilled_over_time() {
    init_test_tracing();
    let limiter = RateLimiter::new(10, 3);

    for _ in 0..3 {
        assert!(limiter.try_acquire());
    }
    assert!(!limiter.try_acquire());

    // One token every 100ms.
    let start = Instant::now();
    limiter.acquire().await;
    assert!(start.elapsed() >= Duration::from_millis(50));
}

#[tokio::test]
async fn refill_never_exceeds_burst() {
    init_test_tracing();
    let limiter = RateLimiter::new(1000, 2);

    assert!(limiter.try_acquire());
    wait_until(|| limiter.available() == 2).await;

    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(limiter.available(), 2);
}

#[tokio::test]
async fn cancellation_interrupts_a_waiting_acquire() {
    init_test_tracing();
    let limiter = RateLimiter::new(1, 1);
    let (cancel_tx, mut cancel_rx) = create_cancel_channel();

    limiter.acquire().await;
    cancel_tx.cancel();

    let err = limiter
        .acquire_cancellable(&mut cancel_rx)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Cancelled);
}
