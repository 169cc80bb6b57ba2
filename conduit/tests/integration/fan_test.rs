use std::time::Duration;

use conduit::concurrency::cancel::create_cancel_channel;
use conduit::fan::{fan_in, fan_out};
use conduit::pipeline::{Pipeline, generate, multiplier};
use conduit::test_utils::stream::collect_with_timeout;
use conduit::test_utils::wait::wait_until;
use conduit_telemetry::tracing::init_test_tracing;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn squares_are_complete_regardless_of_order() {
    init_test_tracing();
    let (cancel_tx, cancel_rx) = create_cancel_channel();

    let squares = fan_out(&cancel_rx, generate(&cancel_rx, 1..=5i64, 1), 3, |x| x * x);
    let merged = fan_in(&cancel_rx, squares);

    let mut values = collect_with_timeout(merged, Duration::from_secs(5)).await;
    values.sort_unstable();

    assert_eq!(values, vec![1, 4, 9, 16, 25]);
    wait_until(|| cancel_tx.active_tasks() == 0).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn fan_in_output_feeds_a_pipeline() {
    init_test_tracing();
    let (cancel_tx, cancel_rx) = create_cancel_channel();

    let workers = fan_out(&cancel_rx, generate(&cancel_rx, 0..100i64, 8), 4, |x| x + 1);
    let merged = fan_in(&cancel_rx, workers);

    let mut pipeline = Pipeline::new();
    pipeline.add_stage(multiplier(10));
    let output = pipeline.run(&cancel_rx, merged);

    let mut values = collect_with_timeout(output, Duration::from_secs(5)).await;
    values.sort_unstable();

    let expected: Vec<i64> = (1..=100).map(|x| x * 10).collect();
    assert_eq!(values, expected);
    wait_until(|| cancel_tx.active_tasks() == 0).await;
}
