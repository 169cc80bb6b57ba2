use std::time::Duration;

use conduit::concurrency::cancel::create_cancel_channel;
use conduit::pipeline::{
    Pipeline, filter, generator, into_stream, map, map_stream, multiplier, then,
};
use conduit::test_utils::stream::collect_with_timeout;
use conduit::test_utils::wait::wait_until;
use conduit_telemetry::tracing::init_test_tracing;
use futures::StreamExt;

#[tokio::test]
async fn multiplier_preserves_generator_order() {
    init_test_tracing();
    let (cancel_tx, cancel_rx) = create_cancel_channel();

    let mut pipeline = Pipeline::new();
    pipeline.add_stage(multiplier(2));

    let output = pipeline.run(&cancel_rx, generator(&cancel_rx, 5));
    let values = collect_with_timeout(output, Duration::from_secs(5)).await;

    assert_eq!(values, vec![0, 2, 4, 6, 8]);
    wait_until(|| cancel_tx.active_tasks() == 0).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn cancelling_a_slow_pipeline_stops_every_stage() {
    init_test_tracing();
    let (cancel_tx, cancel_rx) = create_cancel_channel();

    let mut pipeline = Pipeline::new();
    pipeline.add_stage(then(|x: i64| async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        x
    }));

    let output = pipeline.run(&cancel_rx, generator(&cancel_rx, 100));
    let _timer = cancel_tx.cancel_after(Duration::from_millis(100));

    let values = collect_with_timeout(output, Duration::from_secs(5)).await;

    assert!(values.len() < 100, "collected {} items", values.len());
    wait_until(|| cancel_tx.active_tasks() == 0).await;
}

#[tokio::test]
async fn stages_run_in_registration_order() {
    init_test_tracing();
    let (_cancel_tx, cancel_rx) = create_cancel_channel();

    let mut pipeline = Pipeline::with_capacity(4);
    pipeline
        .add_stage(map(|x: i64| x + 1))
        .add_stage(multiplier(3))
        .add_stage(filter(|x: &i64| x % 2 == 0));
    assert_eq!(pipeline.len(), 3);

    let output = pipeline.run(&cancel_rx, generator(&cancel_rx, 6));
    let values = collect_with_timeout(output, Duration::from_secs(5)).await;

    assert_eq!(values, vec![6, 12, 18]);
}

#[tokio::test]
async fn typed_stages_compose_with_stream_consumers() {
    init_test_tracing();
    let (_cancel_tx, cancel_rx) = create_cancel_channel();

    let labels = map_stream(&cancel_rx, generator(&cancel_rx, 3), 1, |x| format!("item-{x}"));
    let labels: Vec<String> = into_stream(&cancel_rx, labels).collect().await;

    assert_eq!(labels, vec!["item-0", "item-1", "item-2"]);
}

#[tokio::test]
async fn empty_pipeline_forwards_its_input() {
    init_test_tracing();
    let (_cancel_tx, cancel_rx) = create_cancel_channel();

    let pipeline = Pipeline::<i64>::default();
    assert!(pipeline.is_empty());

    let output = pipeline.run(&cancel_rx, generator(&cancel_rx, 3));
    let values = collect_with_timeout(output, Duration::from_secs(5)).await;

    assert_eq!(values, vec![0, 1, 2]);
}
