use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use conduit::cache::ExpiringCache;
use conduit::concurrency::cancel::create_cancel_channel;
use conduit::test_utils::wait::wait_until;
use conduit_telemetry::tracing::init_test_tracing;
use tokio::task::JoinSet;

#[tokio::test]
async fn entries_expire_after_ttl() {
    init_test_tracing();
    let cache = ExpiringCache::new(Duration::from_millis(100));

    cache.set("k".to_string(), "v".to_string());
    assert_eq!(cache.get(&"k".to_string()), Some("v".to_string()));

    tokio::time::sleep(Duration::from_millis(150)).await;
    assert_eq!(cache.get(&"k".to_string()), None);
}

#[tokio::test]
async fn size_tracks_set_delete_and_clear() {
    init_test_tracing();
    let cache = ExpiringCache::new(Duration::from_secs(60));

    cache.set("a", 1);
    cache.set("b", 2);
    assert_eq!(cache.size(), 2);

    cache.delete(&"a");
    assert_eq!(cache.size(), 1);

    cache.clear();
    assert_eq!(cache.size(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_misses_compute_a_value_once() {
    init_test_tracing();
    let cache = Arc::new(ExpiringCache::new(Duration::from_secs(60)));
    let computations = Arc::new(AtomicUsize::new(0));

    let mut tasks = JoinSet::new();
    for _ in 0..16 {
        let cache = cache.clone();
        let computations = computations.clone();
        tasks.spawn(async move {
            cache.get_or_insert_with("GET /users/1", || {
                computations.fetch_add(1, Ordering::SeqCst);
                "alice".to_string()
            })
        });
    }

    while let Some(result) = tasks.join_next().await {
        assert_eq!(result.unwrap(), "alice");
    }
    assert_eq!(computations.load(Ordering::SeqCst), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn sweeper_removes_expired_entries_until_cancelled() {
    init_test_tracing();
    let cache = Arc::new(ExpiringCache::new(Duration::from_millis(20)));
    let (cancel_tx, cancel_rx) = create_cancel_channel();

    cache.set(1, "one");
    cache.set(2, "two");
    let sweeper = cache
        .clone()
        .spawn_sweeper(Duration::from_millis(10), cancel_rx);

    wait_until(|| cache.size() == 0).await;

    cancel_tx.cancel();
    sweeper.await.unwrap();
    assert_eq!(cancel_tx.active_tasks(), 0);
}
