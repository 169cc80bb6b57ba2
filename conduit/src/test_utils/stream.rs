use std::time::Duration;

use tokio::time::timeout;

use crate::pipeline::StreamRx;

/// Default time allowed for a stream to close.
pub const DEFAULT_COLLECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Receives every item of `rx` until its senders are dropped.
pub async fn collect<T>(mut rx: StreamRx<T>) -> Vec<T> {
    let mut items = Vec::new();
    while let Some(item) = rx.recv().await {
        items.push(item);
    }

    items
}

/// Receives every item of `rx`, bounded by `timeout_duration`.
///
/// # Panics
///
/// Panics if the stream is not closed within `timeout_duration`.
pub async fn collect_with_timeout<T>(rx: StreamRx<T>, timeout_duration: Duration) -> Vec<T> {
    match timeout(timeout_duration, collect(rx)).await {
        Ok(items) => items,
        Err(_) => panic!(
            "Stream was not closed within {timeout_duration:?}. \
             A stage is probably still holding its output sender."
        ),
    }
}
