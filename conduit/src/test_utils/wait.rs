use std::time::Duration;

use tokio::time::Instant;

/// Default time allowed for a condition to hold.
///
/// Most conditions in tests settle within milliseconds, this leaves room for slow CI machines.
pub const DEFAULT_WAIT_TIMEOUT: Duration = Duration::from_secs(5);

/// Interval between two evaluations of the condition.
const POLL_INTERVAL: Duration = Duration::from_millis(5);

/// Polls `condition` until it returns `true`, using [`DEFAULT_WAIT_TIMEOUT`].
///
/// # Panics
///
/// Panics if the condition does not hold before the timeout.
pub async fn wait_until<F>(condition: F)
where
    F: FnMut() -> bool,
{
    wait_until_with_timeout(condition, DEFAULT_WAIT_TIMEOUT).await;
}

/// Polls `condition` until it returns `true` or `timeout_duration` elapses.
///
/// # Panics
///
/// Panics if the condition does not hold before the timeout.
pub async fn wait_until_with_timeout<F>(mut condition: F, timeout_duration: Duration)
where
    F: FnMut() -> bool,
{
    let deadline = Instant::now() + timeout_duration;
    loop {
        if condition() {
            return;
        }

        if Instant::now() >= deadline {
            panic!(
                "Condition did not hold within {timeout_duration:?}. \
                 This likely indicates the expected state was never reached."
            );
        }

        tokio::time::sleep(POLL_INTERVAL).await;
    }
}
