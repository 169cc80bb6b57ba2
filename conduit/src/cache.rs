use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use conduit_config::shared::CacheConfig;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info};

use crate::concurrency::cancel::CancelRx;

/// Shortest interval between two runs of a background sweeper.
pub const MIN_SWEEP_INTERVAL: Duration = Duration::from_millis(1);

/// A cached value together with the instant after which it is considered absent.
#[derive(Debug, Clone)]
struct CacheEntry<V> {
    value: V,
    expires_at: Instant,
}

impl<V> CacheEntry<V> {
    fn is_live(&self, now: Instant) -> bool {
        now < self.expires_at
    }
}

/// Key-value store whose entries expire after a fixed time to live.
///
/// Every entry receives the same TTL when it is set. Expiry is lazy: an expired entry is
/// reported as absent by [`ExpiringCache::get`] but stays in storage, and is counted by
/// [`ExpiringCache::size`], until [`ExpiringCache::cleanup_expired`] or a background sweeper
/// removes it.
///
/// Lookups share a read lock and mutations take the write lock.
#[derive(Debug)]
pub struct ExpiringCache<K, V> {
    entries: RwLock<HashMap<K, CacheEntry<V>>>,
    ttl: Duration,
}

impl<K, V> ExpiringCache<K, V>
where
    K: Eq + Hash,
    V: Clone,
{
    /// Creates an empty cache applying `ttl` to every entry.
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            ttl,
        }
    }

    /// Creates an empty cache from `config`.
    pub fn from_config(config: &CacheConfig) -> Self {
        Self::new(config.ttl())
    }

    /// Returns the time to live applied to entries.
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Inserts or overwrites `key`, resetting its expiry to now plus the TTL.
    pub fn set(&self, key: K, value: V) {
        let entry = CacheEntry {
            value,
            expires_at: Instant::now() + self.ttl,
        };
        self.write().insert(key, entry);
    }

    /// Returns a clone of the value stored for `key` if it exists and has not expired.
    pub fn get(&self, key: &K) -> Option<V> {
        let now = Instant::now();
        self.read()
            .get(key)
            .filter(|entry| entry.is_live(now))
            .map(|entry| entry.value.clone())
    }

    /// Returns the live value for `key`, or stores and returns the value produced by `f`.
    ///
    /// `f` runs while the write lock is held, so concurrent callers missing the same key
    /// compute the value only once per expiry.
    pub fn get_or_insert_with<F>(&self, key: K, f: F) -> V
    where
        F: FnOnce() -> V,
    {
        let now = Instant::now();
        let mut entries = self.write();
        if let Some(entry) = entries.get(&key)
            && entry.is_live(now)
        {
            return entry.value.clone();
        }

        let value = f();
        entries.insert(
            key,
            CacheEntry {
                value: value.clone(),
                expires_at: now + self.ttl,
            },
        );

        value
    }

    /// Removes `key` whether or not it has expired.
    pub fn delete(&self, key: &K) {
        self.write().remove(key);
    }

    /// Returns the number of stored entries, including expired entries not swept yet.
    pub fn size(&self) -> usize {
        self.read().len()
    }

    /// Removes every entry by swapping in a fresh map.
    pub fn clear(&self) {
        let previous = std::mem::take(&mut *self.write());
        drop(previous);
    }

    /// Removes every expired entry and returns how many were removed.
    pub fn cleanup_expired(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.write();
        let before = entries.len();
        entries.retain(|_, entry| entry.is_live(now));

        before - entries.len()
    }

    // Every mutation is a single map call, so a poisoned map is still consistent.
    fn read(&self) -> RwLockReadGuard<'_, HashMap<K, CacheEntry<V>>> {
        self.entries.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<K, CacheEntry<V>>> {
        self.entries.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<K, V> ExpiringCache<K, V>
where
    K: Eq + Hash + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    /// Spawns a task that calls [`ExpiringCache::cleanup_expired`] every `interval`.
    ///
    /// Intervals shorter than [`MIN_SWEEP_INTERVAL`] are raised to it. The task exits once
    /// `cancel_rx` fires.
    pub fn spawn_sweeper(
        self: Arc<Self>,
        interval: Duration,
        cancel_rx: CancelRx,
    ) -> JoinHandle<()> {
        let interval = interval.max(MIN_SWEEP_INTERVAL);
        let mut task_cancel_rx = cancel_rx.clone();
        cancel_rx.spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    biased;

                    _ = task_cancel_rx.cancelled() => {
                        info!("cache sweeper stopped");
                        return;
                    }
                    _ = ticker.tick() => {
                        let removed = self.cleanup_expired();
                        if removed > 0 {
                            debug!(removed, remaining = self.size(), "swept expired cache entries");
                        }
                    }
                }
            }
        })
    }
}
