//! Single-flight read-through cache decorator.
//!
//! Wraps a [`CacheStore`] so that at most one computation per key runs at
//! a time: concurrent callers for the same key block on the first caller's
//! computation instead of each missing the cache and hitting the record
//! store (the classic cache-stampede failure under bursty identical map
//! queries). Callers for different keys never block each other.
//!
//! Cache transport failures are absorbed: a failed `get` or `put` logs a
//! warning and the caller's computation proceeds uncached.

use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;

use tokio::sync::Mutex;

use crate::CacheStore;

/// Per-key computation guard over a shared cache backend.
pub struct SingleFlightCache {
    store: Arc<dyn CacheStore>,
    locks: std::sync::Mutex<BTreeMap<String, Arc<Mutex<()>>>>,
}

impl SingleFlightCache {
    /// Wraps the given cache backend.
    #[must_use]
    pub fn new(store: Arc<dyn CacheStore>) -> Self {
        Self {
            store,
            locks: std::sync::Mutex::new(BTreeMap::new()),
        }
    }

    /// The wrapped backend.
    #[must_use]
    pub fn store(&self) -> &Arc<dyn CacheStore> {
        &self.store
    }

    /// Returns the cached value for `key`, or runs `compute` and caches
    /// its result.
    ///
    /// Holds a per-key guard across the lookup/compute/store sequence, so
    /// a burst of identical keys computes once. Cache errors are logged
    /// and treated as misses; only `compute`'s own error propagates.
    ///
    /// # Errors
    ///
    /// Returns whatever error `compute` returns.
    pub async fn get_or_compute<E, F, Fut>(&self, key: &str, compute: F) -> Result<String, E>
    where
        F: FnOnce() -> Fut + Send,
        Fut: Future<Output = Result<String, E>> + Send,
    {
        let guard = self.key_lock(key);
        let held = guard.lock().await;

        let cached = match self.store.get(key).await {
            Ok(value) => value,
            Err(e) => {
                log::warn!("Cache read failed for {key}: {e}");
                None
            }
        };

        let result = if let Some(value) = cached {
            Ok(value)
        } else {
            match compute().await {
                Ok(value) => {
                    if let Err(e) = self.store.put(key, value.clone()).await {
                        log::warn!("Cache write failed for {key}: {e}");
                    }
                    Ok(value)
                }
                Err(e) => Err(e),
            }
        };

        drop(held);
        self.release_key_lock(key, &guard);
        result
    }

    fn key_lock(&self, key: &str) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        locks
            .entry(key.to_owned())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    fn release_key_lock(&self, key: &str, guard: &Arc<Mutex<()>>) {
        let mut locks = self.locks.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        // Two strong refs left (map + ours) means no other caller holds or
        // awaits this key's guard, so the entry can be dropped.
        if Arc::strong_count(guard) <= 2 {
            locks.remove(key);
        }
    }
}

impl std::fmt::Debug for SingleFlightCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SingleFlightCache").finish_non_exhaustive()
    }
}
