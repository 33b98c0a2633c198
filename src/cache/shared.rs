// Shared cache handle and cache-or-fetch facade.
// Wraps a TtlCache behind a mutex so sessions, contexts, and the sweeper can share it.

use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::{Serialize, de::DeserializeOwned};

use crate::error::Result;

use super::stats::{CacheReport, CacheStatistics};
use super::store::{CacheOptions, TtlCache};

/// Cloneable handle to a session's cache.
///
/// The lock is only held for in-memory map operations, never across a fetch.
#[derive(Clone)]
pub struct SharedCache {
    inner: Arc<Mutex<TtlCache>>,
}

impl SharedCache {
    pub fn new(cache: TtlCache) -> Self {
        Self {
            inner: Arc::new(Mutex::new(cache)),
        }
    }

    /// Lock the underlying store.
    pub fn lock(&self) -> MutexGuard<'_, TtlCache> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn get<T: DeserializeOwned>(&self, key: &str, options: &CacheOptions) -> Option<T> {
        self.lock().get(key, options)
    }

    pub fn set<T: Serialize + ?Sized>(
        &self,
        key: &str,
        data: &T,
        options: &CacheOptions,
    ) -> Result<()> {
        self.lock().set(key, data, options)
    }

    pub fn delete(&self, key: &str, options: &CacheOptions) -> bool {
        self.lock().delete(key, options)
    }

    pub fn clear(&self, owner_only: bool) {
        self.lock().clear(owner_only)
    }

    pub fn invalidate_pattern(&self, pattern: &str) -> Result<usize> {
        self.lock().invalidate_pattern(pattern)
    }

    pub fn cleanup_expired(&self) -> usize {
        self.lock().cleanup_expired()
    }

    pub fn stats(&self) -> CacheReport {
        self.lock().stats()
    }

    pub fn statistics(&self) -> CacheStatistics {
        self.lock().statistics()
    }

    /// Return the cached value for `key`, or run `fetch` and cache its result.
    ///
    /// Fetch failures are returned unchanged and nothing is cached. Concurrent
    /// misses on the same key each run their own fetch; the last write wins.
    pub async fn get_or_fetch<T, E, F, Fut>(
        &self,
        key: &str,
        fetch: F,
        options: &CacheOptions,
    ) -> std::result::Result<T, E>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = std::result::Result<T, E>>,
    {
        {
            let mut cache = self.lock();
            if let Some(value) = cache.get::<T>(key, options) {
                cache.record_hit();
                tracing::debug!(key, "Cache hit");
                return Ok(value);
            }
            cache.record_miss();
        }

        tracing::debug!(key, "Cache miss, fetching");
        let value = fetch().await?;

        if let Err(e) = self.set(key, &value, options) {
            tracing::warn!(key, error = %e, "Failed to cache fetched value");
        }

        Ok(value)
    }
}
