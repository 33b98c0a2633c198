// Resource-specific cache for yearly expense distribution data.
// Maps year queries onto cache keys and tracks a loading flag per key.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use crate::api::{
    ApiError, BudgetPayload, DistributionSource, RetryPolicy, classify, with_retry,
};

use super::shared::SharedCache;
use super::store::CacheOptions;

const DISTRIBUTION_PREFIX: &str = "distribucion_";

/// Cache key for a year's expense distribution.
pub fn distribution_key(year: i32) -> String {
    format!("{}{}", DISTRIBUTION_PREFIX, year)
}

type LoadingStates = Arc<Mutex<HashMap<String, bool>>>;

/// Clears a loading flag when dropped, so failed or abandoned fetches never leave it set.
struct LoadingGuard {
    states: LoadingStates,
    key: String,
}

impl LoadingGuard {
    fn begin(states: &LoadingStates, key: &str) -> Self {
        states
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_string(), true);
        Self {
            states: Arc::clone(states),
            key: key.to_string(),
        }
    }
}

impl Drop for LoadingGuard {
    fn drop(&mut self) {
        self.states
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(self.key.clone(), false);
    }
}

/// Distribution data cache backed by a fetch source.
pub struct DataCache<S> {
    cache: SharedCache,
    source: Arc<S>,
    options: CacheOptions,
    retry: Option<RetryPolicy>,
    loading: LoadingStates,
}

impl<S> Clone for DataCache<S> {
    fn clone(&self) -> Self {
        Self {
            cache: self.cache.clone(),
            source: Arc::clone(&self.source),
            options: self.options.clone(),
            retry: self.retry.clone(),
            loading: Arc::clone(&self.loading),
        }
    }
}

impl<S: DistributionSource> DataCache<S> {
    pub fn new(cache: SharedCache, source: Arc<S>) -> Self {
        Self {
            cache,
            source,
            options: CacheOptions::default(),
            retry: None,
            loading: LoadingStates::default(),
        }
    }

    /// Use these options for every read and write.
    pub fn with_options(mut self, options: CacheOptions) -> Self {
        self.options = options;
        self
    }

    /// Retry failed fetches with this policy.
    pub fn with_retry(mut self, policy: RetryPolicy) -> Self {
        self.retry = Some(policy);
        self
    }

    pub fn cache(&self) -> &SharedCache {
        &self.cache
    }

    /// Expense distribution for `year`, from cache unless `force` is set.
    ///
    /// With `force`, the cache is not read; the fetched payload overwrites
    /// whatever entry was there.
    pub async fn get_distribution(&self, year: i32, force: bool) -> Result<BudgetPayload, ApiError> {
        let key = distribution_key(year);

        if force {
            tracing::debug!(year, "Forced distribution reload");
            let payload = self.fetch(year, &key).await?;
            if let Err(e) = self.cache.set(&key, &payload, &self.options) {
                tracing::warn!(%key, error = %e, "Failed to cache distribution");
            }
            return Ok(payload);
        }

        self.cache
            .get_or_fetch(&key, || self.fetch(year, &key), &self.options)
            .await
    }

    async fn fetch(&self, year: i32, key: &str) -> Result<BudgetPayload, ApiError> {
        let _guard = LoadingGuard::begin(&self.loading, key);

        let result = match &self.retry {
            Some(policy) => with_retry(policy, || self.source.fetch_distribution(year))
                .await
                .map_err(|failure| failure.error),
            None => self
                .source
                .fetch_distribution(year)
                .await
                .map_err(|raw| classify(&raw)),
        };

        if let Err(error) = &result {
            tracing::warn!(year, code = %error.code, "Failed to load expense distribution");
        }
        result
    }

    /// Whether a fetch for `year` is in flight.
    pub fn is_loading(&self, year: i32) -> bool {
        self.loading
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&distribution_key(year))
            .copied()
            .unwrap_or(false)
    }

    /// Snapshot of every loading flag seen so far.
    pub fn loading_states(&self) -> HashMap<String, bool> {
        self.loading
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Drop the cached distribution for one year.
    pub fn invalidate_year(&self, year: i32) -> bool {
        self.cache.delete(&distribution_key(year), &self.options)
    }

    /// Drop every cached distribution.
    pub fn invalidate_all(&self) -> usize {
        let pattern = format!("^(.*:)?{}", DISTRIBUTION_PREFIX);
        self.cache.invalidate_pattern(&pattern).unwrap_or(0)
    }
}
