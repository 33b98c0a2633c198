// Per-user session.
// Owns the user's cache and sweep daemon from login until logout.

use std::sync::Arc;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::api::{ApiErrorHandler, DistributionSource, ErrorLog};
use crate::cache::{
    CacheOptions, DataCache, SharedCache, Storage, StoragePersistence, SweepDaemon, TtlCache,
};
use crate::config::Config;
use crate::error::Result;
use crate::state::BudgetData;

/// An authenticated user's cache, data contexts, and error handling.
///
/// Must be started inside a tokio runtime; the sweep daemon runs until
/// [`Session::end`] or drop.
pub struct Session<S> {
    owner: String,
    cache: SharedCache,
    distribution: DataCache<S>,
    errors: ApiErrorHandler,
    shutdown: CancellationToken,
    sweeper: Option<JoinHandle<()>>,
}

impl<S: DistributionSource + 'static> Session<S> {
    /// Build a cache scoped to `owner` and start sweeping it.
    ///
    /// With `storage`, persisted entries are restored and the error log is mirrored.
    pub fn start(
        owner: impl Into<String>,
        source: Arc<S>,
        config: &Config,
        storage: Option<Arc<dyn Storage>>,
    ) -> Self {
        let owner = owner.into();
        let config_api = &config.api;
        let config = &config.cache;

        let mut store = TtlCache::for_owner(owner.clone());
        let mut options = CacheOptions::default()
            .with_ttl(config.ttl)
            .with_max_size(config.max_size);

        let errors = match &storage {
            Some(storage) => {
                if config.persist {
                    store = store.with_persistence(Box::new(StoragePersistence::new(Arc::clone(
                        storage,
                    ))));
                    options = options.persisted();
                }
                ApiErrorHandler::new(ErrorLog::with_storage(Arc::clone(storage)))
            }
            None => ApiErrorHandler::default(),
        };

        let cache = SharedCache::new(store);
        let distribution = DataCache::new(cache.clone(), source)
            .with_options(options)
            .with_retry(config_api.retry.clone());

        let shutdown = CancellationToken::new();
        let sweeper = SweepDaemon::new(cache.clone())
            .with_interval(config.sweep_interval)
            .spawn(shutdown.clone());

        tracing::info!(owner = %owner, persist = config.persist, "Session started");

        Self {
            owner,
            cache,
            distribution,
            errors,
            shutdown,
            sweeper: Some(sweeper),
        }
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }

    pub fn cache(&self) -> &SharedCache {
        &self.cache
    }

    pub fn distribution(&self) -> &DataCache<S> {
        &self.distribution
    }

    pub fn errors(&mut self) -> &mut ApiErrorHandler {
        &mut self.errors
    }

    /// A budget selection bound to this session's distribution cache.
    pub fn budget(&self) -> BudgetData<S> {
        BudgetData::new(self.distribution.clone())
    }

    /// Like [`Session::budget`], starting at an explicit month and year.
    pub fn budget_at(&self, month: u32, year: i32) -> Result<BudgetData<S>> {
        BudgetData::with_selection(self.distribution.clone(), month, year)
    }

    /// Log out: drop this owner's cached data, in memory and in storage, and stop the sweeper.
    pub async fn end(mut self) {
        self.cache.clear(true);
        self.cache.lock().persist();
        self.shutdown.cancel();
        if let Some(handle) = self.sweeper.take() {
            if let Err(e) = handle.await {
                tracing::warn!(error = %e, "Sweep daemon did not stop cleanly");
            }
        }
        tracing::info!(owner = %self.owner, "Session ended");
    }
}

impl<S> Drop for Session<S> {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{BudgetPayload, RawError};
    use crate::cache::MemoryStorage;
    use async_trait::async_trait;

    struct EmptySource;

    #[async_trait]
    impl DistributionSource for EmptySource {
        async fn fetch_distribution(
            &self,
            _year: i32,
        ) -> std::result::Result<BudgetPayload, RawError> {
            Ok(BudgetPayload::default())
        }
    }

    fn config(persist: bool) -> Config {
        let mut config = Config::default();
        config.cache.persist = persist;
        config.cache.storage_dir = None;
        config
    }

    #[tokio::test]
    async fn test_end_clears_owner_entries() {
        let session = Session::start("alice", Arc::new(EmptySource), &config(false), None);
        session.distribution().get_distribution(2024, false).await.unwrap();

        let cache = session.cache().clone();
        assert_eq!(cache.stats().size, 1);

        session.end().await;
        assert_eq!(cache.stats().size, 0);
    }

    #[tokio::test]
    async fn test_sessions_do_not_share_entries() {
        let alice = Session::start("alice", Arc::new(EmptySource), &config(false), None);
        alice.distribution().get_distribution(2024, false).await.unwrap();

        let key = alice
            .cache()
            .lock()
            .effective_key("distribucion_2024", &CacheOptions::default());
        assert_eq!(key, "alice:distribucion_2024");

        let bob = Session::start("bob", Arc::new(EmptySource), &config(false), None);
        assert!(
            bob.cache()
                .get::<BudgetPayload>("distribucion_2024", &CacheOptions::default())
                .is_none()
        );
    }

    #[tokio::test]
    async fn test_persisted_entries_survive_restart() {
        let storage: Arc<dyn Storage> = Arc::new(MemoryStorage::new());

        let first = Session::start(
            "alice",
            Arc::new(EmptySource),
            &config(true),
            Some(Arc::clone(&storage)),
        );
        first.distribution().get_distribution(2024, false).await.unwrap();
        drop(first);

        let second = Session::start(
            "alice",
            Arc::new(EmptySource),
            &config(true),
            Some(storage),
        );
        assert!(
            second
                .cache()
                .get::<BudgetPayload>("distribucion_2024", &CacheOptions::default())
                .is_some()
        );
    }

    #[tokio::test]
    async fn test_end_removes_persisted_owner_entries() {
        let storage: Arc<dyn Storage> = Arc::new(MemoryStorage::new());

        let alice = Session::start(
            "alice",
            Arc::new(EmptySource),
            &config(true),
            Some(Arc::clone(&storage)),
        );
        alice.distribution().get_distribution(2024, false).await.unwrap();
        alice.end().await;

        let saved = storage
            .read(crate::cache::persistence::CACHE_STORAGE_KEY)
            .unwrap()
            .unwrap();
        assert!(!saved.contains("alice:"));

        let bob = Session::start(
            "bob",
            Arc::new(EmptySource),
            &config(true),
            Some(Arc::clone(&storage)),
        );
        assert_eq!(bob.cache().stats().size, 0);
    }

    #[tokio::test]
    async fn test_restore_ignores_other_owners() {
        let storage: Arc<dyn Storage> = Arc::new(MemoryStorage::new());

        let alice = Session::start(
            "alice",
            Arc::new(EmptySource),
            &config(true),
            Some(Arc::clone(&storage)),
        );
        alice.distribution().get_distribution(2024, false).await.unwrap();
        drop(alice);

        let bob = Session::start("bob", Arc::new(EmptySource), &config(true), Some(storage));
        assert_eq!(bob.cache().stats().size, 0);
        let unscoped = CacheOptions::default().unscoped();
        assert!(
            bob.cache()
                .get::<BudgetPayload>("alice:distribucion_2024", &unscoped)
                .is_none()
        );
    }
}
