//! Integration tests for the session, cache, and budget selection flow
//!
//! Drives the public API with an in-process distribution source.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Value, json};

use fincache::Session;
use fincache::api::{BudgetPayload, DistributionSource, ErrorCode, RawError};
use fincache::cache::{CacheOptions, FileStorage, SharedCache, Storage, TtlCache};
use fincache::config::Config;

/// Serves two months per year; fails the first `failures` calls with `status`.
struct LedgerSource {
    calls: AtomicU32,
    failures: u32,
    status: u16,
}

impl LedgerSource {
    fn healthy() -> Self {
        Self::failing(0, 503)
    }

    fn failing(failures: u32, status: u16) -> Self {
        Self {
            calls: AtomicU32::new(0),
            failures,
            status,
        }
    }

    fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DistributionSource for LedgerSource {
    async fn fetch_distribution(&self, year: i32) -> Result<BudgetPayload, RawError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if call < self.failures {
            return Err(RawError::Http {
                status: self.status,
                body: Some(r#"{"error":"try later"}"#.to_string()),
            });
        }

        let mut monthly_data = BTreeMap::new();
        monthly_data.insert("01".to_string(), json!({ "year": year, "groceries": 320 }));
        monthly_data.insert("03".to_string(), json!({ "year": year, "groceries": 290 }));
        Ok(BudgetPayload {
            monthly_data,
            available_months: vec!["01".to_string(), "03".to_string()],
            history: Value::Null,
        })
    }
}

fn config() -> Config {
    let mut config = Config::default();
    config.cache.storage_dir = None;
    config
}

#[tokio::test]
async fn test_budget_selection_over_cached_year() {
    let source = Arc::new(LedgerSource::healthy());
    let session = Session::start("alice", Arc::clone(&source), &config(), None);

    let mut budget = session.budget_at(1, 2024).unwrap();
    budget.load().await;
    assert!(budget.has_data_for_selected_month());

    budget.handle_month_change(2).unwrap();
    assert!(!budget.has_data_for_selected_month());

    budget.handle_month_change(3).unwrap();
    assert_eq!(budget.current_month_data().unwrap()["groceries"], 290);

    // A second view of the same year is served from the session cache
    let mut other = session.budget_at(3, 2024).unwrap();
    other.load().await;
    assert_eq!(source.calls(), 1);

    budget.handle_year_change(2025).await;
    assert_eq!(source.calls(), 2);

    session.end().await;
}

#[tokio::test(start_paused = true)]
async fn test_retryable_failures_are_absorbed() {
    let source = Arc::new(LedgerSource::failing(2, 503));
    let session = Session::start("alice", Arc::clone(&source), &config(), None);

    let start = tokio::time::Instant::now();
    let payload = session
        .distribution()
        .get_distribution(2024, false)
        .await
        .unwrap();

    assert!(payload.has_month(1));
    assert_eq!(source.calls(), 3);
    assert!(start.elapsed() >= Duration::from_secs(3));
    assert!(!session.distribution().is_loading(2024));
}

#[tokio::test]
async fn test_not_found_is_not_retried() {
    let source = Arc::new(LedgerSource::failing(u32::MAX, 404));
    let session = Session::start("alice", Arc::clone(&source), &config(), None);

    let error = session
        .distribution()
        .get_distribution(2024, false)
        .await
        .unwrap_err();

    assert_eq!(error.code, ErrorCode::NotFound);
    assert!(!error.retryable);
    assert_eq!(source.calls(), 1);

    // Nothing was cached for the failed year
    assert_eq!(session.cache().stats().size, 0);

    let mut budget = session.budget_at(1, 2024).unwrap();
    budget.load().await;
    assert!(budget.data().is_none());
    assert_eq!(budget.error(), Some(ErrorCode::NotFound.message()));
}

#[tokio::test]
async fn test_persisted_distribution_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let storage: Arc<dyn Storage> = Arc::new(FileStorage::new(dir.path().to_path_buf()));
    let mut config = config();
    config.cache.persist = true;

    let source = Arc::new(LedgerSource::healthy());
    let first = Session::start("alice", Arc::clone(&source), &config, Some(Arc::clone(&storage)));
    first.distribution().get_distribution(2024, false).await.unwrap();
    drop(first);

    assert!(dir.path().join("intelligent_cache.json").exists());

    let second = Session::start("alice", Arc::clone(&source), &config, Some(storage));
    let mut budget = second.budget_at(3, 2024).unwrap();
    budget.load().await;

    assert!(budget.has_data_for_selected_month());
    assert_eq!(source.calls(), 1);
}

#[tokio::test]
async fn test_owners_are_isolated_in_a_shared_store() {
    let cache = SharedCache::new(TtlCache::new());
    let alice = CacheOptions::default().for_owner("alice");
    let bob = CacheOptions::default().for_owner("bob");

    cache.set("x", &1, &alice).unwrap();
    cache.set("x", &2, &bob).unwrap();

    assert_eq!(cache.get::<i32>("x", &alice), Some(1));
    assert_eq!(cache.get::<i32>("x", &bob), Some(2));

    cache.lock().set_owner(Some("alice".to_string()));
    cache.clear(true);

    assert_eq!(cache.get::<i32>("x", &alice), None);
    assert_eq!(cache.get::<i32>("x", &bob), Some(2));
}

#[tokio::test(start_paused = true)]
async fn test_entries_expire_after_ttl() {
    let cache = SharedCache::new(TtlCache::new());
    let options = CacheOptions::default().with_ttl(Duration::from_millis(100));

    cache.set("k", &42, &options).unwrap();
    assert_eq!(cache.get::<i32>("k", &options), Some(42));

    tokio::time::advance(Duration::from_millis(150)).await;
    assert_eq!(cache.get::<i32>("k", &options), None);
    assert_eq!(cache.stats().size, 0);
}
