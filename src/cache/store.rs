// In-memory TTL cache store.
// Owner-scoped keys, size-bounded eviction, and optional persistence of recent entries.

use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Serialize, de::DeserializeOwned};
use serde_json::Value;
use tokio::time::Instant;

use crate::error::Result;

use super::persistence::{MAX_PERSISTED_ENTRIES, PersistedEntry, PersistenceAdapter};
use super::stats::{CacheReport, CacheStatistics};

/// Default TTL for cached API data: 5 minutes.
pub const DEFAULT_TTL: Duration = Duration::from_secs(5 * 60);

/// Default maximum number of entries.
pub const DEFAULT_MAX_SIZE: usize = 100;

/// Per-call options for reads and writes.
#[derive(Debug, Clone)]
pub struct CacheOptions {
    pub ttl: Duration,
    pub max_size: usize,
    /// Write recent entries to durable storage after this write.
    pub persist: bool,
    /// Prefix keys with the owner id.
    pub scope_to_owner: bool,
    /// Owner for this call, overriding the cache's current owner.
    pub owner: Option<String>,
}

impl Default for CacheOptions {
    fn default() -> Self {
        Self {
            ttl: DEFAULT_TTL,
            max_size: DEFAULT_MAX_SIZE,
            persist: false,
            scope_to_owner: true,
            owner: None,
        }
    }
}

impl CacheOptions {
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn with_max_size(mut self, max_size: usize) -> Self {
        self.max_size = max_size;
        self
    }

    pub fn persisted(mut self) -> Self {
        self.persist = true;
        self
    }

    pub fn unscoped(mut self) -> Self {
        self.scope_to_owner = false;
        self
    }

    pub fn for_owner(mut self, owner: impl Into<String>) -> Self {
        self.owner = Some(owner.into());
        self
    }
}

#[derive(Debug, Clone)]
struct CacheEntry {
    data: Value,
    created_at: Instant,
    /// Wall-clock creation time, kept for persistence.
    timestamp: DateTime<Utc>,
    ttl: Duration,
    key: String,
    owner: Option<String>,
    /// Insertion order, breaks timestamp ties during eviction.
    seq: u64,
}

impl CacheEntry {
    fn is_valid(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.created_at) < self.ttl
    }

    fn to_persisted(&self) -> PersistedEntry {
        PersistedEntry {
            data: self.data.clone(),
            timestamp: self.timestamp,
            ttl_ms: self.ttl.as_millis() as u64,
            key: self.key.clone(),
            owner: self.owner.clone(),
        }
    }
}

/// Key/value store with per-entry expiration.
///
/// Values are held as JSON documents; the typed API goes through serde.
/// A lookup that misses or finds an expired entry returns `None`.
pub struct TtlCache {
    entries: HashMap<String, CacheEntry>,
    owner: Option<String>,
    stats: CacheStatistics,
    persistence: Option<Box<dyn PersistenceAdapter>>,
    next_seq: u64,
}

impl Default for TtlCache {
    fn default() -> Self {
        Self::new()
    }
}

impl TtlCache {
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
            owner: None,
            stats: CacheStatistics::new(),
            persistence: None,
            next_seq: 0,
        }
    }

    /// Create a cache scoped to an owner.
    pub fn for_owner(owner: impl Into<String>) -> Self {
        let mut cache = Self::new();
        cache.owner = Some(owner.into());
        cache
    }

    /// Attach a persistence adapter and load previously saved entries.
    ///
    /// Load failures are logged and leave the cache empty.
    pub fn with_persistence(mut self, adapter: Box<dyn PersistenceAdapter>) -> Self {
        match adapter.load() {
            Ok(saved) => {
                let restored = self.restore(saved);
                if restored > 0 {
                    tracing::info!(restored, "Restored persisted cache entries");
                }
            }
            Err(e) => tracing::warn!(error = %e, "Failed to load persisted cache"),
        }
        self.persistence = Some(adapter);
        self
    }

    pub fn owner(&self) -> Option<&str> {
        self.owner.as_deref()
    }

    pub fn set_owner(&mut self, owner: Option<String>) {
        self.owner = owner;
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn statistics(&self) -> CacheStatistics {
        self.stats
    }

    pub fn record_hit(&mut self) {
        self.stats.record_hit();
    }

    pub fn record_miss(&mut self) {
        self.stats.record_miss();
    }

    /// Key under which an entry is actually stored.
    pub fn effective_key(&self, key: &str, options: &CacheOptions) -> String {
        if !options.scope_to_owner {
            return key.to_string();
        }
        match options.owner.as_deref().or(self.owner.as_deref()) {
            Some(owner) => format!("{}:{}", owner, key),
            None => key.to_string(),
        }
    }

    /// Store `data` under `key`, replacing any existing entry.
    pub fn set<T: Serialize + ?Sized>(
        &mut self,
        key: &str,
        data: &T,
        options: &CacheOptions,
    ) -> Result<()> {
        let data = serde_json::to_value(data)?;
        let full_key = self.effective_key(key, options);

        if !self.entries.contains_key(&full_key) && self.entries.len() >= options.max_size {
            self.evict_oldest(options.max_size);
        }

        let owner = if options.scope_to_owner {
            options.owner.clone().or_else(|| self.owner.clone())
        } else {
            None
        };

        let seq = self.next_seq;
        self.next_seq += 1;

        self.entries.insert(
            full_key.clone(),
            CacheEntry {
                data,
                created_at: Instant::now(),
                timestamp: Utc::now(),
                ttl: options.ttl,
                key: full_key,
                owner,
                seq,
            },
        );

        if options.persist {
            self.persist();
        }

        Ok(())
    }

    /// Fetch a valid entry. Expired entries are removed on the way.
    pub fn get<T: DeserializeOwned>(&mut self, key: &str, options: &CacheOptions) -> Option<T> {
        let full_key = self.effective_key(key, options);
        let now = Instant::now();

        let entry = self.entries.get(&full_key)?;
        if !entry.is_valid(now) {
            tracing::debug!(key = %full_key, "Cache entry expired");
            self.entries.remove(&full_key);
            return None;
        }

        match serde_json::from_value(entry.data.clone()) {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::warn!(key = %full_key, error = %e, "Cached value has unexpected shape, dropping");
                self.entries.remove(&full_key);
                None
            }
        }
    }

    /// Remove one entry. Returns whether it existed.
    pub fn delete(&mut self, key: &str, options: &CacheOptions) -> bool {
        let full_key = self.effective_key(key, options);
        self.entries.remove(&full_key).is_some()
    }

    /// Remove the current owner's entries, or everything.
    pub fn clear(&mut self, owner_only: bool) {
        match (owner_only, self.owner.as_deref()) {
            (true, Some(owner)) => {
                let prefix = format!("{}:", owner);
                self.entries.retain(|key, _| !key.starts_with(&prefix));
            }
            _ => self.entries.clear(),
        }
    }

    /// Remove every entry whose stored key matches `pattern`.
    pub fn invalidate_pattern(&mut self, pattern: &str) -> Result<usize> {
        let regex = Regex::new(pattern)?;
        Ok(self.invalidate_matching(&regex))
    }

    pub fn invalidate_matching(&mut self, regex: &Regex) -> usize {
        let before = self.entries.len();
        self.entries.retain(|key, _| !regex.is_match(key));
        let removed = before - self.entries.len();
        if removed > 0 {
            tracing::debug!(pattern = %regex, removed, "Invalidated cache entries");
        }
        removed
    }

    /// Remove all expired entries. Returns how many were removed.
    pub fn cleanup_expired(&mut self) -> usize {
        let now = Instant::now();
        let before = self.entries.len();
        self.entries.retain(|_, entry| entry.is_valid(now));
        before - self.entries.len()
    }

    /// Snapshot of size, validity, hit rate, and approximate memory use.
    pub fn stats(&self) -> CacheReport {
        let now = Instant::now();
        let valid_entries = self.entries.values().filter(|e| e.is_valid(now)).count();
        let memory_usage = self
            .entries
            .iter()
            .map(|(key, entry)| {
                key.len()
                    + serde_json::to_vec(&entry.to_persisted())
                        .map(|bytes| bytes.len())
                        .unwrap_or(0)
            })
            .sum();

        CacheReport {
            size: self.entries.len(),
            valid_entries,
            expired_entries: self.entries.len() - valid_entries,
            hit_rate: self.stats.hit_rate(),
            memory_usage,
        }
    }

    /// Write the most recent valid entries through the persistence adapter.
    pub fn persist(&self) {
        let Some(adapter) = &self.persistence else {
            return;
        };

        let now = Instant::now();
        let mut recent: Vec<&CacheEntry> =
            self.entries.values().filter(|e| e.is_valid(now)).collect();
        recent.sort_by(|a, b| (b.created_at, b.seq).cmp(&(a.created_at, a.seq)));
        recent.truncate(MAX_PERSISTED_ENTRIES);

        let saved: Vec<(String, PersistedEntry)> = recent
            .into_iter()
            .map(|entry| (entry.key.clone(), entry.to_persisted()))
            .collect();

        if let Err(e) = adapter.save(&saved) {
            tracing::warn!(error = %e, entries = saved.len(), "Failed to persist cache");
        }
    }

    /// Drop the oldest ~20% of entries, or more if needed to make room under `max_size`.
    fn evict_oldest(&mut self, max_size: usize) {
        let len = self.entries.len();
        let count = (len / 5).max((len + 1).saturating_sub(max_size)).max(1);

        let mut by_age: Vec<(Instant, u64, String)> = self
            .entries
            .iter()
            .map(|(key, entry)| (entry.created_at, entry.seq, key.clone()))
            .collect();
        by_age.sort();

        for (_, _, key) in by_age.into_iter().take(count) {
            self.entries.remove(&key);
        }
        tracing::debug!(evicted = count, "Cache full, evicted oldest entries");
    }

    /// Re-insert persisted entries, skipping expired ones and other owners' ones.
    fn restore(&mut self, saved: Vec<(String, PersistedEntry)>) -> usize {
        let now = Instant::now();
        let wall_now = Utc::now();
        let mut restored = 0;

        // Saved newest first; insert oldest first so sequence numbers follow age
        for (key, entry) in saved.into_iter().rev() {
            let foreign = match (self.owner.as_deref(), entry.owner.as_deref()) {
                (Some(owner), Some(entry_owner)) => owner != entry_owner,
                _ => false,
            };
            if foreign {
                continue;
            }

            let ttl = Duration::from_millis(entry.ttl_ms);
            let age = wall_now
                .signed_duration_since(entry.timestamp)
                .to_std()
                .unwrap_or(Duration::ZERO);
            if age >= ttl {
                continue;
            }

            // Carry the entry's age over to the monotonic clock.
            let created_at = now.checked_sub(age).unwrap_or(now);
            let seq = self.next_seq;
            self.next_seq += 1;

            self.entries.insert(
                key,
                CacheEntry {
                    data: entry.data,
                    created_at,
                    timestamp: entry.timestamp,
                    ttl,
                    key: entry.key,
                    owner: entry.owner,
                    seq,
                },
            );
            restored += 1;
        }

        restored
    }
}
