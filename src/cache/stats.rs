// Cache statistics.
// Hit/miss counters and the size and validity report.

use serde::Serialize;

/// Running hit/miss counters for cache-or-fetch lookups.
///
/// Counters live as long as the cache instance; a new session starts at zero.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStatistics {
    pub hits: u64,
    pub misses: u64,
}

impl CacheStatistics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Hit rate (0.0 to 1.0). Zero when nothing was looked up yet.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }

    pub fn record_hit(&mut self) {
        self.hits += 1;
    }

    pub fn record_miss(&mut self) {
        self.misses += 1;
    }
}

/// Point-in-time snapshot of the cache contents.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheReport {
    pub size: usize,
    pub valid_entries: usize,
    pub expired_entries: usize,
    pub hit_rate: f64,
    /// Approximate bytes, from the serialized size of every entry.
    pub memory_usage: usize,
}
