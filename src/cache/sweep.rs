// Expired-entry sweep daemon.
// Removes expired entries on a fixed interval until cancelled.

use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::config::DEFAULT_SWEEP_INTERVAL;

use super::shared::SharedCache;

/// Background task that periodically purges expired cache entries.
pub struct SweepDaemon {
    cache: SharedCache,
    interval: Duration,
}

impl SweepDaemon {
    pub fn new(cache: SharedCache) -> Self {
        Self {
            cache,
            interval: DEFAULT_SWEEP_INTERVAL,
        }
    }

    /// Sets a custom sweep interval.
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Runs one sweep. Returns how many entries were removed.
    pub fn sweep(&self) -> usize {
        let removed = self.cache.cleanup_expired();
        if removed > 0 {
            debug!(removed, "Swept expired cache entries");
        }
        removed
    }

    /// Runs the sweeper until shutdown is signalled.
    pub async fn run(self, shutdown: CancellationToken) {
        info!(
            interval_secs = self.interval.as_secs(),
            "Cache sweep daemon starting"
        );

        let mut interval = tokio::time::interval(self.interval);
        // Skip the first immediate tick
        interval.tick().await;

        loop {
            tokio::select! {
                biased;

                _ = shutdown.cancelled() => {
                    info!("Cache sweep daemon shutting down");
                    break;
                }

                _ = interval.tick() => {
                    self.sweep();
                }
            }
        }
    }

    /// Spawns the daemon on the current runtime.
    pub fn spawn(self, shutdown: CancellationToken) -> tokio::task::JoinHandle<()> {
        tokio::spawn(self.run(shutdown))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::store::{CacheOptions, TtlCache};

    #[test]
    fn test_default_interval() {
        let daemon = SweepDaemon::new(SharedCache::new(TtlCache::new()));
        assert_eq!(daemon.interval(), Duration::from_secs(60));
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweeps_expired_entries_without_reads() {
        let cache = SharedCache::new(TtlCache::new());
        let short = CacheOptions::default().with_ttl(Duration::from_secs(5));
        cache.set("short", &1, &short).unwrap();
        cache.set("long", &2, &CacheOptions::default()).unwrap();

        let shutdown = CancellationToken::new();
        let handle = SweepDaemon::new(cache.clone())
            .with_interval(Duration::from_secs(10))
            .spawn(shutdown.clone());

        // Let the daemon consume its first tick.
        tokio::task::yield_now().await;
        tokio::time::sleep(Duration::from_secs(11)).await;

        assert_eq!(cache.stats().size, 1);

        shutdown.cancel();
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn test_stops_on_cancel() {
        let shutdown = CancellationToken::new();
        let handle = SweepDaemon::new(SharedCache::new(TtlCache::new())).spawn(shutdown.clone());

        shutdown.cancel();
        handle.await.unwrap();
    }
}
