// Cache module for session-scoped API data.
// TTL store, persistence backends, the cache-or-fetch facade, and resource contexts.

pub mod context;
pub mod paths;
pub mod persistence;
pub mod shared;
pub mod stats;
pub mod store;
pub mod sweep;

pub use context::{DataCache, distribution_key};
pub use persistence::{
    FileStorage, MemoryStorage, PersistedEntry, PersistenceAdapter, Storage, StoragePersistence,
};
pub use shared::SharedCache;
pub use stats::{CacheReport, CacheStatistics};
pub use store::{CacheOptions, DEFAULT_MAX_SIZE, DEFAULT_TTL, TtlCache};
pub use sweep::SweepDaemon;
