// Runtime configuration.
// Built from defaults and FINCACHE_* environment variables.

use std::path::PathBuf;
use std::time::Duration;

use crate::api::RetryPolicy;
use crate::cache::paths;
use crate::cache::store::{DEFAULT_MAX_SIZE, DEFAULT_TTL};
use crate::error::{FinError, Result};

pub const ENV_API_URL: &str = "FINCACHE_API_URL";
pub const ENV_TOKEN: &str = "FINCACHE_TOKEN";
pub const ENV_CACHE_TTL_SECS: &str = "FINCACHE_CACHE_TTL_SECS";
pub const ENV_CACHE_MAX_SIZE: &str = "FINCACHE_CACHE_MAX_SIZE";
pub const ENV_CACHE_DIR: &str = "FINCACHE_CACHE_DIR";

const DEFAULT_API_URL: &str = "http://localhost:3001";
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// Default interval between expired-entry sweeps.
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// Finance API connection settings.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub base_url: String,
    pub token: Option<String>,
    pub timeout: Duration,
    /// Retry policy for data fetches.
    pub retry: RetryPolicy,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_API_URL.to_string(),
            token: None,
            timeout: DEFAULT_REQUEST_TIMEOUT,
            retry: RetryPolicy::default(),
        }
    }
}

/// Cache sizing, lifetime, and persistence settings.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    pub ttl: Duration,
    pub max_size: usize,
    pub persist: bool,
    pub sweep_interval: Duration,
    /// Directory for persisted cache and error log files.
    pub storage_dir: Option<PathBuf>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl: DEFAULT_TTL,
            max_size: DEFAULT_MAX_SIZE,
            persist: false,
            sweep_interval: DEFAULT_SWEEP_INTERVAL,
            storage_dir: paths::cache_dir(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Config {
    pub api: ApiConfig,
    pub cache: CacheConfig,
}

impl Config {
    /// Load configuration from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration using an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Config::default();

        if let Some(url) = lookup(ENV_API_URL) {
            config.api.base_url = url.trim_end_matches('/').to_string();
        }
        config.api.token = lookup(ENV_TOKEN).filter(|t| !t.is_empty());

        if let Some(ttl) = lookup(ENV_CACHE_TTL_SECS) {
            let secs: u64 = ttl
                .parse()
                .map_err(|_| FinError::Config(format!("{} must be a number", ENV_CACHE_TTL_SECS)))?;
            config.cache.ttl = Duration::from_secs(secs);
        }

        if let Some(size) = lookup(ENV_CACHE_MAX_SIZE) {
            let size: usize = size
                .parse()
                .map_err(|_| FinError::Config(format!("{} must be a number", ENV_CACHE_MAX_SIZE)))?;
            if size == 0 {
                return Err(FinError::Config(format!(
                    "{} must be greater than zero",
                    ENV_CACHE_MAX_SIZE
                )));
            }
            config.cache.max_size = size;
        }

        if let Some(dir) = lookup(ENV_CACHE_DIR) {
            config.cache.storage_dir = Some(PathBuf::from(dir));
            config.cache.persist = true;
        }

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_lookup(|_| None).unwrap();
        assert_eq!(config.api.base_url, DEFAULT_API_URL);
        assert!(config.api.token.is_none());
        assert_eq!(config.cache.ttl, Duration::from_secs(300));
        assert_eq!(config.cache.max_size, 100);
        assert!(!config.cache.persist);
    }

    #[test]
    fn test_env_overrides() {
        let config = Config::from_lookup(lookup_from(&[
            (ENV_API_URL, "https://api.example.com/"),
            (ENV_TOKEN, "secret"),
            (ENV_CACHE_TTL_SECS, "60"),
            (ENV_CACHE_MAX_SIZE, "10"),
            (ENV_CACHE_DIR, "/tmp/fincache"),
        ]))
        .unwrap();

        assert_eq!(config.api.base_url, "https://api.example.com");
        assert_eq!(config.api.token.as_deref(), Some("secret"));
        assert_eq!(config.cache.ttl, Duration::from_secs(60));
        assert_eq!(config.cache.max_size, 10);
        assert_eq!(config.cache.storage_dir, Some(PathBuf::from("/tmp/fincache")));
        assert!(config.cache.persist);
    }

    #[test]
    fn test_invalid_numbers_are_rejected() {
        let result = Config::from_lookup(lookup_from(&[(ENV_CACHE_TTL_SECS, "soon")]));
        assert!(matches!(result, Err(FinError::Config(_))));

        let result = Config::from_lookup(lookup_from(&[(ENV_CACHE_MAX_SIZE, "0")]));
        assert!(matches!(result, Err(FinError::Config(_))));
    }
}
