// Logging setup.
// Structured tracing output to stderr, filtered by RUST_LOG (defaults to info).

use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Default filter when `RUST_LOG` is unset.
pub fn default_filter(verbose: bool) -> &'static str {
    if verbose { "fincache=debug,info" } else { "info" }
}

/// Install the global subscriber. Safe to call more than once; later calls are ignored.
pub fn init_logging(verbose: bool) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter(verbose)));

    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false);

    let _ = tracing_subscriber::registry()
        .with(env_filter)
        .with(stderr_layer)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_filter() {
        assert_eq!(default_filter(false), "info");
        assert!(default_filter(true).contains("fincache=debug"));
    }

    #[test]
    fn test_init_twice_does_not_panic() {
        init_logging(false);
        init_logging(true);
    }
}
