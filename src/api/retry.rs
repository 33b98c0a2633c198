// Retry wrapper with exponential backoff.
// Classifies each failure and only re-attempts errors marked retryable.

use std::future::Future;
use std::time::Duration;

use super::error::{ApiError, RawError, classify};

/// Retry policy for an API operation.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total number of attempts, including the first one.
    pub max_retries: u32,
    /// Delay before the second attempt.
    pub base_delay: Duration,
    /// Double the delay after every failed attempt.
    pub exponential: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(1000),
            exponential: true,
        }
    }
}

impl RetryPolicy {
    /// A policy that runs the operation exactly once.
    pub fn none() -> Self {
        Self {
            max_retries: 1,
            ..Self::default()
        }
    }

    /// Delay to wait after the given failed attempt (1-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        if !self.exponential {
            return self.base_delay;
        }
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1).min(31));
        self.base_delay.saturating_mul(factor)
    }
}

/// Final failure after the retry budget is spent or a non-retryable error occurred.
#[derive(Debug, Clone)]
pub struct RetryFailure<T> {
    /// The last classified error.
    pub error: ApiError,
    /// How many times the operation ran.
    pub attempts: u32,
    /// Caller-supplied fallback value, if any.
    pub fallback: Option<T>,
}

impl<T> RetryFailure<T> {
    /// The fallback value, or `None` when the caller supplied none.
    pub fn into_fallback(self) -> Option<T> {
        self.fallback
    }
}

/// Run `op` until it succeeds, fails with a non-retryable error, or runs out of attempts.
pub async fn with_retry<T, E, F, Fut>(policy: &RetryPolicy, op: F) -> Result<T, RetryFailure<T>>
where
    E: Into<RawError>,
    F: FnMut() -> Fut,
    Fut: Future<Output = std::result::Result<T, E>>,
{
    run(policy, None, op).await
}

/// Like [`with_retry`], attaching `fallback` to the failure.
pub async fn with_retry_or<T, E, F, Fut>(
    policy: &RetryPolicy,
    fallback: T,
    op: F,
) -> Result<T, RetryFailure<T>>
where
    E: Into<RawError>,
    F: FnMut() -> Fut,
    Fut: Future<Output = std::result::Result<T, E>>,
{
    run(policy, Some(fallback), op).await
}

async fn run<T, E, F, Fut>(
    policy: &RetryPolicy,
    fallback: Option<T>,
    mut op: F,
) -> Result<T, RetryFailure<T>>
where
    E: Into<RawError>,
    F: FnMut() -> Fut,
    Fut: Future<Output = std::result::Result<T, E>>,
{
    let max_attempts = policy.max_retries.max(1);
    let mut attempt = 0;

    loop {
        attempt += 1;

        let raw = match op().await {
            Ok(value) => return Ok(value),
            Err(e) => e.into(),
        };
        let error = classify(&raw);

        if !error.retryable || attempt >= max_attempts {
            tracing::debug!(
                code = %error.code,
                attempt,
                max_attempts,
                "Giving up on API call"
            );
            return Err(RetryFailure {
                error,
                attempts: attempt,
                fallback,
            });
        }

        let delay = policy.delay_for(attempt);
        tracing::warn!(
            code = %error.code,
            attempt,
            delay_ms = delay.as_millis() as u64,
            "API call failed, retrying"
        );
        tokio::time::sleep(delay).await;
    }
}
