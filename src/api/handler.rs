// Error-handling executor for API calls.
// Tracks loading and error state for a view and logs every final failure.

use std::future::Future;

use tokio::sync::watch;

use super::error::{ApiError, RawError, classify};
use super::log::ErrorLog;
use super::retry::{RetryPolicy, with_retry};

/// Options for a single [`ApiErrorHandler::execute`] call.
#[derive(Debug, Clone)]
pub struct ExecuteOptions<T> {
    /// Retry retryable failures with this policy. `None` runs the call once.
    pub retry: Option<RetryPolicy>,
    /// Returned instead of `None` when the call fails.
    pub fallback: Option<T>,
    /// Free-form label stored with logged errors.
    pub context: Option<String>,
}

impl<T> Default for ExecuteOptions<T> {
    fn default() -> Self {
        Self {
            retry: Some(RetryPolicy::default()),
            fallback: None,
            context: None,
        }
    }
}

impl<T> ExecuteOptions<T> {
    pub fn without_retry(mut self) -> Self {
        self.retry = None;
        self
    }

    pub fn with_fallback(mut self, fallback: T) -> Self {
        self.fallback = Some(fallback);
        self
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }
}

/// Resets the loading flag when the call finishes or is dropped.
struct LoadingFlag<'a>(&'a watch::Sender<bool>);

impl<'a> LoadingFlag<'a> {
    fn raise(sender: &'a watch::Sender<bool>) -> Self {
        sender.send_replace(true);
        Self(sender)
    }
}

impl Drop for LoadingFlag<'_> {
    fn drop(&mut self) {
        self.0.send_replace(false);
    }
}

/// Observable loading/error state around API calls.
pub struct ApiErrorHandler {
    loading: watch::Sender<bool>,
    error: Option<ApiError>,
    log: ErrorLog,
}

impl Default for ApiErrorHandler {
    fn default() -> Self {
        Self::new(ErrorLog::default())
    }
}

impl ApiErrorHandler {
    pub fn new(log: ErrorLog) -> Self {
        let (loading, _) = watch::channel(false);
        Self {
            loading,
            error: None,
            log,
        }
    }

    pub fn is_loading(&self) -> bool {
        *self.loading.borrow()
    }

    /// Follow the loading flag while a call is in flight.
    pub fn subscribe_loading(&self) -> watch::Receiver<bool> {
        self.loading.subscribe()
    }

    pub fn error(&self) -> Option<&ApiError> {
        self.error.as_ref()
    }

    pub fn clear_error(&mut self) {
        self.error = None;
    }

    pub fn log(&self) -> &ErrorLog {
        &self.log
    }

    /// Run `api_call`, returning its value, the fallback, or `None`.
    ///
    /// Failures never escape: the classified error becomes `error()` and is logged.
    pub async fn execute<T, E, F, Fut>(&mut self, api_call: F, options: ExecuteOptions<T>) -> Option<T>
    where
        E: Into<RawError>,
        F: FnMut() -> Fut,
        Fut: Future<Output = std::result::Result<T, E>>,
    {
        self.error = None;
        let flag = LoadingFlag::raise(&self.loading);

        let result = match &options.retry {
            Some(policy) => with_retry(policy, api_call).await.map_err(|f| f.error),
            None => {
                let mut api_call = api_call;
                api_call().await.map_err(|e| classify(&Into::<RawError>::into(e)))
            }
        };

        drop(flag);

        match result {
            Ok(value) => Some(value),
            Err(error) => {
                self.report(error, options.context.as_deref());
                options.fallback
            }
        }
    }

    /// Record a failure that was classified elsewhere.
    pub fn report(&mut self, error: ApiError, context: Option<&str>) {
        tracing::warn!(
            code = %error.code,
            severity = ?error.severity,
            context = context.unwrap_or(""),
            "API call failed"
        );
        self.log.record(&error, context);
        self.error = Some(error);
    }
}
