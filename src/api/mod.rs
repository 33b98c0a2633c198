// Finance API module.
// Client, error taxonomy, retry wrapper, and error handling for API calls.

pub mod client;
pub mod endpoints;
pub mod error;
pub mod handler;
pub mod log;
pub mod retry;
pub mod types;

pub use client::BudgetClient;
pub use endpoints::DistributionSource;
pub use error::{ApiError, ErrorCode, RawError, Severity, classify};
pub use handler::{ApiErrorHandler, ExecuteOptions};
pub use log::{ErrorLog, ErrorLogRecord};
pub use retry::{RetryFailure, RetryPolicy, with_retry, with_retry_or};
pub use types::{BudgetPayload, month_key};
