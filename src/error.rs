// Error types for fincache.
// Covers transport, serialization, storage, and budget selection errors.

use thiserror::Error;

use crate::api::ApiError;

#[derive(Error, Debug)]
pub enum FinError {
    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error: {0}")]
    Api(ApiError),

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid cache key pattern: {0}")]
    InvalidPattern(#[from] regex::Error),

    #[error("Invalid month {0}: expected a value between 1 and 12")]
    InvalidMonth(u32),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("{0}")]
    Other(String),
}

impl From<ApiError> for FinError {
    fn from(error: ApiError) -> Self {
        FinError::Api(error)
    }
}

pub type Result<T> = std::result::Result<T, FinError>;
