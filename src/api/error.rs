// API error taxonomy and classification.
// Maps raw transport and HTTP failures onto a fixed set of classified errors.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Raw failure as observed at the transport boundary.
#[derive(Debug, Clone, PartialEq)]
pub enum RawError {
    /// The server could not be reached (DNS, refused connection, offline).
    Network(String),
    /// The server answered with a non-success status.
    Http { status: u16, body: Option<String> },
    /// The request did not complete in time.
    Timeout,
    /// Anything that does not fit the other variants.
    Unknown(String),
}

impl RawError {
    pub fn http(status: u16) -> Self {
        RawError::Http { status, body: None }
    }
}

impl fmt::Display for RawError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RawError::Network(msg) => write!(f, "network failure: {}", msg),
            RawError::Http { status, .. } => write!(f, "HTTP {}", status),
            RawError::Timeout => write!(f, "request timed out"),
            RawError::Unknown(msg) => write!(f, "{}", msg),
        }
    }
}

impl std::error::Error for RawError {}

impl From<reqwest::Error> for RawError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_timeout() {
            RawError::Timeout
        } else if let Some(status) = error.status() {
            RawError::http(status.as_u16())
        } else if error.is_connect() || error.is_request() {
            RawError::Network(error.to_string())
        } else {
            RawError::Unknown(error.to_string())
        }
    }
}

/// Classified error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    NetworkError,
    TimeoutError,
    Unauthorized,
    Forbidden,
    NotFound,
    ValidationError,
    RateLimit,
    ServerError,
    ServiceUnavailable,
    QuotaExceeded,
    UnknownError,
}

/// How serious an error is for the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::NetworkError => "NETWORK_ERROR",
            ErrorCode::TimeoutError => "TIMEOUT_ERROR",
            ErrorCode::Unauthorized => "UNAUTHORIZED",
            ErrorCode::Forbidden => "FORBIDDEN",
            ErrorCode::NotFound => "NOT_FOUND",
            ErrorCode::ValidationError => "VALIDATION_ERROR",
            ErrorCode::RateLimit => "RATE_LIMIT",
            ErrorCode::ServerError => "SERVER_ERROR",
            ErrorCode::ServiceUnavailable => "SERVICE_UNAVAILABLE",
            ErrorCode::QuotaExceeded => "QUOTA_EXCEEDED",
            ErrorCode::UnknownError => "UNKNOWN_ERROR",
        }
    }

    /// User-facing message for this code.
    pub fn message(&self) -> &'static str {
        match self {
            ErrorCode::NetworkError => "Unable to reach the server. Check your connection.",
            ErrorCode::TimeoutError => "The request took too long. Please try again.",
            ErrorCode::Unauthorized => "Your session has expired. Please sign in again.",
            ErrorCode::Forbidden => "You do not have permission to access this resource.",
            ErrorCode::NotFound => "The requested data was not found.",
            ErrorCode::ValidationError => "Some of the submitted data is invalid.",
            ErrorCode::RateLimit => "Too many requests. Please wait a moment.",
            ErrorCode::ServerError => "The server encountered an error. Please try again later.",
            ErrorCode::ServiceUnavailable => "The service is temporarily unavailable.",
            ErrorCode::QuotaExceeded => "Storage quota exceeded.",
            ErrorCode::UnknownError => "An unexpected error occurred.",
        }
    }

    pub fn severity(&self) -> Severity {
        match self {
            ErrorCode::ValidationError => Severity::Low,
            ErrorCode::TimeoutError
            | ErrorCode::NotFound
            | ErrorCode::RateLimit
            | ErrorCode::UnknownError => Severity::Medium,
            ErrorCode::NetworkError
            | ErrorCode::Unauthorized
            | ErrorCode::Forbidden
            | ErrorCode::ServerError
            | ErrorCode::QuotaExceeded => Severity::High,
            ErrorCode::ServiceUnavailable => Severity::Critical,
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ErrorCode::NetworkError
                | ErrorCode::TimeoutError
                | ErrorCode::RateLimit
                | ErrorCode::ServerError
                | ErrorCode::ServiceUnavailable
        )
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A classified API error, ready to be shown to the user or retried.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiError {
    pub code: ErrorCode,
    pub message: String,
    pub severity: Severity,
    pub retryable: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

impl ApiError {
    /// Build an error with the fixed message, severity, and retryability of `code`.
    pub fn new(code: ErrorCode) -> Self {
        Self {
            code,
            message: code.message().to_string(),
            severity: code.severity(),
            retryable: code.is_retryable(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.message, self.code)
    }
}

impl std::error::Error for ApiError {}

impl From<RawError> for ApiError {
    fn from(raw: RawError) -> Self {
        classify(&raw)
    }
}

/// Map an HTTP status onto the taxonomy.
fn code_for_status(status: u16) -> ErrorCode {
    match status {
        400 | 422 => ErrorCode::ValidationError,
        401 => ErrorCode::Unauthorized,
        403 => ErrorCode::Forbidden,
        404 => ErrorCode::NotFound,
        408 => ErrorCode::TimeoutError,
        413 | 507 => ErrorCode::QuotaExceeded,
        429 => ErrorCode::RateLimit,
        503 => ErrorCode::ServiceUnavailable,
        500..=599 => ErrorCode::ServerError,
        _ => ErrorCode::UnknownError,
    }
}

/// Classify a raw failure.
pub fn classify(raw: &RawError) -> ApiError {
    match raw {
        RawError::Network(msg) => {
            ApiError::new(ErrorCode::NetworkError).with_details(Value::String(msg.clone()))
        }
        RawError::Timeout => ApiError::new(ErrorCode::TimeoutError),
        RawError::Http { status, body } => {
            let code = code_for_status(*status);
            let mut error = ApiError::new(code);

            let parsed = body
                .as_deref()
                .and_then(|b| serde_json::from_str::<Value>(b).ok());

            if let Some(details) = parsed {
                // Validation errors carry the server's own explanation.
                if code == ErrorCode::ValidationError {
                    if let Some(msg) = details.get("message").and_then(Value::as_str) {
                        error.message = msg.to_string();
                    }
                }
                error.details = Some(details);
            }

            error
        }
        RawError::Unknown(msg) => {
            ApiError::new(ErrorCode::UnknownError).with_details(Value::String(msg.clone()))
        }
    }
}
