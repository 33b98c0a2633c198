// Diagnostic log of classified API errors.
// Keeps the most recent records in durable storage under a single key.

use std::collections::VecDeque;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::cache::persistence::Storage;
use crate::error::FinError;

use super::error::{ApiError, ErrorCode, Severity};

/// Storage key holding the error log.
pub const ERROR_LOG_KEY: &str = "api_errors";

/// Maximum number of records kept.
pub const MAX_ERROR_RECORDS: usize = 50;

/// One logged API failure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorLogRecord {
    pub code: ErrorCode,
    pub message: String,
    pub severity: Severity,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl ErrorLogRecord {
    pub fn new(error: &ApiError, context: Option<&str>) -> Self {
        Self {
            code: error.code,
            message: error.message.clone(),
            severity: error.severity,
            context: context.map(str::to_string),
            timestamp: Utc::now(),
        }
    }
}

/// Bounded error log, optionally mirrored to storage.
#[derive(Default)]
pub struct ErrorLog {
    records: VecDeque<ErrorLogRecord>,
    storage: Option<Arc<dyn Storage>>,
}

impl ErrorLog {
    /// An in-memory log.
    pub fn new() -> Self {
        Self::default()
    }

    /// A log mirrored to `storage`, starting from whatever it already holds.
    pub fn with_storage(storage: Arc<dyn Storage>) -> Self {
        let records = match storage.read(ERROR_LOG_KEY) {
            Ok(Some(raw)) => serde_json::from_str::<VecDeque<ErrorLogRecord>>(&raw)
                .unwrap_or_else(|e| {
                    tracing::warn!(error = %e, "Discarding unreadable error log");
                    VecDeque::new()
                }),
            Ok(None) => VecDeque::new(),
            Err(e) => {
                tracing::warn!(error = %e, "Failed to read error log");
                VecDeque::new()
            }
        };

        Self {
            records,
            storage: Some(storage),
        }
    }

    /// Append a record, dropping the oldest beyond the limit.
    pub fn record(&mut self, error: &ApiError, context: Option<&str>) {
        self.records.push_back(ErrorLogRecord::new(error, context));
        while self.records.len() > MAX_ERROR_RECORDS {
            self.records.pop_front();
        }
        self.save();
    }

    pub fn records(&self) -> impl Iterator<Item = &ErrorLogRecord> {
        self.records.iter()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn clear(&mut self) {
        self.records.clear();
        if let Some(storage) = &self.storage {
            if let Err(e) = storage.remove(ERROR_LOG_KEY) {
                tracing::warn!(error = %e, "Failed to clear error log");
            }
        }
    }

    fn save(&self) {
        let Some(storage) = &self.storage else {
            return;
        };
        let result = serde_json::to_string(&self.records)
            .map_err(FinError::from)
            .and_then(|json| storage.write(ERROR_LOG_KEY, &json));
        if let Err(e) = result {
            tracing::warn!(error = %e, "Failed to save error log");
        }
    }
}
