//! Runtime configuration.

use crate::error::{CoreError, CoreResult};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default permitted table name
pub const DEFAULT_TABLE_NAME: &str = "trade";

/// Default row limit for injected `LIMIT` clauses
pub const DEFAULT_ROW_LIMIT: u64 = 1000;

/// Default retry budget per request
pub const DEFAULT_MAX_RETRIES: u32 = 2;

/// Whether `name` is an ASCII identifier safe to splice into SQL unquoted
#[must_use]
pub fn is_plain_identifier(name: &str) -> bool {
    name.chars()
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// QUARRY configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QuarryConfig {
    /// The single table statements may reference
    pub table_name: String,
    /// CSV file loaded as the canonical dataset
    pub dataset_path: PathBuf,
    /// Row limit injected on timeout retries and by `sanitize`
    pub row_limit: u64,
    /// Retry budget per request
    pub max_retries: u32,
    /// Per-statement timeout in milliseconds (0 = no limit)
    pub statement_timeout_ms: u64,
    /// Whether terminal failures are appended to the failure log
    pub log_failures: bool,
    /// JSON-lines failure log location
    pub failure_log_path: PathBuf,
}

impl Default for QuarryConfig {
    fn default() -> Self {
        Self {
            table_name: DEFAULT_TABLE_NAME.to_string(),
            dataset_path: PathBuf::from("data/done_des.csv"),
            row_limit: DEFAULT_ROW_LIMIT,
            max_retries: DEFAULT_MAX_RETRIES,
            statement_timeout_ms: 30_000,
            log_failures: true,
            failure_log_path: PathBuf::from("logs/query_errors.jsonl"),
        }
    }
}

impl QuarryConfig {
    /// Load from a JSON file; missing fields take their defaults
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be read, is not valid JSON, or
    /// fails [`QuarryConfig::validate`]
    pub fn from_json_file(path: impl AsRef<Path>) -> CoreResult<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|err| match err.kind() {
            std::io::ErrorKind::NotFound => CoreError::NotFound {
                kind: "Config file".to_string(),
                id: path.display().to_string(),
            },
            _ => CoreError::from(err),
        })?;
        let config: Self = serde_json::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Set the permitted table name
    #[must_use]
    pub fn with_table_name(mut self, name: impl Into<String>) -> Self {
        self.table_name = name.into();
        self
    }

    /// Set the dataset path
    #[must_use]
    pub fn with_dataset_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.dataset_path = path.into();
        self
    }

    /// Set the row limit
    #[must_use]
    pub fn with_row_limit(mut self, limit: u64) -> Self {
        self.row_limit = limit;
        self
    }

    /// Set the retry budget
    #[must_use]
    pub fn with_max_retries(mut self, retries: u32) -> Self {
        self.max_retries = retries;
        self
    }

    /// Set the statement timeout in milliseconds
    #[must_use]
    pub fn with_statement_timeout_ms(mut self, millis: u64) -> Self {
        self.statement_timeout_ms = millis;
        self
    }

    /// Enable or disable failure logging
    #[must_use]
    pub fn with_log_failures(mut self, enabled: bool) -> Self {
        self.log_failures = enabled;
        self
    }

    /// Set the failure log path
    #[must_use]
    pub fn with_failure_log_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.failure_log_path = path.into();
        self
    }

    /// Statement timeout, if any
    #[must_use]
    pub fn statement_timeout(&self) -> Option<Duration> {
        (self.statement_timeout_ms > 0).then(|| Duration::from_millis(self.statement_timeout_ms))
    }

    /// Check values the rest of the system relies on
    ///
    /// # Errors
    ///
    /// Returns error if the table name is not a plain identifier or the row
    /// limit is zero
    pub fn validate(&self) -> CoreResult<()> {
        let name = self.table_name.as_str();
        if !is_plain_identifier(name) {
            return Err(CoreError::InvalidConfig {
                field: "table_name".to_string(),
                reason: format!("'{}' is not a plain identifier", name),
            });
        }

        if self.row_limit == 0 {
            return Err(CoreError::InvalidConfig {
                field: "row_limit".to_string(),
                reason: "must be positive".to_string(),
            });
        }

        Ok(())
    }
}
