//! Failure records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One terminal failure, self-contained
///
/// Serialized as a single JSON object: `timestamp`, `question`, `sql`,
/// `error`. Records never refer to one another.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureRecord {
    /// When the failure was recorded (RFC 3339)
    pub timestamp: DateTime<Utc>,
    /// Original natural-language question, empty if none was given
    pub question: String,
    /// Last statement tried
    pub sql: String,
    /// Final error message
    pub error: String,
}

impl FailureRecord {
    /// Record stamped with the current time
    #[must_use]
    pub fn new(
        question: impl Into<String>,
        sql: impl Into<String>,
        error: impl Into<String>,
    ) -> Self {
        Self::at(Utc::now(), question, sql, error)
    }

    /// Record with an explicit timestamp
    #[must_use]
    pub fn at(
        timestamp: DateTime<Utc>,
        question: impl Into<String>,
        sql: impl Into<String>,
        error: impl Into<String>,
    ) -> Self {
        Self {
            timestamp,
            question: question.into(),
            sql: sql.into(),
            error: error.into(),
        }
    }

    /// Encode as one line of JSON, newline included
    ///
    /// # Errors
    ///
    /// Returns error if serialization fails
    pub fn to_line(&self) -> Result<String, serde_json::Error> {
        let mut line = serde_json::to_string(self)?;
        line.push('\n');
        Ok(line)
    }
}
