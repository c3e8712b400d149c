//! Query engine trait

use crate::schema::ColumnInfo;
use crate::table::Table;
use async_trait::async_trait;
use quarry_core::CoreError;

/// Error reported by a query engine
///
/// The display text is the raw message the adapter classifies, so variants
/// phrase themselves the way engines conventionally do (`Parser Error: ...`,
/// `Query timeout: ...`).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EngineError {
    /// No open connection
    #[error("Connection closed: open the engine before executing")]
    Closed,

    /// Canonical dataset missing
    #[error("Dataset not found: {path}")]
    DatasetMissing {
        /// Path that was looked up
        path: String,
    },

    /// Table name is not a plain identifier
    #[error("Invalid table name: '{name}' is not a plain identifier")]
    InvalidTable {
        /// Rejected name
        name: String,
    },

    /// Statement exceeded the engine's time budget
    #[error("Query timeout: statement exceeded {millis} ms")]
    Timeout {
        /// Budget in milliseconds
        millis: u64,
    },

    /// Statement could not be parsed
    #[error("Parser Error: {0}")]
    Parse(String),

    /// Any other engine failure
    #[error("{0}")]
    Execution(String),
}

impl From<EngineError> for CoreError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::DatasetMissing { path } => CoreError::NotFound {
                kind: "Dataset".to_string(),
                id: path,
            },
            EngineError::InvalidTable { name } => CoreError::InvalidConfig {
                field: "table_name".to_string(),
                reason: format!("'{}' is not a plain identifier", name),
            },
            EngineError::Timeout { millis } => CoreError::Timeout {
                operation: format!("statement exceeded {} ms", millis),
            },
            EngineError::Parse(_) => CoreError::Validation {
                field: "sql".to_string(),
                reason: err.to_string(),
            },
            EngineError::Closed | EngineError::Execution(_) => CoreError::Internal {
                message: err.to_string(),
            },
        }
    }
}

/// An analytic engine holding the canonical dataset
///
/// Implementations execute exactly one statement per call and materialize
/// the full result. They never retry or rewrite statements.
#[async_trait]
pub trait QueryEngine: Send + Sync {
    /// Engine name for logs
    fn name(&self) -> &str;

    /// Open the connection and load the dataset; a second call is a no-op
    ///
    /// # Errors
    ///
    /// Returns error if the dataset cannot be loaded
    async fn open(&self) -> Result<(), EngineError> {
        Ok(())
    }

    /// Release the connection
    ///
    /// # Errors
    ///
    /// Returns error if the engine fails to shut down cleanly
    async fn close(&self) -> Result<(), EngineError> {
        Ok(())
    }

    /// Execute one statement
    ///
    /// # Errors
    ///
    /// Returns the engine's error for any failed statement
    async fn execute(&self, sql: &str) -> Result<Table, EngineError>;

    /// Rows in the canonical table
    ///
    /// # Errors
    ///
    /// Returns error if the count query fails
    async fn row_count(&self) -> Result<u64, EngineError>;

    /// Columns of the canonical table
    ///
    /// # Errors
    ///
    /// Returns error if the table cannot be described
    async fn schema(&self) -> Result<Vec<ColumnInfo>, EngineError>;
}
