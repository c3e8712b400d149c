//! Engine adapter with failure classification.

use crate::schema::ColumnInfo;
use crate::table::Table;
use crate::trait_::{EngineError, QueryEngine};
use quarry_core::ErrorClass;
use serde::Serialize;
use std::sync::Arc;
use tracing::debug;

/// Map a raw engine message onto the error taxonomy
///
/// Case-insensitive substring checks, first match wins: `timeout`, then
/// `syntax error`, then `parser error`.
#[must_use]
pub fn classify(message: &str) -> ErrorClass {
    let lower = message.to_lowercase();
    if lower.contains("timeout") {
        ErrorClass::Timeout
    } else if lower.contains("syntax error") {
        ErrorClass::SyntaxError
    } else if lower.contains("parser error") {
        ErrorClass::ParserError
    } else {
        ErrorClass::Other
    }
}

/// Result of one statement execution
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExecutionOutcome {
    /// Whether the engine returned a result
    pub success: bool,
    /// Result rows; empty on failure
    pub table: Table,
    /// Classified failure, present only on failure
    pub error_class: Option<ErrorClass>,
    /// Engine message, present only on failure
    pub raw_message: Option<String>,
}

impl ExecutionOutcome {
    /// Successful execution
    #[must_use]
    pub fn succeeded(table: Table) -> Self {
        Self {
            success: true,
            table,
            error_class: None,
            raw_message: None,
        }
    }

    /// Failed execution, classified from `message`
    #[must_use]
    pub fn failed(message: impl Into<String>) -> Self {
        let message = message.into();
        Self {
            success: false,
            table: Table::default(),
            error_class: Some(classify(&message)),
            raw_message: Some(message),
        }
    }

    /// Rows returned
    #[must_use]
    pub fn row_count(&self) -> usize {
        self.table.len()
    }
}

/// Runs statements on an engine and reports classified outcomes
///
/// Executes exactly once per call. Retrying and rewriting belong to the
/// recovery layer.
#[derive(Clone)]
pub struct EngineAdapter {
    engine: Arc<dyn QueryEngine>,
}

impl EngineAdapter {
    /// Wrap an engine
    #[must_use]
    pub fn new(engine: Arc<dyn QueryEngine>) -> Self {
        Self { engine }
    }

    /// The wrapped engine
    #[must_use]
    pub fn engine(&self) -> &Arc<dyn QueryEngine> {
        &self.engine
    }

    /// Open the engine
    ///
    /// # Errors
    ///
    /// Returns error if the dataset cannot be loaded
    pub async fn open(&self) -> Result<(), EngineError> {
        self.engine.open().await
    }

    /// Close the engine
    ///
    /// # Errors
    ///
    /// Returns error if the engine fails to shut down cleanly
    pub async fn close(&self) -> Result<(), EngineError> {
        self.engine.close().await
    }

    /// Execute `sql` once; failures are reported, never raised
    pub async fn execute(&self, sql: &str) -> ExecutionOutcome {
        match self.engine.execute(sql).await {
            Ok(table) => {
                debug!(engine = self.engine.name(), rows = table.len(), "statement succeeded");
                ExecutionOutcome::succeeded(table)
            }
            Err(err) => {
                let outcome = ExecutionOutcome::failed(err.to_string());
                debug!(
                    engine = self.engine.name(),
                    class = ?outcome.error_class,
                    error = %err,
                    "statement failed"
                );
                outcome
            }
        }
    }

    /// Rows in the canonical table
    ///
    /// # Errors
    ///
    /// Returns error if the count query fails
    pub async fn row_count(&self) -> Result<u64, EngineError> {
        self.engine.row_count().await
    }

    /// Columns of the canonical table
    ///
    /// # Errors
    ///
    /// Returns error if the table cannot be described
    pub async fn schema(&self) -> Result<Vec<ColumnInfo>, EngineError> {
        self.engine.schema().await
    }
}

impl std::fmt::Debug for EngineAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineAdapter")
            .field("engine", &self.engine.name())
            .finish()
    }
}

/// In-memory engines for wiring and tests
pub mod builtin {
    use super::*;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::{Mutex, PoisonError};

    /// Engine that answers every statement with the same table
    #[derive(Debug, Clone, Default)]
    pub struct StaticEngine {
        table: Table,
        columns: Vec<ColumnInfo>,
    }

    impl StaticEngine {
        /// Engine returning `table`
        #[must_use]
        pub fn new(table: Table) -> Self {
            let columns = table
                .columns()
                .iter()
                .map(|c| ColumnInfo::new(c.clone(), "Utf8"))
                .collect();
            Self { table, columns }
        }
    }

    #[async_trait]
    impl QueryEngine for StaticEngine {
        fn name(&self) -> &str {
            "static"
        }

        async fn execute(&self, _sql: &str) -> Result<Table, EngineError> {
            Ok(self.table.clone())
        }

        async fn row_count(&self) -> Result<u64, EngineError> {
            Ok(self.table.len() as u64)
        }

        async fn schema(&self) -> Result<Vec<ColumnInfo>, EngineError> {
            Ok(self.columns.clone())
        }
    }

    /// Engine that replays a script of responses and records what it ran
    ///
    /// Once the script runs out every statement succeeds with an empty table.
    #[derive(Debug, Default)]
    pub struct ScriptedEngine {
        script: Mutex<VecDeque<Result<Table, EngineError>>>,
        seen: Mutex<Vec<String>>,
    }

    impl ScriptedEngine {
        /// Engine with an empty script
        #[must_use]
        pub fn new() -> Self {
            Self::default()
        }

        /// Queue a successful response
        #[must_use]
        pub fn then_ok(self, table: Table) -> Self {
            self.push(Ok(table));
            self
        }

        /// Queue a failure
        #[must_use]
        pub fn then_err(self, err: EngineError) -> Self {
            self.push(Err(err));
            self
        }

        fn push(&self, response: Result<Table, EngineError>) {
            self.script
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push_back(response);
        }

        /// Statements executed so far, in order
        #[must_use]
        pub fn statements(&self) -> Vec<String> {
            self.seen
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .clone()
        }

        /// Number of executions so far
        #[must_use]
        pub fn calls(&self) -> usize {
            self.seen.lock().unwrap_or_else(PoisonError::into_inner).len()
        }
    }

    #[async_trait]
    impl QueryEngine for ScriptedEngine {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn execute(&self, sql: &str) -> Result<Table, EngineError> {
            self.seen
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push(sql.to_string());
            self.script
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .pop_front()
                .unwrap_or_else(|| Ok(Table::default()))
        }

        async fn row_count(&self) -> Result<u64, EngineError> {
            Ok(0)
        }

        async fn schema(&self) -> Result<Vec<ColumnInfo>, EngineError> {
            Ok(Vec::new())
        }
    }
}
