//! DataFusion-backed engine over a CSV dataset.
//!
//! The CSV is registered once per open session under the configured table
//! name. Identifier normalization is off so mixed-case header names such as
//! `Value` or `Year` resolve without quoting.

use crate::schema::ColumnInfo;
use crate::table::Table;
use crate::trait_::{EngineError, QueryEngine};
use async_trait::async_trait;
use datafusion::error::DataFusionError;
use datafusion::prelude::{CsvReadOptions, SessionConfig, SessionContext};
use quarry_core::{is_plain_identifier, QuarryConfig};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

impl From<DataFusionError> for EngineError {
    fn from(err: DataFusionError) -> Self {
        match err.find_root() {
            DataFusionError::SQL(..) => EngineError::Parse(err.find_root().to_string()),
            _ => EngineError::Execution(err.to_string()),
        }
    }
}

/// Engine holding one DataFusion session with the dataset registered
///
/// The session is shared across concurrent callers; each statement runs on
/// a cheap clone of the context, so `close` never interrupts a running
/// statement.
pub struct DataFusionEngine {
    table_name: String,
    dataset_path: PathBuf,
    statement_timeout: Option<Duration>,
    session: RwLock<Option<SessionContext>>,
}

impl DataFusionEngine {
    /// Engine serving `dataset_path` as `table_name`
    #[must_use]
    pub fn new(table_name: impl Into<String>, dataset_path: impl Into<PathBuf>) -> Self {
        Self {
            table_name: table_name.into(),
            dataset_path: dataset_path.into(),
            statement_timeout: None,
            session: RwLock::new(None),
        }
    }

    /// Engine from configuration
    #[must_use]
    pub fn from_config(config: &QuarryConfig) -> Self {
        Self::new(config.table_name.clone(), config.dataset_path.clone())
            .with_statement_timeout(config.statement_timeout())
    }

    /// Set the per-statement timeout
    #[must_use]
    pub fn with_statement_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.statement_timeout = timeout;
        self
    }

    /// Table the dataset is registered as
    #[must_use]
    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    /// Dataset location
    #[must_use]
    pub fn dataset_path(&self) -> &Path {
        &self.dataset_path
    }

    /// Whether a session is open
    pub async fn is_open(&self) -> bool {
        self.session.read().await.is_some()
    }

    async fn context(&self) -> Result<SessionContext, EngineError> {
        self.session.read().await.clone().ok_or(EngineError::Closed)
    }

    async fn run(ctx: SessionContext, sql: String) -> Result<Table, EngineError> {
        let df = ctx.sql(&sql).await?;
        let columns = df
            .schema()
            .fields()
            .iter()
            .map(|f| f.name().clone())
            .collect();
        let batches = df.collect().await?;
        Table::from_batches(columns, &batches)
    }
}

impl std::fmt::Debug for DataFusionEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DataFusionEngine")
            .field("table_name", &self.table_name)
            .field("dataset_path", &self.dataset_path)
            .field("statement_timeout", &self.statement_timeout)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl QueryEngine for DataFusionEngine {
    fn name(&self) -> &str {
        "datafusion"
    }

    async fn open(&self) -> Result<(), EngineError> {
        let mut session = self.session.write().await;
        if session.is_some() {
            return Ok(());
        }
        if !is_plain_identifier(&self.table_name) {
            return Err(EngineError::InvalidTable {
                name: self.table_name.clone(),
            });
        }
        if !self.dataset_path.is_file() {
            return Err(EngineError::DatasetMissing {
                path: self.dataset_path.display().to_string(),
            });
        }

        let mut config = SessionConfig::new();
        config.options_mut().sql_parser.enable_ident_normalization = false;
        let ctx = SessionContext::new_with_config(config);

        let path = self.dataset_path.to_string_lossy();
        ctx.register_csv(self.table_name.as_str(), path.as_ref(), CsvReadOptions::new())
            .await?;

        info!(table = %self.table_name, path = %path, "dataset loaded");
        *session = Some(ctx);
        Ok(())
    }

    async fn close(&self) -> Result<(), EngineError> {
        if self.session.write().await.take().is_some() {
            debug!(table = %self.table_name, "session closed");
        }
        Ok(())
    }

    async fn execute(&self, sql: &str) -> Result<Table, EngineError> {
        let ctx = self.context().await?;
        let run = Self::run(ctx, sql.to_string());
        let Some(limit) = self.statement_timeout else {
            return run.await;
        };

        // Planning and collection are CPU-bound and rarely yield, so the
        // statement runs on its own task for the timer to fire.
        let mut handle = tokio::spawn(run);
        match tokio::time::timeout(limit, &mut handle).await {
            Ok(joined) => joined
                .map_err(|err| EngineError::Execution(format!("statement task failed: {}", err)))?,
            Err(_) => {
                handle.abort();
                let millis = u64::try_from(limit.as_millis()).unwrap_or(u64::MAX);
                warn!(table = %self.table_name, millis, "statement timed out");
                Err(EngineError::Timeout { millis })
            }
        }
    }

    async fn row_count(&self) -> Result<u64, EngineError> {
        let table = self
            .execute(&format!("SELECT COUNT(*) AS row_count FROM {}", self.table_name))
            .await?;
        match table.get(0, "row_count") {
            Some(Value::Number(n)) => n
                .as_u64()
                .ok_or_else(|| EngineError::Execution(format!("invalid row count: {}", n))),
            other => Err(EngineError::Execution(format!(
                "unexpected row count result: {:?}",
                other
            ))),
        }
    }

    async fn schema(&self) -> Result<Vec<ColumnInfo>, EngineError> {
        let ctx = self.context().await?;
        let df = ctx.table(self.table_name.as_str()).await?;
        Ok(df
            .schema()
            .fields()
            .iter()
            .map(|f| {
                ColumnInfo::new(f.name().clone(), f.data_type().to_string())
                    .with_nullable(f.is_nullable())
            })
            .collect())
    }
}
