//! Failure sinks.
//!
//! Writers only append. A record is written with a single `write_all`
//! while holding the sink's lock, so concurrent writers never interleave
//! partial lines.

use crate::record::FailureRecord;
use quarry_core::CoreError;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use tracing::trace;

/// Failure log errors
#[derive(Debug, thiserror::Error)]
pub enum LogError {
    /// File could not be opened or written
    #[error("failure log I/O on {path}: {source}")]
    Io {
        /// Log file path
        path: String,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// Record could not be encoded
    #[error("failure record encoding: {0}")]
    Encode(#[from] serde_json::Error),

    /// A writer panicked while holding the lock
    #[error("failure log lock poisoned")]
    Poisoned,
}

impl From<LogError> for CoreError {
    fn from(err: LogError) -> Self {
        CoreError::Io {
            reason: err.to_string(),
        }
    }
}

/// Destination for terminal failures
pub trait FailureSink: Send + Sync {
    /// Append one record
    ///
    /// # Errors
    ///
    /// Returns error if the record cannot be persisted
    fn record(&self, record: &FailureRecord) -> Result<(), LogError>;
}

/// JSON-lines file sink
///
/// The file is opened lazily in append mode and created on first write.
/// The parent directory must already exist.
#[derive(Debug)]
pub struct JsonlFailureLog {
    path: PathBuf,
    file: Mutex<Option<File>>,
}

impl JsonlFailureLog {
    /// Sink writing to `path`
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            file: Mutex::new(None),
        }
    }

    /// Log file location
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_error(&self, source: std::io::Error) -> LogError {
        LogError::Io {
            path: self.path.display().to_string(),
            source,
        }
    }
}

impl FailureSink for JsonlFailureLog {
    fn record(&self, record: &FailureRecord) -> Result<(), LogError> {
        let line = record.to_line()?;
        let mut guard = self.file.lock().map_err(|_| LogError::Poisoned)?;
        if guard.is_none() {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&self.path)
                .map_err(|e| self.io_error(e))?;
            *guard = Some(file);
        }
        if let Some(file) = guard.as_mut() {
            file.write_all(line.as_bytes())
                .and_then(|()| file.flush())
                .map_err(|e| self.io_error(e))?;
        }
        trace!(path = %self.path.display(), "failure recorded");
        Ok(())
    }
}

/// In-memory sink
#[derive(Debug, Default)]
pub struct MemoryFailureLog {
    records: Mutex<Vec<FailureRecord>>,
}

impl MemoryFailureLog {
    /// Empty sink
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of recorded failures, oldest first
    #[must_use]
    pub fn records(&self) -> Vec<FailureRecord> {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Number of recorded failures
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// True when nothing has been recorded
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl FailureSink for MemoryFailureLog {
    fn record(&self, record: &FailureRecord) -> Result<(), LogError> {
        self.records
            .lock()
            .map_err(|_| LogError::Poisoned)?
            .push(record.clone());
        Ok(())
    }
}
