//! Operator-side reader for the failure log.
//!
//! The recovery path never reads the log back; this exists for tooling.

use crate::record::FailureRecord;
use crate::sink::LogError;
use std::collections::VecDeque;
use std::fs::File;
use std::io::{BufRead, BufReader, ErrorKind};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Records read back from a log, plus how many lines were unreadable
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LogTail {
    /// Decoded records, oldest first
    pub records: Vec<FailureRecord>,
    /// Lines skipped because they did not decode
    pub malformed: usize,
}

/// Reads a JSON-lines failure log
#[derive(Debug, Clone)]
pub struct FailureLogReader {
    path: PathBuf,
}

impl FailureLogReader {
    /// Reader for `path`
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Log file location
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Every record in the log
    ///
    /// A missing file reads as empty.
    ///
    /// # Errors
    ///
    /// Returns error if the file exists but cannot be read
    pub fn read_all(&self) -> Result<LogTail, LogError> {
        self.scan(usize::MAX)
    }

    /// The last `n` records
    ///
    /// # Errors
    ///
    /// Returns error if the file exists but cannot be read
    pub fn tail(&self, n: usize) -> Result<LogTail, LogError> {
        self.scan(n)
    }

    fn scan(&self, keep: usize) -> Result<LogTail, LogError> {
        let io_error = |source| LogError::Io {
            path: self.path.display().to_string(),
            source,
        };
        let file = match File::open(&self.path) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(LogTail::default()),
            Err(e) => return Err(io_error(e)),
        };

        let mut records = VecDeque::new();
        let mut malformed = 0;
        for line in BufReader::new(file).lines() {
            let line = line.map_err(io_error)?;
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<FailureRecord>(&line) {
                Ok(record) => {
                    if keep == 0 {
                        continue;
                    }
                    if records.len() == keep {
                        records.pop_front();
                    }
                    records.push_back(record);
                }
                Err(e) => {
                    debug!(error = %e, "skipping malformed failure log line");
                    malformed += 1;
                }
            }
        }

        Ok(LogTail {
            records: records.into(),
            malformed,
        })
    }
}
