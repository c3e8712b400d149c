//! QUARRY Failure Log
//!
//! Append-only record of terminal failures for post-hoc operator analysis.
//! Every record is one self-contained JSON line. The engine writes here
//! but never reads back.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod record;
pub mod sink;
pub mod reader;

pub use record::FailureRecord;
pub use sink::{FailureSink, JsonlFailureLog, LogError, MemoryFailureLog};
pub use reader::{FailureLogReader, LogTail};
