//! QUARRY Core Types
//!
//! This crate contains the failure taxonomy, request identifiers, and
//! configuration shared by every other crate. Apart from config file
//! loading it performs no I/O.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod error;
pub mod id;
pub mod taxonomy;

// Re-exports
pub use config::{is_plain_identifier, QuarryConfig, DEFAULT_MAX_RETRIES, DEFAULT_ROW_LIMIT, DEFAULT_TABLE_NAME};
pub use error::{CoreError, CoreResult};
pub use id::RequestId;
pub use taxonomy::{ErrorClass, FailureCode, ValidationReason};
