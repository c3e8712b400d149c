//! QUARRY Query Engine
//!
//! Engine interface, failure classification, and the DataFusion backend
//! that serves the canonical dataset. Engines execute exactly what they
//! are given; they never retry or rewrite.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod trait_;
pub mod schema;
pub mod table;
pub mod adapter;
pub mod session;

pub use trait_::{EngineError, QueryEngine};
pub use schema::{ColumnInfo, describe_columns};
pub use table::Table;
pub use adapter::{EngineAdapter, ExecutionOutcome, classify};
pub use session::DataFusionEngine;
