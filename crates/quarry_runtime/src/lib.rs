//! QUARRY Runtime
//!
//! The recovery orchestrator: an explicit state machine that screens a
//! candidate statement, executes it, and recovers from failures with
//! bounded local retries and at most one regeneration.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod state;
pub mod outcome;
pub mod regenerate;
pub mod orchestrator;
pub mod monitor;

pub use state::{RecoveryState, StateKind};
pub use outcome::{FailureKind, FailureOutcome, RecoveryOutcome, RecoveryTrace, SuccessOutcome};
pub use regenerate::{FnRegenerator, RegenerationError, RegenerationRequest, Regenerator};
pub use orchestrator::RecoveryOrchestrator;
pub use monitor::{MetricsSnapshot, RecoveryMetrics};
