//! Terminal outcomes returned to callers.

use crate::state::StateKind;
use quarry_core::{ErrorClass, FailureCode, ValidationReason};
use quarry_engine::Table;
use serde::Serialize;

/// Why a request failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum FailureKind {
    /// The candidate never passed the policy gate
    Rejected(ValidationReason),
    /// The engine ran the statement and it failed
    Execution(ErrorClass),
    /// The regenerated candidate did not pass the policy gate
    RegenerationInvalid(ValidationReason),
    /// Regeneration failed or its statement failed to execute
    RegenerationFailed,
}

impl FailureKind {
    /// Taxonomy code
    #[must_use]
    pub fn code(self) -> FailureCode {
        match self {
            Self::Rejected(reason) => reason.into(),
            Self::Execution(class) => class.into(),
            Self::RegenerationInvalid(_) => FailureCode::RegenerationInvalid,
            Self::RegenerationFailed => FailureCode::RegenerationFailed,
        }
    }

    /// Whether rephrasing the question could help
    ///
    /// Policy and regeneration failures and malformed statements are
    /// actionable. Timeouts and other engine failures are systemic.
    #[must_use]
    pub fn is_actionable(self) -> bool {
        match self {
            Self::Execution(class) => class.is_malformed(),
            Self::Rejected(_) | Self::RegenerationInvalid(_) | Self::RegenerationFailed => true,
        }
    }
}

/// What happened during one request
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RecoveryTrace {
    /// States visited, in order
    pub states: Vec<StateKind>,
    /// Statements sent to the engine
    pub executions: u32,
    /// Local retries taken
    pub retries: u32,
    /// Whether a row limit was injected on retry
    pub limit_injected: bool,
    /// Whether the regenerator was called
    pub regeneration_attempted: bool,
    /// Last statement tried, if any was extracted
    pub last_statement: Option<String>,
}

impl RecoveryTrace {
    /// Times `kind` was entered
    #[must_use]
    pub fn visits(&self, kind: StateKind) -> usize {
        self.states.iter().filter(|s| **s == kind).count()
    }
}

/// Successful request
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SuccessOutcome {
    /// Result rows, possibly empty
    pub table: Table,
    /// Statement that produced them
    pub statement: String,
    /// Whether the statement came from the regenerator
    pub regenerated: bool,
    /// Caller-facing message
    pub message: String,
    /// Request trace
    pub trace: RecoveryTrace,
}

/// Failed request
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailureOutcome {
    /// Failure category
    pub kind: FailureKind,
    /// Caller-facing message
    pub message: String,
    /// Request trace
    pub trace: RecoveryTrace,
}

/// Terminal result of a request
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RecoveryOutcome {
    /// Rows were returned (possibly none)
    Success(SuccessOutcome),
    /// No result
    Failed(FailureOutcome),
}

impl RecoveryOutcome {
    /// Whether the request succeeded
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    /// Caller-facing message
    #[must_use]
    pub fn message(&self) -> &str {
        match self {
            Self::Success(s) => &s.message,
            Self::Failed(f) => &f.message,
        }
    }

    /// Request trace
    #[must_use]
    pub fn trace(&self) -> &RecoveryTrace {
        match self {
            Self::Success(s) => &s.trace,
            Self::Failed(f) => &f.trace,
        }
    }

    /// Result rows on success
    #[must_use]
    pub fn table(&self) -> Option<&Table> {
        match self {
            Self::Success(s) => Some(&s.table),
            Self::Failed(_) => None,
        }
    }

    /// Failure category on failure
    #[must_use]
    pub fn failure(&self) -> Option<FailureKind> {
        match self {
            Self::Success(_) => None,
            Self::Failed(f) => Some(f.kind),
        }
    }

    /// Failure taxonomy code on failure
    #[must_use]
    pub fn code(&self) -> Option<FailureCode> {
        self.failure().map(FailureKind::code)
    }
}
