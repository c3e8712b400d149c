//! Recovery state machine states.

use crate::outcome::FailureKind;
use quarry_core::ErrorClass;
use quarry_engine::Table;
use quarry_policy::ExtractedStatement;
use serde::Serialize;
use std::fmt;

/// Discriminant of [`RecoveryState`], recorded in traces
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StateKind {
    /// Screening the candidate
    Validating,
    /// Running a statement
    Executing,
    /// Preparing a local retry
    Retrying,
    /// Asking the regenerator for a replacement
    Regenerating,
    /// Terminal success
    Success,
    /// Terminal failure
    Failed,
}

impl StateKind {
    /// Whether no transition leaves this state
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Success | Self::Failed)
    }
}

impl fmt::Display for StateKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Validating => "validating",
            Self::Executing => "executing",
            Self::Retrying => "retrying",
            Self::Regenerating => "regenerating",
            Self::Success => "success",
            Self::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// One state of a request, carrying what the next transition needs
#[derive(Debug, Clone, PartialEq)]
pub enum RecoveryState {
    /// Screen the raw candidate
    Validating,
    /// Execute `statement`
    Executing {
        /// Statement to run
        statement: ExtractedStatement,
    },
    /// Retry after a failure of class `class`
    Retrying {
        /// Statement that failed
        statement: ExtractedStatement,
        /// How it failed
        class: ErrorClass,
    },
    /// Replace the statement via the regenerator
    Regenerating {
        /// Error that triggered regeneration
        cause: String,
    },
    /// Finished with a result
    Success {
        /// Statement that produced the result
        statement: ExtractedStatement,
        /// Result rows
        table: Table,
    },
    /// Finished without a result
    Failed {
        /// Failure category
        kind: FailureKind,
        /// Caller-facing message
        message: String,
    },
}

impl RecoveryState {
    /// Discriminant
    #[must_use]
    pub const fn kind(&self) -> StateKind {
        match self {
            Self::Validating => StateKind::Validating,
            Self::Executing { .. } => StateKind::Executing,
            Self::Retrying { .. } => StateKind::Retrying,
            Self::Regenerating { .. } => StateKind::Regenerating,
            Self::Success { .. } => StateKind::Success,
            Self::Failed { .. } => StateKind::Failed,
        }
    }

    /// Whether this state ends the request
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        self.kind().is_terminal()
    }
}
