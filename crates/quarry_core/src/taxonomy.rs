//! Failure taxonomy shared by the validator, the engine adapter, and the
//! recovery orchestrator.
//!
//! Three families exist: validation-time reasons, execution-time classes,
//! and the recovery-time codes produced when regeneration goes wrong. The
//! flat [`FailureCode`] is what operators and callers see.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Why the policy validator rejected a statement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationReason {
    /// Empty, whitespace-only, or no extractable statement
    Empty,
    /// Data- or schema-mutating keyword present
    ForbiddenKeyword,
    /// Statement does not begin with SELECT
    NotSelect,
    /// Statement does not reference the permitted table
    WrongTable,
}

impl ValidationReason {
    /// Snake-case code
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Empty => "empty",
            Self::ForbiddenKeyword => "forbidden_keyword",
            Self::NotSelect => "not_select",
            Self::WrongTable => "wrong_table",
        }
    }

    /// Human-readable explanation
    #[must_use]
    pub const fn describe(self) -> &'static str {
        match self {
            Self::Empty => "Empty SQL query",
            Self::ForbiddenKeyword => "Only SELECT queries are allowed",
            Self::NotSelect => "Query must start with SELECT",
            Self::WrongTable => "Query must target the permitted table",
        }
    }
}

impl fmt::Display for ValidationReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Class inferred from a query engine error message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorClass {
    /// Engine reported a timeout
    Timeout,
    /// Engine reported a syntax error
    SyntaxError,
    /// Engine reported a parser error
    ParserError,
    /// Anything else
    Other,
}

impl ErrorClass {
    /// Snake-case code
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Timeout => "timeout",
            Self::SyntaxError => "syntax_error",
            Self::ParserError => "parser_error",
            Self::Other => "other",
        }
    }

    /// Whether regenerating the statement could plausibly help
    #[must_use]
    pub const fn is_malformed(self) -> bool {
        matches!(self, Self::SyntaxError | Self::ParserError)
    }
}

impl fmt::Display for ErrorClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Flat failure code across all three families
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureCode {
    /// See [`ValidationReason::Empty`]
    Empty,
    /// See [`ValidationReason::ForbiddenKeyword`]
    ForbiddenKeyword,
    /// See [`ValidationReason::NotSelect`]
    NotSelect,
    /// See [`ValidationReason::WrongTable`]
    WrongTable,
    /// See [`ErrorClass::Timeout`]
    Timeout,
    /// See [`ErrorClass::SyntaxError`]
    SyntaxError,
    /// See [`ErrorClass::ParserError`]
    ParserError,
    /// See [`ErrorClass::Other`]
    Other,
    /// Regenerated statement failed policy validation
    RegenerationInvalid,
    /// Regeneration call or its execution failed
    RegenerationFailed,
}

impl FailureCode {
    /// Snake-case code
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Empty => "empty",
            Self::ForbiddenKeyword => "forbidden_keyword",
            Self::NotSelect => "not_select",
            Self::WrongTable => "wrong_table",
            Self::Timeout => "timeout",
            Self::SyntaxError => "syntax_error",
            Self::ParserError => "parser_error",
            Self::Other => "other",
            Self::RegenerationInvalid => "regeneration_invalid",
            Self::RegenerationFailed => "regeneration_failed",
        }
    }

    /// Validation-time code
    #[must_use]
    pub const fn is_validation(self) -> bool {
        matches!(
            self,
            Self::Empty | Self::ForbiddenKeyword | Self::NotSelect | Self::WrongTable
        )
    }

    /// Execution-time code
    #[must_use]
    pub const fn is_execution(self) -> bool {
        matches!(
            self,
            Self::Timeout | Self::SyntaxError | Self::ParserError | Self::Other
        )
    }

    /// Recovery-time code
    #[must_use]
    pub const fn is_recovery(self) -> bool {
        matches!(self, Self::RegenerationInvalid | Self::RegenerationFailed)
    }
}

impl fmt::Display for FailureCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<ValidationReason> for FailureCode {
    fn from(reason: ValidationReason) -> Self {
        match reason {
            ValidationReason::Empty => Self::Empty,
            ValidationReason::ForbiddenKeyword => Self::ForbiddenKeyword,
            ValidationReason::NotSelect => Self::NotSelect,
            ValidationReason::WrongTable => Self::WrongTable,
        }
    }
}

impl From<ErrorClass> for FailureCode {
    fn from(class: ErrorClass) -> Self {
        match class {
            ErrorClass::Timeout => Self::Timeout,
            ErrorClass::SyntaxError => Self::SyntaxError,
            ErrorClass::ParserError => Self::ParserError,
            ErrorClass::Other => Self::Other,
        }
    }
}
