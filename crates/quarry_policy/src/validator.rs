//! Policy gate for candidate statements.
//!
//! Four rules, checked in order and short-circuiting:
//!
//! 1. the text is not empty,
//! 2. no data- or schema-mutating keyword appears anywhere in it,
//! 3. it begins with `SELECT`,
//! 4. it references the permitted table.

use crate::extract::{ExtractedStatement, extract};
use crate::matcher::Matcher;
use quarry_core::{CoreError, DEFAULT_TABLE_NAME, ValidationReason};
use serde::Serialize;

/// Outcome of a policy check
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ValidationVerdict {
    /// Whether every rule passed
    pub valid: bool,
    /// First failing rule, if any
    pub reason: Option<ValidationReason>,
}

impl ValidationVerdict {
    /// Passing verdict
    #[must_use]
    pub const fn valid() -> Self {
        Self {
            valid: true,
            reason: None,
        }
    }

    /// Failing verdict
    #[must_use]
    pub const fn rejected(reason: ValidationReason) -> Self {
        Self {
            valid: false,
            reason: Some(reason),
        }
    }

    /// Whether the statement passed
    #[must_use]
    pub const fn is_valid(&self) -> bool {
        self.valid
    }

    /// Convert into a result for callers that propagate errors
    ///
    /// # Errors
    ///
    /// Returns a validation error naming the failed rule
    pub fn into_result(self) -> Result<(), CoreError> {
        match self.reason {
            None => Ok(()),
            Some(reason) => Err(CoreError::Validation {
                field: "policy".to_string(),
                reason: format!("{}: {}", reason, reason.describe()),
            }),
        }
    }
}

/// A screened candidate: its verdict plus the statement to execute when valid
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Screening {
    /// Verdict for the candidate
    pub verdict: ValidationVerdict,
    /// Extracted statement, present whenever extraction succeeded
    pub statement: Option<ExtractedStatement>,
}

impl Screening {
    fn rejected(reason: ValidationReason, statement: Option<ExtractedStatement>) -> Self {
        Self {
            verdict: ValidationVerdict::rejected(reason),
            statement,
        }
    }

    /// The statement, only if the verdict is valid
    #[must_use]
    pub fn accepted(&self) -> Option<&ExtractedStatement> {
        if self.verdict.valid {
            self.statement.as_ref()
        } else {
            None
        }
    }
}

/// Stateless policy validator for one permitted table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolicyValidator {
    table_name: String,
    matcher: Matcher,
}

impl PolicyValidator {
    /// Validator for `table_name`
    #[must_use]
    pub fn new(table_name: impl Into<String>) -> Self {
        Self {
            table_name: table_name.into(),
            matcher: Matcher::new(),
        }
    }

    /// The permitted table
    #[must_use]
    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    /// Run all four rules against `text` as given
    #[must_use]
    pub fn validate(&self, text: &str) -> ValidationVerdict {
        let text = text.trim();
        if text.is_empty() {
            return ValidationVerdict::rejected(ValidationReason::Empty);
        }
        if self.matcher.contains_forbidden(text) {
            return ValidationVerdict::rejected(ValidationReason::ForbiddenKeyword);
        }
        if !self.matcher.starts_with_select(text) {
            return ValidationVerdict::rejected(ValidationReason::NotSelect);
        }
        if !self.matcher.references_table(text, &self.table_name) {
            return ValidationVerdict::rejected(ValidationReason::WrongTable);
        }
        ValidationVerdict::valid()
    }

    /// Gate a raw candidate from a generator
    ///
    /// The empty and forbidden-keyword rules run on the whole candidate so a
    /// mutating statement cannot hide behind a fence, a comment, or a second
    /// statement. The remaining rules run on the extracted statement. A
    /// candidate with nothing extractable is rejected as empty.
    #[must_use]
    pub fn screen(&self, candidate: &str) -> Screening {
        if candidate.trim().is_empty() {
            return Screening::rejected(ValidationReason::Empty, None);
        }
        if self.matcher.contains_forbidden(candidate) {
            return Screening::rejected(ValidationReason::ForbiddenKeyword, extract(candidate));
        }
        let Some(statement) = extract(candidate) else {
            return Screening::rejected(ValidationReason::Empty, None);
        };
        let verdict = self.validate(statement.as_str());
        Screening {
            verdict,
            statement: Some(statement),
        }
    }
}

impl Default for PolicyValidator {
    fn default() -> Self {
        Self::new(DEFAULT_TABLE_NAME)
    }
}

/// Validate `text` against the default table
#[must_use]
pub fn validate(text: &str) -> ValidationVerdict {
    PolicyValidator::default().validate(text)
}
