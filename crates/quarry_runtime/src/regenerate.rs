//! Regeneration collaborator.
//!
//! A regenerator turns the original question back into a fresh candidate
//! statement. It is called at most once per request and has no internal
//! timeout; callers put a deadline around the whole request.

use async_trait::async_trait;
use serde::Serialize;

/// Context passed to a regenerator
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RegenerationRequest {
    /// The original natural-language question
    pub question: String,
    /// Statement that failed, if one was extracted
    pub last_statement: Option<String>,
    /// Why it failed
    pub last_error: String,
}

/// Regenerator failure
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct RegenerationError {
    /// Failure description
    pub message: String,
}

impl RegenerationError {
    /// Create a new error
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// External NL-to-SQL generator
#[async_trait]
pub trait Regenerator: Send + Sync {
    /// Produce a new candidate statement for `request.question`
    ///
    /// # Errors
    ///
    /// Returns error if no candidate could be produced
    async fn regenerate(&self, request: &RegenerationRequest) -> Result<String, RegenerationError>;
}

/// Regenerator over a plain function of the question
///
/// The failed statement and error are not passed through.
pub struct FnRegenerator<F> {
    func: F,
}

impl<F> FnRegenerator<F>
where
    F: Fn(&str) -> Result<String, RegenerationError> + Send + Sync,
{
    /// Wrap `func`
    #[must_use]
    pub fn new(func: F) -> Self {
        Self { func }
    }
}

#[async_trait]
impl<F> Regenerator for FnRegenerator<F>
where
    F: Fn(&str) -> Result<String, RegenerationError> + Send + Sync,
{
    async fn regenerate(&self, request: &RegenerationRequest) -> Result<String, RegenerationError> {
        (self.func)(&request.question)
    }
}

impl<F> std::fmt::Debug for FnRegenerator<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnRegenerator").finish_non_exhaustive()
    }
}
