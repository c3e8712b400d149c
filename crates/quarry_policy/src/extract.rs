//! Statement extraction from noisy generator output.
//!
//! Generators wrap SQL in markdown fences, prefix it with prose, or emit more
//! than one statement. Extraction isolates the first statement and makes sure
//! it carries exactly one terminator.

use crate::matcher::Matcher;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use std::fmt;

static SQL_FENCE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)```[ \t]*sql\b[ \t]*\r?\n?(.*?)```").expect("sql fence pattern"));

static ANY_FENCE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)```(?:[A-Za-z0-9_+-]*[ \t]*\r?\n)?(.*?)```").expect("fence pattern")
});

static SELECT_STATEMENT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)\bselect\b.*?;").expect("select statement pattern"));

/// Statement terminator
pub const TERMINATOR: char = ';';

/// A single SQL statement ending in exactly one terminator
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct ExtractedStatement(String);

impl ExtractedStatement {
    /// Terminate `body` with a single terminator
    pub(crate) fn terminated(body: &str) -> Self {
        let trimmed = body.trim().trim_end_matches(TERMINATOR).trim_end();
        Self(format!("{}{}", trimmed, TERMINATOR))
    }

    /// Statement text
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Statement text without the trailing terminator
    #[must_use]
    pub fn body(&self) -> &str {
        self.0.strip_suffix(TERMINATOR).unwrap_or(&self.0)
    }

    /// Consume into the owned text
    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for ExtractedStatement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ExtractedStatement {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Pick the region most likely to hold the SQL: a `sql` fence, any fence, or
/// the whole text
fn select_region(text: &str) -> &str {
    if let Some(body) = SQL_FENCE_RE.captures(text).and_then(|c| c.get(1)) {
        return body.as_str();
    }
    if let Some(body) = ANY_FENCE_RE.captures(text).and_then(|c| c.get(1)) {
        return body.as_str();
    }
    text
}

/// Isolate the first statement in `text`
///
/// Returns `None` when no SELECT statement can be found; callers treat that
/// as an empty candidate.
#[must_use]
pub fn extract(text: &str) -> Option<ExtractedStatement> {
    let region = select_region(text).trim();
    if region.is_empty() {
        return None;
    }

    let first = match region.find(TERMINATOR) {
        Some(end) => &region[..=end],
        None => region,
    };
    let statement = ExtractedStatement::terminated(first);
    if Matcher::new().starts_with_select(statement.as_str()) {
        return Some(statement);
    }

    let searchable = if region.contains(TERMINATOR) {
        region.to_string()
    } else {
        format!("{}{}", region, TERMINATOR)
    };
    SELECT_STATEMENT_RE
        .find(&searchable)
        .map(|m| ExtractedStatement::terminated(m.as_str()))
}
