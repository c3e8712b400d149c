//! Protective row-limit injection.

use crate::extract::{ExtractedStatement, TERMINATOR};
use once_cell::sync::Lazy;
use regex::Regex;

static LIMIT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\blimit\s+\d+").expect("limit pattern"));

/// Whether `sql` already carries `LIMIT <integer>`
#[must_use]
pub fn has_limit(sql: &str) -> bool {
    LIMIT_RE.is_match(sql)
}

/// Append `LIMIT n` before the terminator unless a limit is already present
///
/// A statement that already has a limit is returned unchanged, so applying
/// this twice is the same as applying it once.
#[must_use]
pub fn add_limit_if_missing(sql: &str, n: u64) -> String {
    if has_limit(sql) {
        return sql.to_string();
    }
    let body = sql.trim().trim_end_matches(TERMINATOR).trim_end();
    format!("{} LIMIT {}{}", body, n, TERMINATOR)
}

/// Trim and apply the default row limit; the proactive safety default
#[must_use]
pub fn sanitize(sql: &str, n: u64) -> String {
    add_limit_if_missing(sql.trim(), n)
}

impl ExtractedStatement {
    /// Same statement with `LIMIT n` injected if missing
    #[must_use]
    pub fn with_limit(&self, n: u64) -> Self {
        if has_limit(self.as_str()) {
            return self.clone();
        }
        Self::terminated(&add_limit_if_missing(self.as_str(), n))
    }

    /// Whether the statement carries a limit clause
    #[must_use]
    pub fn has_limit(&self) -> bool {
        has_limit(self.as_str())
    }
}
