//! Whole-word keyword matching.
//!
//! Matching is regex based, not a SQL parse: a forbidden word inside a string
//! literal or a quoted identifier still matches.

use once_cell::sync::Lazy;
use regex::Regex;

/// Data- and schema-mutating keywords no statement may contain
pub const FORBIDDEN_KEYWORDS: &[&str] = &[
    "insert", "update", "delete", "drop", "create", "alter", "truncate", "replace", "merge",
    "exec", "execute",
];

static FORBIDDEN_RE: Lazy<Regex> = Lazy::new(|| {
    let alternation = FORBIDDEN_KEYWORDS.join("|");
    Regex::new(&format!(r"(?i)\b(?:{})\b", alternation)).expect("forbidden keyword pattern")
});

static SELECT_PREFIX_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^select\b").expect("select prefix pattern"));

/// Result of scanning text for a keyword
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchResult {
    /// Matched keyword, lowercased
    pub keyword: String,
    /// Byte offset of the match
    pub offset: usize,
}

/// Keyword matcher over raw statement text
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Matcher;

impl Matcher {
    /// Create a new matcher
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// First forbidden keyword in `text`, if any
    #[must_use]
    pub fn find_forbidden(&self, text: &str) -> Option<MatchResult> {
        FORBIDDEN_RE.find(text).map(|m| MatchResult {
            keyword: m.as_str().to_ascii_lowercase(),
            offset: m.start(),
        })
    }

    /// Whether `text` contains any forbidden keyword as a whole word
    #[must_use]
    pub fn contains_forbidden(&self, text: &str) -> bool {
        FORBIDDEN_RE.is_match(text)
    }

    /// Whether trimmed `text` begins with the SELECT keyword
    #[must_use]
    pub fn starts_with_select(&self, text: &str) -> bool {
        SELECT_PREFIX_RE.is_match(text.trim_start())
    }

    /// Case-insensitive substring check for the permitted table
    #[must_use]
    pub fn references_table(&self, text: &str, table: &str) -> bool {
        if table.is_empty() {
            return false;
        }
        text.to_ascii_lowercase()
            .contains(&table.to_ascii_lowercase())
    }
}
