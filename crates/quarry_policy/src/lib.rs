//! QUARRY Policy Gate
//!
//! Pure, stateless checks over untrusted SQL text: statement extraction,
//! read-only/single-table validation, and row-limit injection.
//! Nothing in this crate performs I/O.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod extract;
pub mod limit;
pub mod matcher;
pub mod validator;

pub use extract::{ExtractedStatement, TERMINATOR, extract};
pub use limit::{add_limit_if_missing, has_limit, sanitize};
pub use matcher::{FORBIDDEN_KEYWORDS, MatchResult, Matcher};
pub use validator::{PolicyValidator, Screening, ValidationVerdict, validate};
