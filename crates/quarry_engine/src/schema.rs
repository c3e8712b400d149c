//! Dataset schema description

use serde::Serialize;
use std::fmt;

/// One column of the canonical table
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ColumnInfo {
    /// Column name as it appears in the dataset header
    pub name: String,
    /// Engine type name, e.g. `Int64` or `Utf8`
    pub data_type: String,
    /// Whether the column admits nulls
    pub nullable: bool,
}

impl ColumnInfo {
    /// Create a nullable column
    #[must_use]
    pub fn new(name: impl Into<String>, data_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data_type: data_type.into(),
            nullable: true,
        }
    }

    /// Set nullability
    #[must_use]
    pub fn with_nullable(mut self, nullable: bool) -> Self {
        self.nullable = nullable;
        self
    }
}

impl fmt::Display for ColumnInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.name, self.data_type)?;
        if !self.nullable {
            write!(f, " NOT NULL")?;
        }
        Ok(())
    }
}

/// Render columns as `name type` lines for prompt building and display
#[must_use]
pub fn describe_columns(columns: &[ColumnInfo]) -> String {
    columns
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("\n")
}
