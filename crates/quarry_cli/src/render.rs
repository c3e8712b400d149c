//! Plain-text rendering for terminal output.

use console::style;
use quarry_engine::Table;
use serde_json::Value;

/// Rows shown before output is truncated
pub const MAX_DISPLAY_ROWS: usize = 50;

fn cell_text(value: &Value) -> String {
    match value {
        Value::Null => "NULL".to_string(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Render `table` as aligned columns, truncated to `max_rows`
pub fn format_table(table: &Table, max_rows: usize) -> String {
    let columns = table.columns();
    if columns.is_empty() {
        return String::new();
    }

    let shown: Vec<Vec<String>> = table
        .rows()
        .iter()
        .take(max_rows)
        .map(|row| row.iter().map(cell_text).collect())
        .collect();

    let mut widths: Vec<usize> = columns.iter().map(|c| c.chars().count()).collect();
    for row in &shown {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.chars().count());
        }
    }

    let line = |cells: &[String]| {
        cells
            .iter()
            .zip(&widths)
            .map(|(cell, width)| format!("{:<width$}", cell, width = *width))
            .collect::<Vec<_>>()
            .join(" | ")
            .trim_end()
            .to_string()
    };

    let mut out = Vec::with_capacity(shown.len() + 3);
    out.push(line(columns));
    out.push(
        widths
            .iter()
            .map(|w| "-".repeat(*w))
            .collect::<Vec<_>>()
            .join("-+-"),
    );
    out.extend(shown.iter().map(|row| line(row)));
    if table.len() > max_rows {
        out.push(format!("... {} more rows", table.len() - max_rows));
    }
    out.join("\n")
}

/// Green check or red cross with a message
pub fn status_line(ok: bool, message: &str) -> String {
    if ok {
        format!("{} {}", style("✓").green().bold(), message)
    } else {
        format!("{} {}", style("✗").red().bold(), message)
    }
}
