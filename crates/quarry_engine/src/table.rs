//! Materialized result tables.
//!
//! Engines return every row of a result; nothing here streams. Cells are
//! plain JSON values so callers can render or serialize them without
//! knowing the engine's column types.

use crate::trait_::EngineError;
use datafusion::arrow::record_batch::RecordBatch;
use datafusion::scalar::ScalarValue;
use indexmap::IndexMap;
use serde::Serialize;
use serde_json::{Number, Value};

/// Ordered columns plus rows of JSON cells
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Table {
    columns: Vec<String>,
    rows: Vec<Vec<Value>>,
}

impl Table {
    /// Empty table with the given columns
    #[must_use]
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    /// Append a row, builder style
    ///
    /// Rows of the wrong width are padded with nulls or truncated.
    #[must_use]
    pub fn with_row(mut self, mut row: Vec<Value>) -> Self {
        row.resize(self.columns.len(), Value::Null);
        self.rows.push(row);
        self
    }

    /// Append a row
    ///
    /// # Errors
    ///
    /// Returns error if the row width does not match the column count
    pub fn push_row(&mut self, row: Vec<Value>) -> Result<(), EngineError> {
        if row.len() != self.columns.len() {
            return Err(EngineError::Execution(format!(
                "row has {} cells, table has {} columns",
                row.len(),
                self.columns.len()
            )));
        }
        self.rows.push(row);
        Ok(())
    }

    /// Column names in result order
    #[must_use]
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// All rows
    #[must_use]
    pub fn rows(&self) -> &[Vec<Value>] {
        &self.rows
    }

    /// Number of rows
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// True when the result has no rows
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Cell at `row` in the named column
    #[must_use]
    pub fn get(&self, row: usize, column: &str) -> Option<&Value> {
        let idx = self.columns.iter().position(|c| c == column)?;
        self.rows.get(row)?.get(idx)
    }

    /// One row keyed by column name, in column order
    #[must_use]
    pub fn record(&self, row: usize) -> Option<IndexMap<String, Value>> {
        let cells = self.rows.get(row)?;
        Some(
            self.columns
                .iter()
                .cloned()
                .zip(cells.iter().cloned())
                .collect(),
        )
    }

    /// Every row keyed by column name
    #[must_use]
    pub fn records(&self) -> Vec<IndexMap<String, Value>> {
        (0..self.rows.len()).filter_map(|i| self.record(i)).collect()
    }

    /// Materialize Arrow batches into a table
    ///
    /// # Errors
    ///
    /// Returns error if a cell cannot be read from its array
    pub fn from_batches(columns: Vec<String>, batches: &[RecordBatch]) -> Result<Self, EngineError> {
        let mut table = Self::new(columns);
        for batch in batches {
            for row in 0..batch.num_rows() {
                let mut cells = Vec::with_capacity(batch.num_columns());
                for array in batch.columns() {
                    let scalar = ScalarValue::try_from_array(array, row)
                        .map_err(|e| EngineError::Execution(e.to_string()))?;
                    cells.push(scalar_to_json(&scalar));
                }
                table.push_row(cells)?;
            }
        }
        Ok(table)
    }
}

fn float_to_json(v: f64) -> Value {
    Number::from_f64(v).map_or(Value::Null, Value::Number)
}

fn scalar_to_json(value: &ScalarValue) -> Value {
    if value.is_null() {
        return Value::Null;
    }
    match value {
        ScalarValue::Boolean(Some(v)) => Value::Bool(*v),
        ScalarValue::Int8(Some(v)) => Value::from(*v),
        ScalarValue::Int16(Some(v)) => Value::from(*v),
        ScalarValue::Int32(Some(v)) => Value::from(*v),
        ScalarValue::Int64(Some(v)) => Value::from(*v),
        ScalarValue::UInt8(Some(v)) => Value::from(*v),
        ScalarValue::UInt16(Some(v)) => Value::from(*v),
        ScalarValue::UInt32(Some(v)) => Value::from(*v),
        ScalarValue::UInt64(Some(v)) => Value::from(*v),
        ScalarValue::Float32(Some(v)) => float_to_json(f64::from(*v)),
        ScalarValue::Float64(Some(v)) => float_to_json(*v),
        ScalarValue::Utf8(Some(s)) | ScalarValue::LargeUtf8(Some(s)) | ScalarValue::Utf8View(Some(s)) => {
            Value::String(s.clone())
        }
        // Decimals, dates and the rest keep the engine's own rendering.
        other => Value::String(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use datafusion::arrow::array::{ArrayRef, Float64Array, Int64Array, StringArray};
    use datafusion::arrow::datatypes::{DataType, Field, Schema};
    use serde_json::json;
    use std::sync::Arc;

    fn sample() -> Table {
        Table::new(vec!["Country".to_string(), "Value".to_string()])
            .with_row(vec![json!("Japan"), json!(120.5)])
            .with_row(vec![json!("Chile"), json!(80)])
    }

    #[test]
    fn test_accessors() {
        let table = sample();
        assert_eq!(table.len(), 2);
        assert!(!table.is_empty());
        assert_eq!(table.get(1, "Country"), Some(&json!("Chile")));
        assert_eq!(table.get(0, "Missing"), None);
        assert_eq!(table.get(5, "Country"), None);
    }

    #[test]
    fn test_records_keep_column_order() {
        let records = sample().records();
        let keys: Vec<_> = records[0].keys().cloned().collect();
        assert_eq!(keys, vec!["Country", "Value"]);
        assert_eq!(records[1]["Value"], json!(80));
    }

    #[test]
    fn test_push_row_width_checked() {
        let mut table = Table::new(vec!["a".to_string()]);
        assert!(table.push_row(vec![json!(1), json!(2)]).is_err());
        assert!(table.push_row(vec![json!(1)]).is_ok());
    }

    #[test]
    fn test_with_row_pads() {
        let table = Table::new(vec!["a".to_string(), "b".to_string()]).with_row(vec![json!(1)]);
        assert_eq!(table.rows()[0], vec![json!(1), Value::Null]);
    }

    #[test]
    fn test_serialize_shape() {
        let value = serde_json::to_value(sample()).unwrap();
        assert_eq!(value["columns"], json!(["Country", "Value"]));
        assert_eq!(value["rows"][0][0], json!("Japan"));
    }

    #[test]
    fn test_from_batches() {
        let schema = Arc::new(Schema::new(vec![
            Field::new("Year", DataType::Int64, false),
            Field::new("Country", DataType::Utf8, true),
            Field::new("Value", DataType::Float64, true),
        ]));
        let columns: Vec<ArrayRef> = vec![
            Arc::new(Int64Array::from(vec![2080, 2081])),
            Arc::new(StringArray::from(vec![Some("Japan"), None])),
            Arc::new(Float64Array::from(vec![Some(1.5), Some(f64::NAN)])),
        ];
        let batch = RecordBatch::try_new(schema, columns).unwrap();

        let table = Table::from_batches(
            vec!["Year".to_string(), "Country".to_string(), "Value".to_string()],
            &[batch.clone(), batch],
        )
        .unwrap();

        assert_eq!(table.len(), 4);
        assert_eq!(table.get(0, "Year"), Some(&json!(2080)));
        assert_eq!(table.get(1, "Country"), Some(&Value::Null));
        assert_eq!(table.get(0, "Value"), Some(&json!(1.5)));
        assert_eq!(table.get(1, "Value"), Some(&Value::Null));
    }

    #[test]
    fn test_from_no_batches_is_empty() {
        let table = Table::from_batches(vec!["x".to_string()], &[]).unwrap();
        assert!(table.is_empty());
        assert_eq!(table.columns(), &["x".to_string()]);
    }
}
