//! Tabular input and scalar cell helpers.

use crate::error::{AnalysisError, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;

/// A single table cell. Only JSON scalars (string, number, bool, null) are valid.
pub type Cell = Value;

/// A user-supplied table: ordered headers and row-major scalar cells.
///
/// The pipeline never mutates a dataset; rows excluded during analysis are
/// tracked by index instead.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<Cell>>,
    /// Row count as declared by the producer, checked against `rows`.
    #[serde(
        default,
        rename = "row_count",
        alias = "rowCount",
        skip_serializing_if = "Option::is_none"
    )]
    pub declared_rows: Option<usize>,
    /// Column count as declared by the producer, checked against `headers`.
    #[serde(
        default,
        rename = "column_count",
        alias = "columnCount",
        skip_serializing_if = "Option::is_none"
    )]
    pub declared_columns: Option<usize>,
}

impl Dataset {
    pub fn new(headers: Vec<String>, rows: Vec<Vec<Cell>>) -> Self {
        Self {
            headers,
            rows,
            declared_rows: None,
            declared_columns: None,
        }
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn column_count(&self) -> usize {
        self.headers.len()
    }

    /// Position of a header, if present.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    pub fn cell(&self, row: usize, column: usize) -> Option<&Cell> {
        self.rows.get(row).and_then(|r| r.get(column))
    }

    /// Check the table is well formed.
    ///
    /// Fails on duplicate headers, ragged rows, non-scalar cells, or declared
    /// counts that disagree with the actual table.
    pub fn validate(&self) -> Result<()> {
        let mut seen = HashSet::new();
        for header in &self.headers {
            if !seen.insert(header.as_str()) {
                return Err(AnalysisError::dataset(format!(
                    "duplicate column header '{header}'"
                )));
            }
        }

        if let Some(declared) = self.declared_columns {
            if declared != self.column_count() {
                return Err(AnalysisError::dataset(format!(
                    "declared column count {declared} does not match {} headers",
                    self.column_count()
                )));
            }
        }
        if let Some(declared) = self.declared_rows {
            if declared != self.row_count() {
                return Err(AnalysisError::dataset(format!(
                    "declared row count {declared} does not match {} rows",
                    self.row_count()
                )));
            }
        }

        for (row_idx, row) in self.rows.iter().enumerate() {
            if row.len() != self.column_count() {
                return Err(AnalysisError::dataset(format!(
                    "row {row_idx} has {} cells but there are {} headers",
                    row.len(),
                    self.column_count()
                )));
            }
            if let Some(col_idx) = row.iter().position(|c| c.is_array() || c.is_object()) {
                return Err(AnalysisError::dataset(format!(
                    "row {row_idx}, column '{}' holds a non-scalar value",
                    self.headers[col_idx]
                )));
            }
        }
        Ok(())
    }
}

/// Identity label of a cell, used for categorical codes and sensitive values.
pub fn cell_label(cell: &Cell) -> String {
    match cell {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Numeric reading of a cell: JSON numbers, or strings that parse as a finite
/// number after trimming. Booleans are not numeric.
pub fn cell_as_number(cell: &Cell) -> Option<f64> {
    match cell {
        Value::Number(n) => n.as_f64().filter(|v| v.is_finite()),
        Value::String(s) => s.trim().parse::<f64>().ok().filter(|v| v.is_finite()),
        _ => None,
    }
}

/// Null or whitespace-only string.
pub fn is_missing(cell: &Cell) -> bool {
    match cell {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        _ => false,
    }
}
