//! In-memory tabular dataset consumed by the engine.
//!
//! A [`Dataset`] is an ordered set of named columns that all share the same row
//! count. Columns are stored behind an `Arc` so a dataset can be cloned cheaply and
//! read concurrently by every unit of analysis; nothing in the engine mutates it.
//!
//! # Example
//!
//! ```rust
//! use field_guard::dataset::{CellValue, Dataset};
//!
//! let dataset = Dataset::builder("orders")
//!     .column("id", vec![CellValue::Int(1), CellValue::Int(2)])
//!     .column("status", vec![CellValue::from("open"), CellValue::Missing])
//!     .build()
//!     .unwrap();
//!
//! assert_eq!(dataset.row_count(), 2);
//! assert_eq!(dataset.column_count(), 2);
//! ```

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::{EngineError, Result};

/// A single cell. `Missing` is the explicit missing marker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CellValue {
    Missing,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl CellValue {
    /// Returns true for explicit missing markers, NaN floats and blank text.
    pub fn is_missing(&self) -> bool {
        match self {
            CellValue::Missing => true,
            CellValue::Float(v) => v.is_nan(),
            CellValue::Text(s) => s.trim().is_empty(),
            CellValue::Bool(_) | CellValue::Int(_) => false,
        }
    }

    /// Raw textual rendering of a non-missing value, trimmed.
    ///
    /// Returns `None` for missing cells.
    pub fn as_text(&self) -> Option<String> {
        if self.is_missing() {
            return None;
        }
        match self {
            CellValue::Missing => None,
            CellValue::Bool(b) => Some(b.to_string()),
            CellValue::Int(i) => Some(i.to_string()),
            CellValue::Float(f) => Some(f.to_string()),
            CellValue::Text(s) => Some(s.trim().to_string()),
        }
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.as_text() {
            Some(text) => write!(f, "{text}"),
            None => write!(f, "<missing>"),
        }
    }
}

impl From<&str> for CellValue {
    fn from(value: &str) -> Self {
        CellValue::Text(value.to_string())
    }
}

impl From<String> for CellValue {
    fn from(value: String) -> Self {
        CellValue::Text(value)
    }
}

impl From<i64> for CellValue {
    fn from(value: i64) -> Self {
        CellValue::Int(value)
    }
}

impl From<f64> for CellValue {
    fn from(value: f64) -> Self {
        CellValue::Float(value)
    }
}

impl From<bool> for CellValue {
    fn from(value: bool) -> Self {
        CellValue::Bool(value)
    }
}

impl<T: Into<CellValue>> From<Option<T>> for CellValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(CellValue::Missing, Into::into)
    }
}

/// A named column of cells.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    pub values: Vec<CellValue>,
}

impl Column {
    pub fn new(name: impl Into<String>, values: Vec<CellValue>) -> Self {
        Self {
            name: name.into(),
            values,
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn non_missing_count(&self) -> usize {
        self.values.iter().filter(|v| !v.is_missing()).count()
    }
}

/// Immutable, column-major table shared by all analysis units.
#[derive(Debug, Clone)]
pub struct Dataset {
    name: String,
    columns: Arc<[Column]>,
    row_count: usize,
}

impl Dataset {
    /// Starts a builder for a dataset with the given name.
    pub fn builder(name: impl Into<String>) -> DatasetBuilder {
        DatasetBuilder {
            name: name.into(),
            columns: Vec::new(),
        }
    }

    /// Creates a dataset from already constructed columns.
    ///
    /// Column names must be unique (case-sensitive) and every column must have the
    /// same number of rows. Zero columns or zero rows are accepted here; the engine
    /// rejects them at analysis time.
    pub fn try_new(name: impl Into<String>, columns: Vec<Column>) -> Result<Self> {
        let mut seen = HashSet::new();
        for column in &columns {
            if !seen.insert(column.name.as_str()) {
                return Err(EngineError::DuplicateColumn {
                    column: column.name.clone(),
                });
            }
        }

        let row_count = columns.first().map(Column::len).unwrap_or(0);
        if let Some(column) = columns.iter().find(|c| c.len() != row_count) {
            return Err(EngineError::RowCountMismatch {
                column: column.name.clone(),
                expected: row_count,
                actual: column.len(),
            });
        }

        Ok(Self {
            name: name.into(),
            columns: columns.into(),
            row_count,
        })
    }

    /// Creates a dataset from row-major data.
    pub fn from_rows(
        name: impl Into<String>,
        headers: &[&str],
        rows: Vec<Vec<CellValue>>,
    ) -> Result<Self> {
        let mut columns: Vec<Column> = headers
            .iter()
            .map(|h| Column::new(*h, Vec::with_capacity(rows.len())))
            .collect();

        for (row_idx, row) in rows.into_iter().enumerate() {
            if row.len() != headers.len() {
                return Err(EngineError::invalid_dataset(format!(
                    "row {row_idx} has {} cells, expected {}",
                    row.len(),
                    headers.len()
                )));
            }
            for (column, cell) in columns.iter_mut().zip(row) {
                column.values.push(cell);
            }
        }

        Self::try_new(name, columns)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    pub fn row_count(&self) -> usize {
        self.row_count
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    /// Content fingerprint used as the dataset identity in profiles.
    ///
    /// SHA-256 over column names and cell renderings; the first 16 bytes, hex-encoded.
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        for column in self.columns.iter() {
            hasher.update(column.name.as_bytes());
            hasher.update([0u8]);
            for value in &column.values {
                match value.as_text() {
                    Some(text) => {
                        hasher.update([1u8]);
                        hasher.update(text.as_bytes());
                    }
                    None => hasher.update([2u8]),
                }
            }
            hasher.update([0xffu8]);
        }
        let hash = hasher.finalize();
        hex::encode(&hash[..16])
    }
}

/// Builder for [`Dataset`].
pub struct DatasetBuilder {
    name: String,
    columns: Vec<Column>,
}

impl DatasetBuilder {
    /// Appends a column.
    pub fn column(mut self, name: impl Into<String>, values: Vec<CellValue>) -> Self {
        self.columns.push(Column::new(name, values));
        self
    }

    /// Appends a column of anything convertible into cells.
    pub fn column_from<T: Into<CellValue>>(
        self,
        name: impl Into<String>,
        values: impl IntoIterator<Item = T>,
    ) -> Self {
        self.column(name, values.into_iter().map(Into::into).collect())
    }

    pub fn build(self) -> Result<Dataset> {
        Dataset::try_new(self.name, self.columns)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_detection() {
        assert!(CellValue::Missing.is_missing());
        assert!(CellValue::Text("   ".to_string()).is_missing());
        assert!(CellValue::Float(f64::NAN).is_missing());
        assert!(!CellValue::Int(0).is_missing());
        assert!(!CellValue::Text(" a ".to_string()).is_missing());
        assert_eq!(CellValue::Text(" a ".to_string()).as_text().as_deref(), Some("a"));
    }

    #[test]
    fn test_builder_rejects_duplicate_names() {
        let result = Dataset::builder("t")
            .column_from("a", [1i64, 2])
            .column_from("a", [3i64, 4])
            .build();
        assert!(matches!(result, Err(EngineError::DuplicateColumn { .. })));
    }

    #[test]
    fn test_names_are_case_sensitive() {
        let dataset = Dataset::builder("t")
            .column_from("a", [1i64])
            .column_from("A", [2i64])
            .build()
            .unwrap();
        assert_eq!(dataset.column_count(), 2);
    }

    #[test]
    fn test_builder_rejects_ragged_columns() {
        let result = Dataset::builder("t")
            .column_from("a", [1i64, 2, 3])
            .column_from("b", [1i64])
            .build();
        match result {
            Err(EngineError::RowCountMismatch {
                column,
                expected,
                actual,
            }) => {
                assert_eq!(column, "b");
                assert_eq!(expected, 3);
                assert_eq!(actual, 1);
            }
            other => panic!("expected row count mismatch, got {other:?}"),
        }
    }

    #[test]
    fn test_from_rows() {
        let dataset = Dataset::from_rows(
            "t",
            &["x", "y"],
            vec![
                vec![CellValue::Int(1), CellValue::from("a")],
                vec![CellValue::Int(2), CellValue::Missing],
            ],
        )
        .unwrap();
        assert_eq!(dataset.row_count(), 2);
        assert_eq!(dataset.column("y").unwrap().non_missing_count(), 1);

        let ragged = Dataset::from_rows("t", &["x", "y"], vec![vec![CellValue::Int(1)]]);
        assert!(matches!(ragged, Err(EngineError::InvalidDataset { .. })));
    }

    #[test]
    fn test_fingerprint_is_stable_and_content_sensitive() {
        let a = Dataset::builder("t").column_from("x", [1i64, 2]).build().unwrap();
        let b = Dataset::builder("t").column_from("x", [1i64, 2]).build().unwrap();
        let c = Dataset::builder("t").column_from("x", [1i64, 3]).build().unwrap();
        assert_eq!(a.fingerprint(), b.fingerprint());
        assert_ne!(a.fingerprint(), c.fingerprint());
        assert_eq!(a.fingerprint().len(), 32);
    }
}
