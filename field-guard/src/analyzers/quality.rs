//! Completeness, distinctness and duplicate-row detection.
//!
//! Equality is type-aware: numbers compare by value (optionally within a
//! tolerance), datetimes by instant regardless of spelling, booleans ignoring case,
//! and text either exactly or case-insensitively. Two missing cells are equal.

use std::collections::{HashMap, HashSet};

use chrono::NaiveDateTime;
use tracing::{debug, instrument};

use crate::analyzers::inference::{parse_datetime, parse_number, SemanticType, TypedColumn};
use crate::analyzers::profile::DuplicateReport;
use crate::cancellation::{CancellationToken, CHECK_INTERVAL};
use crate::config::AnalysisConfig;
use crate::dataset::{CellValue, Column, Dataset};
use crate::error::Result;

/// Number of duplicate groups whose row indices are kept in the report.
const SAMPLE_GROUPS: usize = 5;

/// Canonical form of a cell used for equality.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum CellKey {
    Missing,
    /// Bit pattern of the value, with -0.0 folded into 0.0
    Exact(u64),
    /// A number compared within the tolerance, outside the hash key
    Tolerant,
    Instant(NaiveDateTime),
    Text(String),
}

#[derive(Debug, Clone, Copy)]
struct KeyPolicy {
    case_insensitive: bool,
}

impl KeyPolicy {
    const EXACT: KeyPolicy = KeyPolicy {
        case_insensitive: false,
    };

    fn key(&self, cell: &CellValue, semantic_type: SemanticType) -> CellKey {
        let Some(text) = cell.as_text() else {
            return CellKey::Missing;
        };
        match semantic_type {
            SemanticType::Numeric => match parse_number(cell) {
                Some(v) => {
                    let v = if v == 0.0 { 0.0 } else { v };
                    CellKey::Exact(v.to_bits())
                }
                None => CellKey::Text(text),
            },
            SemanticType::Datetime => match parse_datetime(cell) {
                Some((dt, _)) => CellKey::Instant(dt),
                None => CellKey::Text(text),
            },
            SemanticType::Boolean => CellKey::Text(text.to_ascii_lowercase()),
            SemanticType::Categorical | SemanticType::Text | SemanticType::Unknown => {
                if self.case_insensitive {
                    CellKey::Text(text.to_lowercase())
                } else {
                    CellKey::Text(text)
                }
            }
        }
    }
}

/// One row split into its hashed cells and the numbers compared within tolerance.
struct RowKey {
    exact: Vec<CellKey>,
    tolerant: Vec<f64>,
}

/// Rows equal to the group's first row.
struct Group {
    anchor: Vec<f64>,
    rows: Vec<usize>,
}

/// Groups sharing hashed cells, indexed by the coarse bucket of their first tolerant
/// number (`None` when the row has none).
type BucketIndex = HashMap<Option<i64>, Vec<usize>>;

/// Per-column completeness and distinctness.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnQuality {
    pub non_missing: usize,
    pub completeness: f64,
    pub missing_ratio: f64,
    pub distinct_count: usize,
    /// `None` when there are no non-missing values
    pub distinctness: Option<f64>,
}

/// Measures completeness and distinctness of one column.
///
/// Distinct values are counted under exact type-aware equality.
pub fn measure_column(
    column: &Column,
    typed: &TypedColumn,
    token: &CancellationToken,
) -> Result<ColumnQuality> {
    let total = column.len();
    let mut non_missing = 0;
    let mut distinct = HashSet::new();

    for (row, cell) in column.values.iter().enumerate() {
        if row % CHECK_INTERVAL == 0 {
            token.check()?;
        }
        match KeyPolicy::EXACT.key(cell, typed.semantic_type()) {
            CellKey::Missing => {}
            key => {
                non_missing += 1;
                distinct.insert(key);
            }
        }
    }

    let completeness = if total == 0 {
        0.0
    } else {
        non_missing as f64 / total as f64
    };
    Ok(ColumnQuality {
        non_missing,
        completeness,
        missing_ratio: 1.0 - completeness,
        distinct_count: distinct.len(),
        distinctness: (non_missing > 0).then(|| distinct.len() as f64 / non_missing as f64),
    })
}

/// Counts all cells and missing cells across the dataset.
pub fn dataset_totals(dataset: &Dataset) -> (usize, usize) {
    let total = dataset.row_count() * dataset.column_count();
    let missing = dataset
        .columns()
        .iter()
        .map(|c| c.len() - c.non_missing_count())
        .sum();
    (total, missing)
}

/// Finds groups of rows that are equal in every column.
///
/// With a positive tolerance, numbers match when they lie within the tolerance of
/// the value in the group's first row. A row joins the earliest such group.
#[derive(Debug, Clone)]
pub struct DuplicateDetector {
    numeric_tolerance: f64,
    policy: KeyPolicy,
}

impl DuplicateDetector {
    pub fn new(numeric_tolerance: f64, case_insensitive_text: bool) -> Self {
        Self {
            numeric_tolerance,
            policy: KeyPolicy {
                case_insensitive: case_insensitive_text,
            },
        }
    }

    pub fn from_config(config: &AnalysisConfig) -> Self {
        Self::new(config.numeric_tolerance, config.case_insensitive_text)
    }

    fn row_key(&self, dataset: &Dataset, types: &[SemanticType], row: usize) -> RowKey {
        let mut exact = Vec::with_capacity(types.len());
        let mut tolerant = Vec::new();
        for (column, ty) in dataset.columns().iter().zip(types) {
            let cell = &column.values[row];
            if self.numeric_tolerance > 0.0 && *ty == SemanticType::Numeric {
                if let Some(v) = parse_number(cell) {
                    exact.push(CellKey::Tolerant);
                    tolerant.push(v);
                    continue;
                }
            }
            exact.push(self.policy.key(cell, *ty));
        }
        RowKey { exact, tolerant }
    }

    fn bucket(&self, numbers: &[f64]) -> Option<i64> {
        numbers
            .first()
            .map(|v| (v / self.numeric_tolerance).floor() as i64)
    }

    fn within_tolerance(&self, anchor: &[f64], numbers: &[f64]) -> bool {
        anchor
            .iter()
            .zip(numbers)
            .all(|(a, b)| (a - b).abs() <= self.numeric_tolerance)
    }

    /// Earliest group whose anchor matches; a match within the tolerance lies in the
    /// same coarse bucket or an adjacent one.
    fn find_group(&self, index: &BucketIndex, key: &RowKey, groups: &[Group]) -> Option<usize> {
        let Some(bucket) = self.bucket(&key.tolerant) else {
            return index.get(&None).and_then(|g| g.first().copied());
        };
        [bucket.saturating_sub(1), bucket, bucket.saturating_add(1)]
            .iter()
            .filter_map(|b| index.get(&Some(*b)))
            .flatten()
            .copied()
            .filter(|&g| self.within_tolerance(&groups[g].anchor, &key.tolerant))
            .min()
    }

    /// Scans all rows; `types` gives the inferred type of each column in order.
    #[instrument(skip_all, fields(dataset = %dataset.name()))]
    pub fn detect(
        &self,
        dataset: &Dataset,
        types: &[SemanticType],
        token: &CancellationToken,
    ) -> Result<DuplicateReport> {
        let mut index: HashMap<Vec<CellKey>, BucketIndex> = HashMap::new();
        let mut groups: Vec<Group> = Vec::new();

        for row in 0..dataset.row_count() {
            if row % CHECK_INTERVAL == 0 {
                token.check()?;
            }
            let key = self.row_key(dataset, types, row);
            let found = index
                .get(&key.exact)
                .and_then(|buckets| self.find_group(buckets, &key, &groups));
            match found {
                Some(g) => groups[g].rows.push(row),
                None => {
                    let bucket = self.bucket(&key.tolerant);
                    index
                        .entry(key.exact)
                        .or_default()
                        .entry(bucket)
                        .or_default()
                        .push(groups.len());
                    groups.push(Group {
                        anchor: key.tolerant,
                        rows: vec![row],
                    });
                }
            }
        }

        let duplicates: Vec<Vec<usize>> = groups
            .into_iter()
            .map(|g| g.rows)
            .filter(|rows| rows.len() > 1)
            .collect();
        let duplicated_rows: usize = duplicates.iter().map(Vec::len).sum();
        let report = DuplicateReport {
            duplicate_groups: duplicates.len(),
            duplicated_rows,
            redundant_rows: duplicated_rows - duplicates.len(),
            sample_groups: duplicates.into_iter().take(SAMPLE_GROUPS).collect(),
        };
        debug!(
            groups = report.duplicate_groups,
            duplicated_rows = report.duplicated_rows,
            "Duplicate scan finished"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzers::inference::TypeInferenceEngine;

    fn typed(column: &Column) -> TypedColumn {
        TypeInferenceEngine::default()
            .infer(column, 0, &CancellationToken::new())
            .unwrap()
    }

    #[test]
    fn test_measure_column() {
        let column = Column::new(
            "c",
            vec!["a".into(), "b".into(), "a".into(), CellValue::Missing],
        );
        let quality = measure_column(&column, &typed(&column), &CancellationToken::new()).unwrap();
        assert_eq!(quality.non_missing, 3);
        assert_eq!(quality.completeness, 0.75);
        assert_eq!(quality.missing_ratio, 0.25);
        assert_eq!(quality.distinct_count, 2);
        assert_eq!(quality.distinctness, Some(2.0 / 3.0));
    }

    #[test]
    fn test_numeric_distinct_ignores_spelling() {
        let column = Column::new("n", vec!["1".into(), "1.0".into(), CellValue::Int(1)]);
        let quality = measure_column(&column, &typed(&column), &CancellationToken::new()).unwrap();
        assert_eq!(quality.distinct_count, 1);
    }

    #[test]
    fn test_boolean_distinct_ignores_case() {
        let column = Column::new("b", vec!["Y".into(), "y".into(), "N".into()]);
        let quality = measure_column(&column, &typed(&column), &CancellationToken::new()).unwrap();
        assert_eq!(quality.distinct_count, 2);
    }

    #[test]
    fn test_all_missing_distinctness_is_none() {
        let column = Column::new("m", vec![CellValue::Missing; 3]);
        let unknown = TypedColumn::unknown("m", 0, 0);
        let quality = measure_column(&column, &unknown, &CancellationToken::new()).unwrap();
        assert_eq!(quality.distinctness, None);
        assert_eq!(quality.completeness, 0.0);
    }

    fn people() -> Dataset {
        Dataset::builder("people")
            .column("name", vec!["Ann".into(), "ann".into(), "Bob".into(), "Ann".into()])
            .column(
                "score",
                vec![1.0.into(), 1.0001.into(), 2.0.into(), 1.0.into()],
            )
            .build()
            .unwrap()
    }

    #[test]
    fn test_exact_duplicates() {
        let types = [SemanticType::Categorical, SemanticType::Numeric];
        let report = DuplicateDetector::new(0.0, false)
            .detect(&people(), &types, &CancellationToken::new())
            .unwrap();
        assert_eq!(report.duplicate_groups, 1);
        assert_eq!(report.duplicated_rows, 2);
        assert_eq!(report.redundant_rows, 1);
        assert_eq!(report.sample_groups, vec![vec![0, 3]]);
    }

    #[test]
    fn test_tolerant_case_insensitive_duplicates() {
        let types = [SemanticType::Categorical, SemanticType::Numeric];
        let report = DuplicateDetector::new(0.01, true)
            .detect(&people(), &types, &CancellationToken::new())
            .unwrap();
        assert_eq!(report.duplicate_groups, 1);
        assert_eq!(report.duplicated_rows, 3);
        assert_eq!(report.redundant_rows, 2);
        assert_eq!(report.sample_groups, vec![vec![0, 1, 3]]);
    }

    #[test]
    fn test_tolerance_spans_bucket_boundaries() {
        let dataset = Dataset::builder("readings")
            .column_from("v", vec![1.0004, 1.0006, 0.9998, 1.0003, 1.5])
            .build()
            .unwrap();
        let report = DuplicateDetector::new(0.001, false)
            .detect(&dataset, &[SemanticType::Numeric], &CancellationToken::new())
            .unwrap();
        assert_eq!(report.duplicate_groups, 1);
        assert_eq!(report.sample_groups, vec![vec![0, 1, 2, 3]]);
    }

    #[test]
    fn test_tolerance_is_measured_from_group_anchor() {
        // 1.0 and 1.0015 are each within 0.001 of 1.0008 but not of each other
        let dataset = Dataset::builder("readings")
            .column_from("v", vec![1.0, 1.0008, 1.0015])
            .column_from("tag", vec!["a", "a", "a"])
            .build()
            .unwrap();
        let types = [SemanticType::Numeric, SemanticType::Categorical];
        let report = DuplicateDetector::new(0.001, false)
            .detect(&dataset, &types, &CancellationToken::new())
            .unwrap();
        assert_eq!(report.sample_groups, vec![vec![0, 1]]);
        assert_eq!(report.redundant_rows, 1);
    }

    #[test]
    fn test_missing_cells_are_equal() {
        let dataset = Dataset::builder("t")
            .column("a", vec![CellValue::Missing, "".into(), "x".into()])
            .build()
            .unwrap();
        let report = DuplicateDetector::new(0.0, false)
            .detect(&dataset, &[SemanticType::Text], &CancellationToken::new())
            .unwrap();
        assert_eq!(report.duplicate_groups, 1);
        assert_eq!(report.duplicated_rows, 2);
    }

    #[test]
    fn test_dataset_totals() {
        let dataset = Dataset::builder("t")
            .column("a", vec![CellValue::Missing, 1i64.into()])
            .column("b", vec!["x".into(), " ".into()])
            .build()
            .unwrap();
        assert_eq!(dataset_totals(&dataset), (4, 2));
    }
}
