//! Semantic type inference from raw cell values.
//!
//! Each column is classified as exactly one of [`SemanticType`]. Precedence is
//! numeric, boolean, datetime, categorical, then text: the first class whose test
//! passes wins.
//!
//! - **numeric**: at least `numeric_threshold` of non-missing values parse as numbers
//! - **boolean**: the distinct values (case-insensitive) fit a single two-valued
//!   vocabulary such as `yes/no` or `Y/N`
//! - **datetime**: at least `datetime_threshold` of values match one of the
//!   recognised date/time grammars
//! - **categorical**: distinct / non-missing is at most `categorical_cardinality_ratio`
//! - **text**: everything else
//!
//! # Example
//!
//! ```rust
//! use field_guard::analyzers::inference::{SemanticType, TypeInferenceEngine};
//! use field_guard::cancellation::CancellationToken;
//! use field_guard::dataset::Column;
//!
//! let engine = TypeInferenceEngine::builder().numeric_threshold(0.9).build();
//! let column = Column::new("flag", vec!["Y".into(), "N".into(), "Y".into(), "Y".into()]);
//! let typed = engine.infer(&column, 0, &CancellationToken::new()).unwrap();
//! assert_eq!(typed.inference.semantic_type, SemanticType::Boolean);
//! ```

use std::collections::{HashMap, HashSet};
use std::fmt;

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::cancellation::{CancellationToken, CHECK_INTERVAL};
use crate::config::AnalysisConfig;
use crate::dataset::{CellValue, Column};
use crate::error::{EngineError, Result};

static NUMBER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[+-]?(\d+\.?\d*|\.\d+)([eE][+-]?\d+)?$").expect("numeric pattern is valid")
});

/// Two-valued vocabularies recognised as boolean, as (true, false) spellings.
const BOOLEAN_VOCABULARIES: [(&str, &str); 5] = [
    ("true", "false"),
    ("t", "f"),
    ("yes", "no"),
    ("y", "n"),
    ("on", "off"),
];

/// Semantic type of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SemanticType {
    Numeric,
    Boolean,
    Categorical,
    Datetime,
    Text,
    /// No usable values
    Unknown,
}

impl SemanticType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Numeric => "numeric",
            Self::Boolean => "boolean",
            Self::Categorical => "categorical",
            Self::Datetime => "datetime",
            Self::Text => "text",
            Self::Unknown => "unknown",
        }
    }

    /// Types whose values are compared as discrete labels.
    pub fn is_label(&self) -> bool {
        matches!(self, Self::Boolean | Self::Categorical)
    }
}

impl fmt::Display for SemanticType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Recognised date/time grammars, in matching order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DateGrammar {
    #[serde(rename = "YYYY-MM-DD")]
    IsoDate,
    #[serde(rename = "YYYY/MM/DD")]
    SlashDate,
    #[serde(rename = "MM/DD/YYYY")]
    UsDate,
    #[serde(rename = "DD.MM.YYYY")]
    EuDate,
    #[serde(rename = "YYYY-MM-DD HH:MM:SS")]
    IsoDateTime,
    #[serde(rename = "RFC3339")]
    Rfc3339,
}

impl DateGrammar {
    pub const ALL: [DateGrammar; 6] = [
        Self::IsoDate,
        Self::SlashDate,
        Self::UsDate,
        Self::EuDate,
        Self::IsoDateTime,
        Self::Rfc3339,
    ];

    pub fn pattern(&self) -> &'static str {
        match self {
            Self::IsoDate => "YYYY-MM-DD",
            Self::SlashDate => "YYYY/MM/DD",
            Self::UsDate => "MM/DD/YYYY",
            Self::EuDate => "DD.MM.YYYY",
            Self::IsoDateTime => "YYYY-MM-DD HH:MM:SS",
            Self::Rfc3339 => "RFC3339",
        }
    }

    /// Parses `value` with this grammar.
    pub fn parse(&self, value: &str) -> Option<NaiveDateTime> {
        let date = |fmt: &str| {
            NaiveDate::parse_from_str(value, fmt)
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        };
        match self {
            Self::IsoDate => date("%Y-%m-%d"),
            Self::SlashDate => date("%Y/%m/%d"),
            Self::UsDate => date("%m/%d/%Y"),
            Self::EuDate => date("%d.%m.%Y"),
            Self::IsoDateTime => NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S%.f")
                .or_else(|_| NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f"))
                .ok(),
            Self::Rfc3339 => DateTime::parse_from_rfc3339(value)
                .ok()
                .map(|dt| dt.naive_utc()),
        }
    }
}

impl fmt::Display for DateGrammar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.pattern())
    }
}

/// Parses a cell as a finite number.
pub fn parse_number(cell: &CellValue) -> Option<f64> {
    match cell {
        CellValue::Int(i) => Some(*i as f64),
        CellValue::Float(f) if f.is_finite() => Some(*f),
        CellValue::Text(s) => {
            let trimmed = s.trim();
            if NUMBER.is_match(trimmed) {
                trimmed.parse::<f64>().ok().filter(|v| v.is_finite())
            } else {
                None
            }
        }
        CellValue::Float(_) | CellValue::Bool(_) | CellValue::Missing => None,
    }
}

/// Parses a cell with the first grammar that accepts it.
pub fn parse_datetime(cell: &CellValue) -> Option<(NaiveDateTime, DateGrammar)> {
    let text = match cell {
        CellValue::Text(s) => s.trim(),
        _ => return None,
    };
    if text.is_empty() {
        return None;
    }
    DateGrammar::ALL
        .iter()
        .find_map(|g| g.parse(text).map(|dt| (dt, *g)))
}

/// Outcome of classifying one column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypeInference {
    pub semantic_type: SemanticType,
    /// Fraction of non-missing values that support the chosen type
    pub confidence: f64,
    pub non_missing: usize,
    pub distinct: usize,
    /// Every parsed number is a whole number (numeric columns only)
    pub integral: bool,
    /// Most frequent grammar, ties in declaration order (datetime columns only)
    pub date_format: Option<DateGrammar>,
}

/// Values of a column parsed according to its inferred type, keyed by row index.
#[derive(Debug, Clone, PartialEq)]
pub enum TypedValues {
    Numeric(Vec<(usize, f64)>),
    Datetime(Vec<(usize, NaiveDateTime)>),
    /// Trimmed textual values for boolean, categorical and text columns
    Labels(Vec<(usize, String)>),
    Empty,
}

/// A column after inference: the raw column is left untouched in the dataset.
#[derive(Debug, Clone, PartialEq)]
pub struct TypedColumn {
    pub name: String,
    /// Position of the column in the dataset
    pub index: usize,
    pub inference: TypeInference,
    pub values: TypedValues,
}

impl TypedColumn {
    /// Placeholder for a column whose inference unit did not complete.
    pub fn unknown(name: impl Into<String>, index: usize, non_missing: usize) -> Self {
        Self {
            name: name.into(),
            index,
            inference: TypeInference {
                semantic_type: SemanticType::Unknown,
                confidence: 0.0,
                non_missing,
                distinct: 0,
                integral: false,
                date_format: None,
            },
            values: TypedValues::Empty,
        }
    }

    pub fn semantic_type(&self) -> SemanticType {
        self.inference.semantic_type
    }

    pub fn numbers(&self) -> Option<&[(usize, f64)]> {
        match &self.values {
            TypedValues::Numeric(v) => Some(v),
            _ => None,
        }
    }

    pub fn timestamps(&self) -> Option<&[(usize, NaiveDateTime)]> {
        match &self.values {
            TypedValues::Datetime(v) => Some(v),
            _ => None,
        }
    }

    pub fn labels(&self) -> Option<&[(usize, String)]> {
        match &self.values {
            TypedValues::Labels(v) => Some(v),
            _ => None,
        }
    }
}

/// Thresholds used by the inference engine.
#[derive(Debug, Clone)]
pub struct InferenceConfig {
    /// Fraction of values that must parse as numbers (default: 0.95)
    pub numeric_threshold: f64,
    /// Fraction of values that must match a date grammar (default: 0.9)
    pub datetime_threshold: f64,
    /// Maximum distinct/non-missing ratio for categorical columns (default: 0.5)
    pub categorical_cardinality_ratio: f64,
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            numeric_threshold: 0.95,
            datetime_threshold: 0.9,
            categorical_cardinality_ratio: 0.5,
        }
    }
}

/// Builder for TypeInferenceEngine
pub struct TypeInferenceEngineBuilder {
    config: InferenceConfig,
}

impl TypeInferenceEngineBuilder {
    pub fn numeric_threshold(mut self, threshold: f64) -> Self {
        self.config.numeric_threshold = threshold;
        self
    }

    pub fn datetime_threshold(mut self, threshold: f64) -> Self {
        self.config.datetime_threshold = threshold;
        self
    }

    pub fn categorical_cardinality_ratio(mut self, ratio: f64) -> Self {
        self.config.categorical_cardinality_ratio = ratio;
        self
    }

    pub fn build(self) -> TypeInferenceEngine {
        TypeInferenceEngine {
            config: self.config,
        }
    }
}

/// Running counts gathered in a single pass over a column.
#[derive(Debug, Default)]
struct TypeStats {
    non_missing: usize,
    numeric_matches: usize,
    non_integral: usize,
    grammar_matches: HashMap<DateGrammar, usize>,
    date_matches: usize,
    /// Distinct trimmed values in first-seen order
    distinct: Vec<String>,
    seen: HashSet<String>,
}

/// Classifies columns into semantic types.
pub struct TypeInferenceEngine {
    config: InferenceConfig,
}

impl Default for TypeInferenceEngine {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl TypeInferenceEngine {
    pub fn builder() -> TypeInferenceEngineBuilder {
        TypeInferenceEngineBuilder {
            config: InferenceConfig::default(),
        }
    }

    pub fn from_config(config: &AnalysisConfig) -> Self {
        Self::builder()
            .numeric_threshold(config.numeric_threshold)
            .datetime_threshold(config.datetime_threshold)
            .categorical_cardinality_ratio(config.categorical_cardinality_ratio)
            .build()
    }

    /// Infers the semantic type of `column` and parses its values accordingly.
    ///
    /// Fails with [`EngineError::EmptyColumn`] when the column has no non-missing values.
    #[instrument(skip(self, column, token), fields(column = %column.name))]
    pub fn infer(
        &self,
        column: &Column,
        index: usize,
        token: &CancellationToken,
    ) -> Result<TypedColumn> {
        let stats = self.collect_stats(column, token)?;
        if stats.non_missing == 0 {
            return Err(EngineError::EmptyColumn {
                column: column.name.clone(),
            });
        }

        let inference = self.determine_type(&stats);
        debug!(
            column = %column.name,
            inferred_type = %inference.semantic_type,
            confidence = inference.confidence,
            "Inferred column type"
        );

        let values = parse_values(column, &inference, token)?;
        Ok(TypedColumn {
            name: column.name.clone(),
            index,
            inference,
            values,
        })
    }

    fn collect_stats(&self, column: &Column, token: &CancellationToken) -> Result<TypeStats> {
        let mut stats = TypeStats::default();
        for (row, cell) in column.values.iter().enumerate() {
            if row % CHECK_INTERVAL == 0 {
                token.check()?;
            }
            let Some(text) = cell.as_text() else {
                continue;
            };
            stats.non_missing += 1;

            if let Some(number) = parse_number(cell) {
                stats.numeric_matches += 1;
                if number.fract() != 0.0 {
                    stats.non_integral += 1;
                }
            }
            if let Some((_, grammar)) = parse_datetime(cell) {
                stats.date_matches += 1;
                *stats.grammar_matches.entry(grammar).or_insert(0) += 1;
            }
            if stats.seen.insert(text.clone()) {
                stats.distinct.push(text);
            }
        }
        Ok(stats)
    }

    fn determine_type(&self, stats: &TypeStats) -> TypeInference {
        let non_missing = stats.non_missing as f64;
        let numeric_confidence = stats.numeric_matches as f64 / non_missing;
        let date_confidence = stats.date_matches as f64 / non_missing;
        let distinct_ratio = stats.distinct.len() as f64 / non_missing;

        let mut inference = TypeInference {
            semantic_type: SemanticType::Text,
            confidence: 1.0,
            non_missing: stats.non_missing,
            distinct: stats.distinct.len(),
            integral: false,
            date_format: None,
        };

        if numeric_confidence >= self.config.numeric_threshold {
            inference.semantic_type = SemanticType::Numeric;
            inference.confidence = numeric_confidence;
            inference.integral = stats.non_integral == 0;
        } else if boolean_vocabulary(&stats.distinct).is_some() {
            inference.semantic_type = SemanticType::Boolean;
        } else if date_confidence >= self.config.datetime_threshold {
            inference.semantic_type = SemanticType::Datetime;
            inference.confidence = date_confidence;
            inference.date_format = dominant_grammar(&stats.grammar_matches);
        } else if distinct_ratio <= self.config.categorical_cardinality_ratio {
            inference.semantic_type = SemanticType::Categorical;
        }
        inference
    }
}

/// Returns the (true, false) vocabulary that covers every distinct value, if any.
pub fn boolean_vocabulary(distinct: &[String]) -> Option<(&'static str, &'static str)> {
    if distinct.is_empty() {
        return None;
    }
    BOOLEAN_VOCABULARIES.iter().copied().find(|(t, f)| {
        distinct
            .iter()
            .all(|v| v.eq_ignore_ascii_case(t) || v.eq_ignore_ascii_case(f))
    })
}

fn dominant_grammar(matches: &HashMap<DateGrammar, usize>) -> Option<DateGrammar> {
    let mut best: Option<(DateGrammar, usize)> = None;
    for grammar in DateGrammar::ALL {
        let count = matches.get(&grammar).copied().unwrap_or(0);
        if count > 0 && best.map_or(true, |(_, c)| count > c) {
            best = Some((grammar, count));
        }
    }
    best.map(|(g, _)| g)
}

fn parse_values(
    column: &Column,
    inference: &TypeInference,
    token: &CancellationToken,
) -> Result<TypedValues> {
    let mut numbers = Vec::new();
    let mut timestamps = Vec::new();
    let mut labels = Vec::new();
    // boolean spellings fold to the first spelling seen for each truth value
    let mut spellings: HashMap<String, String> = HashMap::new();

    for (row, cell) in column.values.iter().enumerate() {
        if row % CHECK_INTERVAL == 0 {
            token.check()?;
        }
        match inference.semantic_type {
            SemanticType::Numeric => {
                if let Some(v) = parse_number(cell) {
                    numbers.push((row, v));
                }
            }
            SemanticType::Datetime => {
                if let Some((dt, _)) = parse_datetime(cell) {
                    timestamps.push((row, dt));
                }
            }
            SemanticType::Boolean => {
                if let Some(text) = cell.as_text() {
                    let spelling = spellings
                        .entry(text.to_ascii_lowercase())
                        .or_insert(text)
                        .clone();
                    labels.push((row, spelling));
                }
            }
            SemanticType::Categorical | SemanticType::Text => {
                if let Some(text) = cell.as_text() {
                    labels.push((row, text));
                }
            }
            SemanticType::Unknown => return Ok(TypedValues::Empty),
        }
    }

    Ok(match inference.semantic_type {
        SemanticType::Numeric => TypedValues::Numeric(numbers),
        SemanticType::Datetime => TypedValues::Datetime(timestamps),
        SemanticType::Unknown => TypedValues::Empty,
        _ => TypedValues::Labels(labels),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn infer(values: Vec<CellValue>) -> Result<TypedColumn> {
        TypeInferenceEngine::default().infer(
            &Column::new("c", values),
            0,
            &CancellationToken::new(),
        )
    }

    fn text(values: &[&str]) -> Vec<CellValue> {
        values.iter().map(|v| CellValue::from(*v)).collect()
    }

    #[test]
    fn test_numeric_detection() {
        let typed = infer(text(&["1", "2.5", "-3", "4e2", ".5"])).unwrap();
        assert_eq!(typed.semantic_type(), SemanticType::Numeric);
        assert!(!typed.inference.integral);
        assert_eq!(typed.numbers().unwrap().len(), 5);

        let ints = infer(vec![CellValue::Int(1), CellValue::Int(2), CellValue::Missing]).unwrap();
        assert_eq!(ints.semantic_type(), SemanticType::Numeric);
        assert!(ints.inference.integral);
        assert_eq!(ints.inference.non_missing, 2);
    }

    #[test]
    fn test_numeric_threshold() {
        // 19 of 20 parse: exactly 95%
        let mut values: Vec<CellValue> = (0..19).map(CellValue::Int).collect();
        values.push("n/a".into());
        assert_eq!(infer(values.clone()).unwrap().semantic_type(), SemanticType::Numeric);

        values.push("unknown".into());
        assert_ne!(infer(values).unwrap().semantic_type(), SemanticType::Numeric);
    }

    #[test]
    fn test_boolean_vocabularies() {
        let typed = infer(text(&["Y", "N", "Y", "Y"])).unwrap();
        assert_eq!(typed.semantic_type(), SemanticType::Boolean);

        let typed = infer(text(&["yes", "No", "YES"])).unwrap();
        assert_eq!(typed.semantic_type(), SemanticType::Boolean);

        let typed = infer(vec![true.into(), false.into()]).unwrap();
        assert_eq!(typed.semantic_type(), SemanticType::Boolean);

        // mixing two vocabularies is not boolean
        let typed = infer(text(&["yes", "n", "yes", "n", "yes", "n"])).unwrap();
        assert_eq!(typed.semantic_type(), SemanticType::Categorical);

        let typed = infer(text(&["Y", "y", "N", "n", "Y"])).unwrap();
        assert_eq!(typed.semantic_type(), SemanticType::Boolean);
        let labels: Vec<&str> = typed.labels().unwrap().iter().map(|(_, s)| s.as_str()).collect();
        assert_eq!(labels, vec!["Y", "Y", "N", "N", "Y"]);

        // 0/1 is numeric by precedence
        let typed = infer(text(&["0", "1", "1"])).unwrap();
        assert_eq!(typed.semantic_type(), SemanticType::Numeric);
    }

    #[test]
    fn test_datetime_detection() {
        let typed = infer(text(&["2024-01-01", "2024-01-02", "2024/01/03", "2024-01-04"])).unwrap();
        assert_eq!(typed.semantic_type(), SemanticType::Datetime);
        assert_eq!(typed.inference.date_format, Some(DateGrammar::IsoDate));
        assert_eq!(typed.timestamps().unwrap().len(), 4);

        let typed = infer(text(&["2024-01-01T10:00:00Z", "2024-01-01T11:30:00+02:00"])).unwrap();
        assert_eq!(typed.inference.date_format, Some(DateGrammar::Rfc3339));

        let typed = infer(text(&["2024-01-01 10:00:00", "2024-01-01T10:00:00.250"])).unwrap();
        assert_eq!(typed.inference.date_format, Some(DateGrammar::IsoDateTime));
    }

    #[test]
    fn test_grammar_tie_uses_declaration_order() {
        let typed = infer(text(&["31.12.2023", "2024-01-01"])).unwrap();
        assert_eq!(typed.inference.date_format, Some(DateGrammar::IsoDate));
    }

    #[test]
    fn test_categorical_vs_text() {
        let typed = infer(text(&["red", "blue", "red", "blue", "red", "red"])).unwrap();
        assert_eq!(typed.semantic_type(), SemanticType::Categorical);
        assert_eq!(typed.inference.distinct, 2);

        let typed = infer(text(&["alpha", "beta", "gamma", "delta"])).unwrap();
        assert_eq!(typed.semantic_type(), SemanticType::Text);
    }

    #[test]
    fn test_empty_column() {
        let result = infer(vec![CellValue::Missing, "  ".into(), CellValue::Float(f64::NAN)]);
        assert!(matches!(result, Err(EngineError::EmptyColumn { .. })));
    }

    #[test]
    fn test_cancellation_is_observed() {
        let token = CancellationToken::new();
        token.cancel();
        let result =
            TypeInferenceEngine::default().infer(&Column::new("c", text(&["a"])), 0, &token);
        assert!(matches!(result, Err(EngineError::Cancelled { .. })));
    }

    #[test]
    fn test_parse_number_rejects_non_finite() {
        assert_eq!(parse_number(&CellValue::Float(f64::INFINITY)), None);
        assert_eq!(parse_number(&"inf".into()), None);
        assert_eq!(parse_number(&" 42 ".into()), Some(42.0));
    }
}
