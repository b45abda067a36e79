//! The analysis profile and the records it aggregates.
//!
//! An [`AnalysisProfile`] is assembled once per `analyze` call and never mutated
//! afterwards. All collections are in a deterministic order: columns in dataset
//! order, relationships by column pair, outliers by column then method then row,
//! rules by column then rule, diagnostics by unit.

use std::collections::BTreeMap;
use std::fmt;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::analyzers::inference::{DateGrammar, SemanticType};
use crate::dataset::CellValue;
use crate::error::Result;

/// Aggregate result of one analysis run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisProfile {
    pub dataset: DatasetSummary,
    pub status: ProfileStatus,
    /// Seed the isolation ensemble ran with (configured or drawn from entropy)
    pub isolation_seed: u64,
    pub columns: Vec<ColumnProfile>,
    pub relationships: Vec<RelationshipEdge>,
    pub decompositions: Vec<SeasonalDecomposition>,
    pub outliers: Vec<OutlierFinding>,
    pub rules: Vec<ValidationRule>,
    pub diagnostics: Vec<Diagnostic>,
}

impl AnalysisProfile {
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn column(&self, name: &str) -> Option<&ColumnProfile> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Rules whose primary or related field is `field`.
    pub fn rules_for<'a>(&'a self, field: &'a str) -> impl Iterator<Item = &'a ValidationRule> {
        self.rules.iter().filter(move |r| {
            r.field == field || r.related_field.as_deref() == Some(field)
        })
    }

    pub fn outliers_by_method(
        &self,
        method: OutlierMethod,
    ) -> impl Iterator<Item = &OutlierFinding> {
        self.outliers.iter().filter(move |o| o.method == method)
    }

    pub fn is_complete(&self) -> bool {
        self.status == ProfileStatus::Complete
    }
}

/// Whether every unit got to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProfileStatus {
    Complete,
    /// The caller cancelled the run; completed units are retained
    Cancelled,
}

/// Dataset identity, shape and row-level quality.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetSummary {
    pub name: String,
    pub fingerprint: String,
    pub row_count: usize,
    pub column_count: usize,
    pub total_cells: usize,
    pub missing_cells: usize,
    pub completeness: f64,
    /// `None` when the duplicate scan was skipped
    pub duplicates: Option<DuplicateReport>,
}

/// Rows that are equal in every column under type-aware equality.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DuplicateReport {
    /// Groups of two or more equal rows
    pub duplicate_groups: usize,
    /// Rows that belong to any duplicate group
    pub duplicated_rows: usize,
    /// Rows beyond the first occurrence in each group
    pub redundant_rows: usize,
    /// Row indices of the first few groups, in first-seen order
    pub sample_groups: Vec<Vec<usize>>,
}

/// Per-column profile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnProfile {
    pub name: String,
    pub semantic_type: SemanticType,
    /// Fraction of non-missing values supporting the inferred type
    pub type_confidence: f64,
    pub non_missing_count: usize,
    pub missing_ratio: f64,
    pub completeness: f64,
    pub distinct_count: usize,
    /// `None` when the column has no non-missing values
    pub distinctness: Option<f64>,
    pub summary: TypeSummary,
}

/// Type-specific part of a column profile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TypeSummary {
    Numeric(NumericSummary),
    Boolean(FrequencyTable),
    Categorical(FrequencyTable),
    Datetime(DatetimeSummary),
    Text(TextSummary),
    /// Unknown columns and columns whose statistics unit was skipped
    None,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NumericSummary {
    pub count: usize,
    pub min: f64,
    pub max: f64,
    pub sum: f64,
    pub mean: f64,
    pub median: f64,
    pub std_dev: f64,
    pub variance: f64,
    pub q1: f64,
    pub q3: f64,
    pub iqr: f64,
    pub skewness: Option<f64>,
    pub kurtosis: Option<f64>,
    pub approximately_normal: bool,
    /// Every value is a whole number
    pub integral: bool,
}

/// Value counts sorted by count descending, ties in first-seen order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrequencyTable {
    pub entries: Vec<FrequencyEntry>,
    /// Mass of values beyond the top-N cap
    pub other_count: usize,
    pub distinct_values: usize,
    pub total: usize,
}

impl FrequencyTable {
    pub fn is_truncated(&self) -> bool {
        self.entries.len() < self.distinct_values
    }

    pub fn values(&self) -> Vec<&str> {
        self.entries.iter().map(|e| e.value.as_str()).collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrequencyEntry {
    pub value: String,
    pub count: usize,
    pub ratio: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatetimeSummary {
    pub count: usize,
    pub min: NaiveDateTime,
    pub max: NaiveDateTime,
    pub span_seconds: i64,
    /// Most common gap between consecutive distinct timestamps
    pub modal_spacing_seconds: Option<i64>,
    pub format: DateGrammar,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextSummary {
    pub count: usize,
    pub min_length: usize,
    pub max_length: usize,
    pub mean_length: f64,
    pub contains_digits: bool,
    pub contains_special_chars: bool,
    /// Values containing at least one character outside the allowed set
    pub disallowed_value_count: usize,
    /// Distinct offending characters, sorted, capped
    pub disallowed_characters: Vec<char>,
}

/// Statistic carried by a relationship edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationshipKind {
    PearsonCorrelation,
    ChiSquare,
}

impl fmt::Display for RelationshipKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PearsonCorrelation => write!(f, "pearson_correlation"),
            Self::ChiSquare => write!(f, "chi_square"),
        }
    }
}

/// A pairwise statistic between two columns, reported once per unordered pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelationshipEdge {
    pub column_a: String,
    pub column_b: String,
    pub kind: RelationshipKind,
    /// r in [-1, 1] for correlation, the statistic (>= 0) for chi-square
    pub value: f64,
    pub p_value: Option<f64>,
    pub significant: bool,
    pub sample_size: usize,
    pub degrees_of_freedom: Option<usize>,
    /// Cramér's V in [0, 1] for chi-square edges
    pub association_strength: Option<f64>,
    /// Some expected cell count fell below 5
    pub low_expected_count: bool,
}

impl RelationshipEdge {
    /// Magnitude compared against the relationship rule thresholds.
    pub fn strength(&self) -> f64 {
        match self.kind {
            RelationshipKind::PearsonCorrelation => self.value.abs(),
            RelationshipKind::ChiSquare => self.association_strength.unwrap_or(0.0),
        }
    }
}

/// Additive decomposition of a numeric series indexed by a datetime column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeasonalDecomposition {
    pub time_column: String,
    pub value_column: String,
    pub period: usize,
    /// Observations in time order
    pub timestamps: Vec<NaiveDateTime>,
    /// Centered moving average; `None` at the edges
    pub trend: Vec<Option<f64>>,
    pub seasonal: Vec<f64>,
    pub residual: Vec<Option<f64>>,
    /// 1 - Var(residual) / Var(seasonal + residual), clamped to [0, 1]
    pub seasonal_strength: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutlierMethod {
    ZScore,
    Iqr,
    IsolationForest,
}

impl OutlierMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ZScore => "zscore",
            Self::Iqr => "iqr",
            Self::IsolationForest => "isolation_forest",
        }
    }
}

impl fmt::Display for OutlierMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One value flagged by one method.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutlierFinding {
    pub column: String,
    pub row_index: usize,
    pub method: OutlierMethod,
    /// |z| for z-score, distance beyond the fence in IQRs, or the isolation score
    pub severity: f64,
    pub value: CellValue,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleKind {
    TypeConstraint,
    Range,
    Nullability,
    Length,
    Pattern,
    Enumeration,
    Relationship,
}

impl fmt::Display for RuleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::TypeConstraint => "type_constraint",
            Self::Range => "range",
            Self::Nullability => "nullability",
            Self::Length => "length",
            Self::Pattern => "pattern",
            Self::Enumeration => "enumeration",
            Self::Relationship => "relationship",
        };
        f.write_str(name)
    }
}

/// Whether a rule held on every observed value or is a softer observation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleStrength {
    Enforced,
    Advisory,
}

/// Parameter backing a rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RuleParameter {
    Bool(bool),
    Integer(i64),
    Float(f64),
    Text(String),
    List(Vec<String>),
}

impl From<bool> for RuleParameter {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for RuleParameter {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<usize> for RuleParameter {
    fn from(value: usize) -> Self {
        Self::Integer(i64::try_from(value).unwrap_or(i64::MAX))
    }
}

impl From<f64> for RuleParameter {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<&str> for RuleParameter {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for RuleParameter {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<Vec<String>> for RuleParameter {
    fn from(value: Vec<String>) -> Self {
        Self::List(value)
    }
}

/// A derived, human-readable validation rule for one field (or a pair of fields).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationRule {
    pub field: String,
    /// Second field of a relationship rule
    pub related_field: Option<String>,
    pub kind: RuleKind,
    pub strength: RuleStrength,
    pub statement: String,
    pub parameters: BTreeMap<String, RuleParameter>,
}

impl ValidationRule {
    pub fn new(
        field: impl Into<String>,
        kind: RuleKind,
        strength: RuleStrength,
        statement: impl Into<String>,
    ) -> Self {
        Self {
            field: field.into(),
            related_field: None,
            kind,
            strength,
            statement: statement.into(),
            parameters: BTreeMap::new(),
        }
    }

    pub fn with_related_field(mut self, field: impl Into<String>) -> Self {
        self.related_field = Some(field.into());
        self
    }

    pub fn with_parameter(mut self, key: &str, value: impl Into<RuleParameter>) -> Self {
        self.parameters.insert(key.to_string(), value.into());
        self
    }
}

/// A unit that did not contribute to the profile, and why.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Diagnostic {
    /// Unit identity, e.g. `outliers.zscore:price` or `relationship:a|b`
    pub unit: String,
    pub reason: SkipReason,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum SkipReason {
    EmptyColumn,
    Timeout { timeout_ms: u64 },
    Cancelled,
    InsufficientData { required: usize, actual: usize },
    ZeroVariance,
    NoSeasonalPeriod { spacing_seconds: Option<i64> },
    Failed { message: String },
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyColumn => write!(f, "column has no non-missing values"),
            Self::Timeout { timeout_ms } => write!(f, "timed out after {timeout_ms} ms"),
            Self::Cancelled => write!(f, "cancelled"),
            Self::InsufficientData { required, actual } => {
                write!(f, "needs {required} values, found {actual}")
            }
            Self::ZeroVariance => write!(f, "zero variance"),
            Self::NoSeasonalPeriod { spacing_seconds } => match spacing_seconds {
                Some(s) => write!(f, "no seasonal period for a spacing of {s} s"),
                None => write!(f, "no regular spacing between timestamps"),
            },
            Self::Failed { message } => write!(f, "failed: {message}"),
        }
    }
}

impl From<crate::error::EngineError> for SkipReason {
    fn from(err: crate::error::EngineError) -> Self {
        use crate::error::EngineError;
        match err {
            EngineError::EmptyColumn { .. } => Self::EmptyColumn,
            EngineError::UnitTimeout { timeout_ms, .. } => Self::Timeout { timeout_ms },
            EngineError::Cancelled { .. } => Self::Cancelled,
            EngineError::InsufficientData { required, actual } => {
                Self::InsufficientData { required, actual }
            }
            EngineError::ZeroVariance { .. } => Self::ZeroVariance,
            EngineError::NoSeasonalPeriod { spacing_seconds } => {
                Self::NoSeasonalPeriod { spacing_seconds }
            }
            other => Self::Failed {
                message: other.to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EngineError;

    #[test]
    fn test_skip_reason_from_error() {
        let reason: SkipReason = EngineError::UnitTimeout {
            unit: "x".to_string(),
            timeout_ms: 10,
        }
        .into();
        assert_eq!(reason, SkipReason::Timeout { timeout_ms: 10 });

        let reason: SkipReason = EngineError::internal("boom").into();
        assert!(matches!(reason, SkipReason::Failed { .. }));
    }

    #[test]
    fn test_rule_serialization_is_ordered() {
        let rule = ValidationRule::new("age", RuleKind::Range, RuleStrength::Enforced, "x")
            .with_parameter("max", 90.0)
            .with_parameter("min", 18.0);
        let json = serde_json::to_string(&rule).unwrap();
        let max_pos = json.find("\"max\"").unwrap();
        let min_pos = json.find("\"min\"").unwrap();
        assert!(max_pos < min_pos);
        assert!(json.contains("\"kind\":\"range\""));
        assert!(json.contains("\"strength\":\"enforced\""));
    }

    #[test]
    fn test_diagnostic_serialization() {
        let diagnostic = Diagnostic {
            unit: "statistics:a".to_string(),
            reason: SkipReason::InsufficientData {
                required: 3,
                actual: 1,
            },
        };
        let json = serde_json::to_value(&diagnostic).unwrap();
        assert_eq!(json["reason"]["reason"], "insufficient_data");
        assert_eq!(json["reason"]["required"], 3);
    }

    #[test]
    fn test_edge_strength() {
        let edge = RelationshipEdge {
            column_a: "a".to_string(),
            column_b: "b".to_string(),
            kind: RelationshipKind::PearsonCorrelation,
            value: -0.8,
            p_value: None,
            significant: true,
            sample_size: 10,
            degrees_of_freedom: None,
            association_strength: None,
            low_expected_count: false,
        };
        assert_eq!(edge.strength(), 0.8);
    }
}
