//! Analysis components and the runner that sequences them.
//!
//! Data flows one way: the dataset goes through type inference, then quality
//! measurement, statistical summaries, relationship tests, seasonal decomposition
//! and outlier detection (all independent of each other), and finally rule
//! synthesis over the assembled profile.
//!
//! ## Components
//!
//! - **Type inference** (`inference`): numeric, boolean, datetime, categorical or
//!   text, with confidence and the dominant date grammar
//! - **Quality** (`quality`): completeness, distinctness and duplicate rows
//! - **Statistics** (`statistics`): numeric moments and quartiles, frequency
//!   tables, text lengths and datetime ranges
//! - **Relationships** (`relationships`): Pearson correlation and chi-square tests
//! - **Temporal** (`temporal`): classical additive seasonal decomposition
//! - **Outliers** (`outliers`): z-score, IQR and isolation forest
//! - **Rules** (`rules`): per-field validation rules derived from the profile
//! - **Runner** (`runner`): concurrent, cancellable execution of all of the above
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use field_guard::analyzers::{AnalysisRunner, OutlierMethod};
//! use field_guard::config::AnalysisConfig;
//! use field_guard::dataset::Dataset;
//!
//! # fn example() -> field_guard::error::Result<()> {
//! let dataset = Dataset::builder("readings")
//!     .column_from("value", vec![1i64, 2, 3, 4, 100])
//!     .build()?;
//! let profile = AnalysisRunner::new(AnalysisConfig::builder().isolation_seed(1).build()?)
//!     .run(&dataset)?;
//!
//! for finding in profile.outliers_by_method(OutlierMethod::ZScore) {
//!     println!("row {} looks anomalous ({:.1})", finding.row_index, finding.severity);
//! }
//! # Ok(())
//! # }
//! ```

pub mod inference;
pub(crate) mod math;
pub mod outliers;
pub mod profile;
pub mod quality;
pub mod relationships;
pub mod rules;
pub mod runner;
pub mod statistics;
pub mod temporal;

pub use inference::{DateGrammar, SemanticType, TypeInferenceEngine, TypedColumn};
pub use outliers::{IsolationForest, OutlierDetector};
pub use profile::{
    AnalysisProfile, ColumnProfile, DatasetSummary, Diagnostic, DuplicateReport, FrequencyTable,
    NumericSummary, OutlierFinding, OutlierMethod, ProfileStatus, RelationshipEdge,
    RelationshipKind, RuleKind, RuleParameter, RuleStrength, SeasonalDecomposition, SkipReason,
    TypeSummary, ValidationRule,
};
pub use quality::DuplicateDetector;
pub use relationships::RelationshipAnalyzer;
pub use rules::{
    CharacterClassRule, DatetimeFormatRule, DecimalRule, DigitRule, DistinctValuesRule,
    EnumerationRule, LengthRule, NullabilityRule, OutlierAdvisoryRule, RangeRule,
    RelationshipRule, RuleContext, RuleSynthesizer, SynthesisRule, TypeConstraintRule,
};
pub use runner::{AnalysisRunner, ProgressCallback};
pub use statistics::StatisticalSummarizer;
pub use temporal::SeasonalDecomposer;
