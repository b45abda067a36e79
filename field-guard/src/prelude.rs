//! Prelude for commonly used types and traits in field-guard.

pub use crate::analyzers::{
    AnalysisProfile, AnalysisRunner, ColumnProfile, OutlierMethod, RuleKind, RuleStrength,
    SemanticType, ValidationRule,
};
pub use crate::cancellation::CancellationToken;
pub use crate::config::AnalysisConfig;
pub use crate::dataset::{CellValue, Column, Dataset};
pub use crate::error::{EngineError, Result};
pub use crate::formatters::{FormatterConfig, ProfileFormatter};
pub use crate::logging::LogConfig;
