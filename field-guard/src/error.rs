//! Error types for the profiling engine.
//!
//! Only dataset-level structural problems are fatal. Everything that can go wrong
//! inside a single column or column pair (an empty column, a timeout, a cancelled
//! unit) is carried into the profile as a diagnostic instead of aborting the run;
//! [`EngineError::is_fatal`] tells the two classes apart.

use thiserror::Error;

/// Result type used throughout the crate.
pub type Result<T> = std::result::Result<T, EngineError>;

/// Errors produced by the profiling engine.
#[derive(Error, Debug)]
pub enum EngineError {
    /// The dataset has no columns or no rows.
    #[error("Invalid dataset: {reason}")]
    InvalidDataset { reason: String },

    /// A column has no non-missing values.
    #[error("Column '{column}' has no non-missing values")]
    EmptyColumn { column: String },

    /// A unit of analysis ran past its time budget.
    #[error("Unit '{unit}' exceeded its timeout of {timeout_ms} ms")]
    UnitTimeout { unit: String, timeout_ms: u64 },

    /// The caller cancelled the analysis.
    #[error("Analysis cancelled after {completed_units} completed units")]
    Cancelled { completed_units: usize },

    /// Too few usable values for a computation to be meaningful.
    #[error("Insufficient data: need at least {required} values, got {actual}")]
    InsufficientData { required: usize, actual: usize },

    /// A computation divides by a spread that is zero.
    #[error("Column '{column}' has zero variance")]
    ZeroVariance { column: String },

    /// The spacing of a datetime column maps to no seasonal period.
    #[error("No seasonal period for a spacing of {spacing_seconds:?} seconds")]
    NoSeasonalPeriod { spacing_seconds: Option<i64> },

    /// A configuration value is out of range.
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// Two columns share the same (case-sensitive) name.
    #[error("Duplicate column name '{column}'")]
    DuplicateColumn { column: String },

    /// A column does not have the same number of rows as the others.
    #[error("Column '{column}' has {actual} rows, expected {expected}")]
    RowCountMismatch {
        column: String,
        expected: usize,
        actual: usize,
    },

    /// A requested column does not exist.
    #[error("Column '{column}' not found in dataset")]
    ColumnNotFound { column: String },

    /// Arrow conversion error while ingesting record batches.
    #[error("Arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    /// DataFusion error while collecting a registered table.
    #[error("DataFusion error: {0}")]
    DataFusion(#[from] datafusion::error::DataFusionError),

    /// Serialization or deserialization failure.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// The external explanation service reported a failure.
    #[error("Explanation service error: {0}")]
    Explanation(String),

    /// Unexpected internal failure (for example a panicked worker).
    #[error("Internal error: {0}")]
    Internal(String),
}

impl EngineError {
    /// Creates an invalid dataset error with the given reason.
    pub fn invalid_dataset(reason: impl Into<String>) -> Self {
        Self::InvalidDataset {
            reason: reason.into(),
        }
    }

    /// Creates an invalid configuration error with the given message.
    pub fn invalid_config(msg: impl Into<String>) -> Self {
        Self::InvalidConfiguration(msg.into())
    }

    /// Creates an explanation service error with the given message.
    pub fn explanation(msg: impl Into<String>) -> Self {
        Self::Explanation(msg.into())
    }

    /// Creates an internal error with the given message.
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Returns true when the error aborts the whole analysis call.
    ///
    /// Column- and pair-level failures are isolated into diagnostics.
    pub fn is_fatal(&self) -> bool {
        !matches!(
            self,
            Self::EmptyColumn { .. }
                | Self::UnitTimeout { .. }
                | Self::Cancelled { .. }
                | Self::InsufficientData { .. }
                | Self::ZeroVariance { .. }
                | Self::NoSeasonalPeriod { .. }
        )
    }
}

impl From<serde_json::Error> for EngineError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}
