//! # field-guard - Exploratory Profiling and Rule Synthesis for Rust
//!
//! field-guard profiles an in-memory tabular dataset and derives plain,
//! machine-checkable validation rules from what it observes. A single call infers
//! each column's semantic type, measures completeness and duplication, summarizes
//! distributions, tests pairwise relationships, decomposes datetime-indexed series,
//! flags outliers with three independent methods and turns all of it into
//! per-field rules.
//!
//! ## Quick Start
//!
//! ```rust
//! use field_guard::prelude::*;
//!
//! # fn example() -> field_guard::error::Result<()> {
//! let dataset = Dataset::builder("signups")
//!     .column_from("age", vec![34i64, 29, 41, 38, 25])
//!     .column_from("newsletter", vec!["Y", "N", "Y", "Y", "N"])
//!     .build()?;
//!
//! let config = AnalysisConfig::builder().isolation_seed(7).build()?;
//! let profile = field_guard::analyze(&dataset, &config)?;
//!
//! for rule in &profile.rules {
//!     println!("{}: {}", rule.field, rule.statement);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Key Features
//!
//! - **Type inference**: numeric, boolean, datetime, categorical and free text,
//!   with configurable thresholds and a fixed precedence order
//! - **Quality**: completeness, distinctness and type-aware duplicate rows
//! - **Statistics**: quartiles by linear interpolation, moments, frequency tables
//! - **Relationships**: Pearson correlation and chi-square independence tests
//! - **Outliers**: z-score, IQR fences and a seeded isolation forest
//! - **Rules**: type, range, nullability, enumeration, length, character-class,
//!   format and relationship rules, in a deterministic order
//!
//! ## Execution model
//!
//! Every column- or pair-level computation is a *unit*. Units run concurrently on
//! a bounded worker pool, may carry a timeout, and observe a shared
//! [`CancellationToken`](cancellation::CancellationToken). A unit that fails,
//! times out or has too little data is recorded in the profile's diagnostics
//! instead of failing the run. Only an empty dataset or an invalid configuration
//! is fatal.
//!
//! ## Architecture
//!
//! - **`dataset`**: the immutable column-major input model
//! - **`sources`**: conversion from Arrow record batches and DataFusion tables
//! - **`analyzers`**: the analysis components, the profile model and the runner
//! - **`config`**: the single configuration structure
//! - **`formatters`**: JSON, console and Markdown rendering of profiles
//! - **`explain`**: the hand-off boundary for external text explanations
//! - **`logging`**: `tracing` helpers and subscriber setup

pub mod analyzers;
pub mod cancellation;
pub mod config;
pub mod dataset;
pub mod error;
pub mod explain;
pub mod formatters;
pub mod logging;
pub mod prelude;
pub mod sources;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_fixtures;

use crate::analyzers::{AnalysisProfile, AnalysisRunner};
use crate::config::AnalysisConfig;
use crate::dataset::Dataset;
use crate::error::Result;

/// Profiles `dataset` and synthesizes its validation rules.
///
/// Blocks until every unit has finished, timed out or been skipped. Fails with
/// [`EngineError::InvalidDataset`](error::EngineError::InvalidDataset) when the
/// dataset has no rows or no columns, and with
/// [`EngineError::InvalidConfiguration`](error::EngineError::InvalidConfiguration)
/// for out-of-range options. Use [`AnalysisRunner`] directly for cancellation,
/// progress reporting or async callers.
pub fn analyze(dataset: &Dataset, config: &AnalysisConfig) -> Result<AnalysisProfile> {
    AnalysisRunner::new(config.clone()).run(dataset)
}
