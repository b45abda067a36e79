//! Configuration surface consumed by [`analyze`](crate::analyze).
//!
//! Every knob has a default, so `AnalysisConfig::default()` is a working
//! configuration. Configurations can also be loaded from JSON, where missing fields
//! fall back to their defaults:
//!
//! ```rust
//! use field_guard::config::AnalysisConfig;
//!
//! let config = AnalysisConfig::from_json_str(r#"{ "zscore_threshold": 2.5, "isolation_seed": 7 }"#)
//!     .unwrap();
//! assert_eq!(config.zscore_threshold, 2.5);
//! assert_eq!(config.iqr_k, 1.5);
//! assert_eq!(config.isolation_seed, Some(7));
//! ```

use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};
use crate::logging::LogConfig;

/// Characters accepted by the text character-class rule besides ASCII alphanumerics.
pub const DEFAULT_ALLOWED_PUNCTUATION: &str = " .,;:!?'\"-_()/&@#%+*=[]";

/// Options for a single analysis run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Fraction of non-missing values that must parse as numbers (default: 0.95)
    pub numeric_threshold: f64,
    /// Maximum distinct/non-missing ratio for a categorical column (default: 0.5)
    pub categorical_cardinality_ratio: f64,
    /// Fraction of non-missing values that must match a date grammar (default: 0.9)
    pub datetime_threshold: f64,
    /// Z-score above which a value is flagged (default: 3.0)
    pub zscore_threshold: f64,
    /// IQR fence multiplier (default: 1.5)
    pub iqr_k: f64,
    /// Isolation score above which a value is flagged (default: 0.6)
    pub isolation_score_threshold: f64,
    /// Seed for the isolation ensemble; drawn from OS entropy when absent
    pub isolation_seed: Option<u64>,
    /// Trees in the isolation ensemble (default: 100)
    pub isolation_trees: usize,
    /// Subsample size per isolation tree (default: 256)
    pub isolation_sample_size: usize,
    /// Minimum non-missing values before the isolation ensemble runs (default: 10)
    pub isolation_min_samples: usize,
    /// Minimum |r| for a correlation relationship rule (default: 0.7)
    pub correlation_strength_threshold: f64,
    /// Minimum Cramér's V for an association relationship rule (default: 0.5)
    pub association_strength_threshold: f64,
    /// p-value below which a chi-square association counts as significant (default: 0.05)
    pub significance_level: f64,
    /// Minimum paired samples for a Pearson coefficient (default: 3)
    pub min_correlation_samples: usize,
    /// Frequency-table size before the remainder goes to "other" (default: 50)
    pub top_n_categories: usize,
    /// Largest value set emitted as a closed enumeration rule (default: 50)
    pub max_enumerated_values: usize,
    /// Absolute tolerance for numeric equality in duplicate detection (default: 0.0)
    pub numeric_tolerance: f64,
    /// Compare text case-insensitively in duplicate detection (default: false)
    pub case_insensitive_text: bool,
    /// Characters beyond ASCII alphanumerics allowed in text values
    pub allowed_text_characters: String,
    /// Full seasonal periods required before decomposition runs (default: 2)
    pub decomposition_min_periods: usize,
    /// Per-unit time budget in milliseconds; `None` means no timeout
    pub per_unit_timeout_ms: Option<u64>,
    /// Maximum units running at once (default: available parallelism)
    pub max_concurrency: usize,
    /// Engine logging knobs
    #[serde(skip)]
    pub log: LogConfig,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            numeric_threshold: 0.95,
            categorical_cardinality_ratio: 0.5,
            datetime_threshold: 0.9,
            zscore_threshold: 3.0,
            iqr_k: 1.5,
            isolation_score_threshold: 0.6,
            isolation_seed: None,
            isolation_trees: 100,
            isolation_sample_size: 256,
            isolation_min_samples: 10,
            correlation_strength_threshold: 0.7,
            association_strength_threshold: 0.5,
            significance_level: 0.05,
            min_correlation_samples: 3,
            top_n_categories: 50,
            max_enumerated_values: 50,
            numeric_tolerance: 0.0,
            case_insensitive_text: false,
            allowed_text_characters: DEFAULT_ALLOWED_PUNCTUATION.to_string(),
            decomposition_min_periods: 2,
            per_unit_timeout_ms: None,
            max_concurrency: num_cpus::get().max(1),
            log: LogConfig::default(),
        }
    }
}

impl AnalysisConfig {
    /// Creates a builder starting from the defaults.
    pub fn builder() -> AnalysisConfigBuilder {
        AnalysisConfigBuilder {
            config: Self::default(),
        }
    }

    /// Parses a JSON document; absent fields keep their defaults.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks every option is within its valid range.
    pub fn validate(&self) -> Result<()> {
        let ratios = [
            ("numeric_threshold", self.numeric_threshold),
            (
                "categorical_cardinality_ratio",
                self.categorical_cardinality_ratio,
            ),
            ("datetime_threshold", self.datetime_threshold),
            ("isolation_score_threshold", self.isolation_score_threshold),
            (
                "correlation_strength_threshold",
                self.correlation_strength_threshold,
            ),
            (
                "association_strength_threshold",
                self.association_strength_threshold,
            ),
            ("significance_level", self.significance_level),
        ];
        for (name, value) in ratios {
            if !(0.0..=1.0).contains(&value) {
                return Err(EngineError::invalid_config(format!(
                    "{name} must be in [0, 1], got {value}"
                )));
            }
        }

        if !(self.zscore_threshold > 0.0) {
            return Err(EngineError::invalid_config(format!(
                "zscore_threshold must be positive, got {}",
                self.zscore_threshold
            )));
        }
        if !(self.iqr_k >= 0.0) {
            return Err(EngineError::invalid_config(format!(
                "iqr_k must be non-negative, got {}",
                self.iqr_k
            )));
        }
        if !(self.numeric_tolerance >= 0.0) {
            return Err(EngineError::invalid_config(format!(
                "numeric_tolerance must be non-negative, got {}",
                self.numeric_tolerance
            )));
        }
        if self.isolation_trees == 0 || self.isolation_sample_size < 2 {
            return Err(EngineError::invalid_config(
                "isolation ensemble needs at least one tree and a sample size of 2",
            ));
        }
        if self.min_correlation_samples < 2 {
            return Err(EngineError::invalid_config(
                "min_correlation_samples must be at least 2",
            ));
        }
        if self.top_n_categories == 0 {
            return Err(EngineError::invalid_config(
                "top_n_categories must be at least 1",
            ));
        }
        if self.decomposition_min_periods == 0 {
            return Err(EngineError::invalid_config(
                "decomposition_min_periods must be at least 1",
            ));
        }
        if self.max_concurrency == 0 {
            return Err(EngineError::invalid_config(
                "max_concurrency must be at least 1",
            ));
        }
        if self.per_unit_timeout_ms == Some(0) {
            return Err(EngineError::invalid_config(
                "per_unit_timeout_ms must be positive when set",
            ));
        }
        Ok(())
    }

    /// Whether a character passes the text character-class rule.
    pub fn is_allowed_char(&self, c: char) -> bool {
        c.is_ascii_alphanumeric() || self.allowed_text_characters.contains(c)
    }
}

/// Builder for [`AnalysisConfig`].
#[derive(Debug, Clone)]
pub struct AnalysisConfigBuilder {
    config: AnalysisConfig,
}

impl AnalysisConfigBuilder {
    pub fn numeric_threshold(mut self, threshold: f64) -> Self {
        self.config.numeric_threshold = threshold;
        self
    }

    pub fn categorical_cardinality_ratio(mut self, ratio: f64) -> Self {
        self.config.categorical_cardinality_ratio = ratio;
        self
    }

    pub fn datetime_threshold(mut self, threshold: f64) -> Self {
        self.config.datetime_threshold = threshold;
        self
    }

    pub fn zscore_threshold(mut self, threshold: f64) -> Self {
        self.config.zscore_threshold = threshold;
        self
    }

    pub fn iqr_k(mut self, k: f64) -> Self {
        self.config.iqr_k = k;
        self
    }

    pub fn isolation_score_threshold(mut self, threshold: f64) -> Self {
        self.config.isolation_score_threshold = threshold;
        self
    }

    pub fn isolation_seed(mut self, seed: u64) -> Self {
        self.config.isolation_seed = Some(seed);
        self
    }

    pub fn isolation_trees(mut self, trees: usize) -> Self {
        self.config.isolation_trees = trees;
        self
    }

    pub fn isolation_sample_size(mut self, size: usize) -> Self {
        self.config.isolation_sample_size = size;
        self
    }

    pub fn isolation_min_samples(mut self, min: usize) -> Self {
        self.config.isolation_min_samples = min;
        self
    }

    pub fn correlation_strength_threshold(mut self, threshold: f64) -> Self {
        self.config.correlation_strength_threshold = threshold;
        self
    }

    pub fn association_strength_threshold(mut self, threshold: f64) -> Self {
        self.config.association_strength_threshold = threshold;
        self
    }

    pub fn significance_level(mut self, alpha: f64) -> Self {
        self.config.significance_level = alpha;
        self
    }

    pub fn min_correlation_samples(mut self, min: usize) -> Self {
        self.config.min_correlation_samples = min;
        self
    }

    pub fn top_n_categories(mut self, n: usize) -> Self {
        self.config.top_n_categories = n;
        self
    }

    pub fn max_enumerated_values(mut self, max: usize) -> Self {
        self.config.max_enumerated_values = max;
        self
    }

    pub fn numeric_tolerance(mut self, tolerance: f64) -> Self {
        self.config.numeric_tolerance = tolerance;
        self
    }

    pub fn case_insensitive_text(mut self, enable: bool) -> Self {
        self.config.case_insensitive_text = enable;
        self
    }

    pub fn allowed_text_characters(mut self, chars: impl Into<String>) -> Self {
        self.config.allowed_text_characters = chars.into();
        self
    }

    pub fn decomposition_min_periods(mut self, periods: usize) -> Self {
        self.config.decomposition_min_periods = periods;
        self
    }

    pub fn per_unit_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.config.per_unit_timeout_ms = Some(timeout_ms);
        self
    }

    pub fn max_concurrency(mut self, max: usize) -> Self {
        self.config.max_concurrency = max;
        self
    }

    pub fn log(mut self, log: LogConfig) -> Self {
        self.config.log = log;
        self
    }

    /// Validates and returns the configuration.
    pub fn build(self) -> Result<AnalysisConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}
