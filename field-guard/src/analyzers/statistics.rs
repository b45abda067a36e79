//! Descriptive statistics per semantic type.
//!
//! Missing values never enter these computations; they are reported through the
//! missing ratio of the quality profiler instead.

use std::collections::{BTreeSet, HashMap};

use chrono::NaiveDateTime;
use statrs::statistics::Statistics;
use tracing::{debug, instrument};

use crate::analyzers::inference::{SemanticType, TypedColumn};
use crate::analyzers::math::{quantile, sorted};
use crate::analyzers::profile::{
    DatetimeSummary, FrequencyEntry, FrequencyTable, NumericSummary, TextSummary, TypeSummary,
};
use crate::cancellation::CancellationToken;
use crate::config::AnalysisConfig;
use crate::error::{EngineError, Result};

/// Offending characters listed in a text summary.
const MAX_REPORTED_CHARACTERS: usize = 20;

/// Threshold on |skewness| and |excess kurtosis| for the normality flag.
const NORMALITY_TOLERANCE: f64 = 0.5;

impl NumericSummary {
    /// Computes the summary of a non-empty slice of finite values.
    pub fn compute(values: &[f64]) -> Option<Self> {
        if values.is_empty() {
            return None;
        }
        let n = values.len() as f64;
        let sorted = sorted(values);
        let sum: f64 = values.iter().sum();
        let mean = values.iter().mean();
        let variance = values.iter().population_variance();

        let (mut m3, mut m4) = (0.0, 0.0);
        for v in values {
            let d2 = (v - mean).powi(2);
            m3 += d2 * (v - mean);
            m4 += d2 * d2;
        }
        let (skewness, kurtosis) = if variance > 0.0 {
            (
                Some((m3 / n) / variance.powf(1.5)),
                Some((m4 / n) / (variance * variance) - 3.0),
            )
        } else {
            (None, None)
        };
        let approximately_normal = matches!(
            (skewness, kurtosis),
            (Some(s), Some(k)) if s.abs() < NORMALITY_TOLERANCE && k.abs() < NORMALITY_TOLERANCE
        );

        let q1 = quantile(&sorted, 0.25)?;
        let median = quantile(&sorted, 0.5)?;
        let q3 = quantile(&sorted, 0.75)?;

        Some(Self {
            count: values.len(),
            min: sorted[0],
            max: sorted[sorted.len() - 1],
            sum,
            mean,
            median,
            std_dev: variance.sqrt(),
            variance,
            q1,
            q3,
            iqr: q3 - q1,
            skewness,
            kurtosis,
            approximately_normal,
            integral: values.iter().all(|v| v.fract() == 0.0),
        })
    }
}

impl FrequencyTable {
    /// Counts labels; sorted by count descending with ties in first-seen order.
    ///
    /// Only the `top_n` most frequent values are listed; the rest of the mass goes
    /// to `other_count`.
    pub fn build<'a>(labels: impl IntoIterator<Item = &'a str>, top_n: usize) -> Self {
        let mut index: HashMap<&str, usize> = HashMap::new();
        let mut counts: Vec<(&str, usize)> = Vec::new();
        let mut total = 0;
        for label in labels {
            total += 1;
            match index.get(label) {
                Some(&i) => counts[i].1 += 1,
                None => {
                    index.insert(label, counts.len());
                    counts.push((label, 1));
                }
            }
        }
        // stable: equal counts keep first-seen order
        counts.sort_by(|a, b| b.1.cmp(&a.1));

        let distinct_values = counts.len();
        let other_count = counts.iter().skip(top_n).map(|(_, c)| c).sum();
        let entries = counts
            .into_iter()
            .take(top_n)
            .map(|(value, count)| FrequencyEntry {
                value: value.to_string(),
                count,
                ratio: count as f64 / total as f64,
            })
            .collect();

        Self {
            entries,
            other_count,
            distinct_values,
            total,
        }
    }
}

impl TextSummary {
    pub fn compute<'a>(
        values: impl IntoIterator<Item = &'a str>,
        config: &AnalysisConfig,
    ) -> Option<Self> {
        let mut count = 0;
        let mut min_length = usize::MAX;
        let mut max_length = 0;
        let mut total_length = 0;
        let mut contains_digits = false;
        let mut contains_special_chars = false;
        let mut disallowed_value_count = 0;
        let mut disallowed = BTreeSet::new();

        for value in values {
            let length = value.chars().count();
            count += 1;
            min_length = min_length.min(length);
            max_length = max_length.max(length);
            total_length += length;

            let mut offending = false;
            for c in value.chars() {
                contains_digits |= c.is_ascii_digit();
                contains_special_chars |= !c.is_alphanumeric() && !c.is_whitespace();
                if !config.is_allowed_char(c) {
                    offending = true;
                    disallowed.insert(c);
                }
            }
            if offending {
                disallowed_value_count += 1;
            }
        }

        (count > 0).then(|| Self {
            count,
            min_length,
            max_length,
            mean_length: total_length as f64 / count as f64,
            contains_digits,
            contains_special_chars,
            disallowed_value_count,
            disallowed_characters: disallowed.into_iter().take(MAX_REPORTED_CHARACTERS).collect(),
        })
    }
}

/// Most common gap in seconds between consecutive distinct sorted timestamps.
///
/// Ties go to the smaller gap. `None` with fewer than two distinct instants.
pub fn modal_spacing(sorted: &[NaiveDateTime]) -> Option<i64> {
    let mut gaps: HashMap<i64, usize> = HashMap::new();
    for pair in sorted.windows(2) {
        let gap = (pair[1] - pair[0]).num_seconds();
        if gap > 0 {
            *gaps.entry(gap).or_insert(0) += 1;
        }
    }
    gaps.into_iter()
        .max_by(|a, b| a.1.cmp(&b.1).then(b.0.cmp(&a.0)))
        .map(|(gap, _)| gap)
}

/// Produces the type-specific summary of a typed column.
#[derive(Debug, Clone)]
pub struct StatisticalSummarizer {
    config: AnalysisConfig,
}

impl StatisticalSummarizer {
    pub fn new(config: &AnalysisConfig) -> Self {
        Self {
            config: config.clone(),
        }
    }

    #[instrument(skip_all, fields(column = %typed.name))]
    pub fn summarize(&self, typed: &TypedColumn, token: &CancellationToken) -> Result<TypeSummary> {
        token.check()?;
        let insufficient = || EngineError::InsufficientData {
            required: 1,
            actual: 0,
        };

        let summary = match typed.semantic_type() {
            SemanticType::Numeric => {
                let values: Vec<f64> = typed.numbers().unwrap_or(&[]).iter().map(|(_, v)| *v).collect();
                TypeSummary::Numeric(NumericSummary::compute(&values).ok_or_else(insufficient)?)
            }
            SemanticType::Boolean => TypeSummary::Boolean(self.frequency_table(typed)),
            SemanticType::Categorical => TypeSummary::Categorical(self.frequency_table(typed)),
            SemanticType::Text => {
                let labels = typed.labels().unwrap_or(&[]);
                let summary = TextSummary::compute(labels.iter().map(|(_, s)| s.as_str()), &self.config)
                    .ok_or_else(insufficient)?;
                TypeSummary::Text(summary)
            }
            SemanticType::Datetime => {
                let mut instants: Vec<NaiveDateTime> =
                    typed.timestamps().unwrap_or(&[]).iter().map(|(_, t)| *t).collect();
                instants.sort();
                let (Some(&min), Some(&max)) = (instants.first(), instants.last()) else {
                    return Err(insufficient());
                };
                TypeSummary::Datetime(DatetimeSummary {
                    count: instants.len(),
                    min,
                    max,
                    span_seconds: (max - min).num_seconds(),
                    modal_spacing_seconds: modal_spacing(&instants),
                    format: typed
                        .inference
                        .date_format
                        .ok_or_else(|| EngineError::internal("datetime column without a format"))?,
                })
            }
            SemanticType::Unknown => TypeSummary::None,
        };

        debug!(column = %typed.name, kind = %typed.semantic_type(), "Summarized column");
        Ok(summary)
    }

    fn frequency_table(&self, typed: &TypedColumn) -> FrequencyTable {
        let labels = typed.labels().unwrap_or(&[]);
        FrequencyTable::build(
            labels.iter().map(|(_, s)| s.as_str()),
            self.config.top_n_categories,
        )
    }
}
