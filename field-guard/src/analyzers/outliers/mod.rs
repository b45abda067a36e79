//! Per-column outlier detection with three independent methods.
//!
//! Methods never suppress each other: a value flagged by two methods produces two
//! findings. Only numeric columns are examined.
//!
//! - **z-score**: each value is compared with the mean and population standard
//!   deviation of the *other* values in the column, so one extreme value cannot
//!   inflate the spread it is measured against.
//! - **IQR**: values outside `[Q1 - k IQR, Q3 + k IQR]`.
//! - **isolation forest**: values whose anomaly score exceeds a threshold; seeded
//!   per column from the run seed so results are reproducible.

mod isolation;

pub use isolation::IsolationForest;

use tracing::{debug, instrument};

use crate::analyzers::inference::TypedColumn;
use crate::analyzers::math::{quantile, sorted};
use crate::analyzers::profile::{OutlierFinding, OutlierMethod};
use crate::cancellation::{CancellationToken, CHECK_INTERVAL};
use crate::config::AnalysisConfig;
use crate::dataset::Column;
use crate::error::{EngineError, Result};
use crate::log_finding;
use crate::logging::LogConfig;

/// Minimum values for the leave-one-out z-score.
const MIN_ZSCORE_SAMPLES: usize = 3;
/// Relative size below which a leave-one-out sum of squares counts as zero.
const RELATIVE_ZERO: f64 = 1e-12;

/// Golden-ratio increment used to decorrelate per-column seeds.
const SEED_MIX: u64 = 0x9E37_79B9_7F4A_7C15;

/// Seed of the isolation forest for the column at `column_index`.
pub fn column_seed(run_seed: u64, column_index: usize) -> u64 {
    run_seed ^ (column_index as u64 + 1).wrapping_mul(SEED_MIX)
}

/// Runs the outlier methods over numeric columns.
#[derive(Debug, Clone)]
pub struct OutlierDetector {
    zscore_threshold: f64,
    iqr_k: f64,
    isolation_threshold: f64,
    isolation_trees: usize,
    isolation_sample_size: usize,
    isolation_min_samples: usize,
    seed: u64,
    log: LogConfig,
}

impl OutlierDetector {
    pub fn new(config: &AnalysisConfig, seed: u64) -> Self {
        Self {
            zscore_threshold: config.zscore_threshold,
            iqr_k: config.iqr_k,
            isolation_threshold: config.isolation_score_threshold,
            isolation_trees: config.isolation_trees,
            isolation_sample_size: config.isolation_sample_size,
            isolation_min_samples: config.isolation_min_samples,
            seed,
            log: config.log.clone(),
        }
    }

    /// Runs one method over one column.
    pub fn detect(
        &self,
        method: OutlierMethod,
        raw: &Column,
        typed: &TypedColumn,
        token: &CancellationToken,
    ) -> Result<Vec<OutlierFinding>> {
        let values = typed
            .numbers()
            .ok_or_else(|| EngineError::internal("outlier detection requires a numeric column"))?;
        let scored = match method {
            OutlierMethod::ZScore => self.zscore(&typed.name, values, token)?,
            OutlierMethod::Iqr => self.iqr(values, token)?,
            OutlierMethod::IsolationForest => self.isolation(values, typed.index, token)?,
        };

        let findings: Vec<OutlierFinding> = scored
            .into_iter()
            .map(|(row, severity)| {
                log_finding!(
                    self.log,
                    column = %typed.name,
                    row,
                    method = %method,
                    severity,
                    "Flagged value"
                );
                OutlierFinding {
                    column: typed.name.clone(),
                    row_index: row,
                    method,
                    severity,
                    value: raw.values[row].clone(),
                }
            })
            .collect();
        debug!(column = %typed.name, method = %method, flagged = findings.len(), "Outlier scan finished");
        Ok(findings)
    }

    /// Leave-one-out z-scores; returns `(row, |z|)` for flagged values.
    #[instrument(skip_all, fields(column = %column))]
    fn zscore(
        &self,
        column: &str,
        values: &[(usize, f64)],
        token: &CancellationToken,
    ) -> Result<Vec<(usize, f64)>> {
        let n = values.len();
        if n < MIN_ZSCORE_SAMPLES {
            return Err(EngineError::InsufficientData {
                required: MIN_ZSCORE_SAMPLES,
                actual: n,
            });
        }
        let nf = n as f64;
        let mean = values.iter().map(|(_, v)| v).sum::<f64>() / nf;
        let m2: f64 = values.iter().map(|(_, v)| (v - mean).powi(2)).sum();
        if m2 <= 0.0 {
            return Err(EngineError::ZeroVariance {
                column: column.to_string(),
            });
        }
        let population_std = (m2 / nf).sqrt();

        let rest = nf - 1.0;
        let mut flagged = Vec::new();
        for (i, (row, x)) in values.iter().enumerate() {
            if i % CHECK_INTERVAL == 0 {
                token.check()?;
            }
            let rest_mean = (nf * mean - x) / rest;
            let rest_m2 = m2 - (x - mean).powi(2) * nf / rest;
            let distance = (x - rest_mean).abs();
            let z = if rest_m2 <= m2 * RELATIVE_ZERO {
                // every other value is identical: any difference stands out
                if distance <= population_std * RELATIVE_ZERO {
                    continue;
                }
                distance / population_std
            } else {
                distance / (rest_m2 / rest).sqrt()
            };
            if z > self.zscore_threshold || rest_m2 <= m2 * RELATIVE_ZERO {
                flagged.push((*row, z));
            }
        }
        Ok(flagged)
    }

    /// Values outside the Tukey fences; severity is the distance past the fence in IQRs.
    fn iqr(&self, values: &[(usize, f64)], token: &CancellationToken) -> Result<Vec<(usize, f64)>> {
        let raw: Vec<f64> = values.iter().map(|(_, v)| *v).collect();
        let ordered = sorted(&raw);
        let (Some(q1), Some(q3)) = (quantile(&ordered, 0.25), quantile(&ordered, 0.75)) else {
            return Ok(Vec::new());
        };
        let iqr = q3 - q1;
        let lower = q1 - self.iqr_k * iqr;
        let upper = q3 + self.iqr_k * iqr;

        let mut flagged = Vec::new();
        for (i, (row, x)) in values.iter().enumerate() {
            if i % CHECK_INTERVAL == 0 {
                token.check()?;
            }
            let beyond = if *x < lower {
                lower - x
            } else if *x > upper {
                x - upper
            } else {
                continue;
            };
            let severity = if iqr > 0.0 { beyond / iqr } else { beyond };
            flagged.push((*row, severity));
        }
        Ok(flagged)
    }

    fn isolation(
        &self,
        values: &[(usize, f64)],
        column_index: usize,
        token: &CancellationToken,
    ) -> Result<Vec<(usize, f64)>> {
        if values.len() < self.isolation_min_samples {
            return Err(EngineError::InsufficientData {
                required: self.isolation_min_samples,
                actual: values.len(),
            });
        }
        let raw: Vec<f64> = values.iter().map(|(_, v)| *v).collect();
        let forest = IsolationForest::fit(
            &raw,
            self.isolation_trees,
            self.isolation_sample_size,
            column_seed(self.seed, column_index),
            token,
        )?;

        let mut flagged = Vec::new();
        for (i, (row, x)) in values.iter().enumerate() {
            if i % CHECK_INTERVAL == 0 {
                token.check()?;
            }
            let score = forest.score(*x);
            if score > self.isolation_threshold {
                flagged.push((*row, score));
            }
        }
        Ok(flagged)
    }
}
