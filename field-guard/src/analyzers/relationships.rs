//! Pairwise relationship statistics.
//!
//! Numeric pairs get a Pearson coefficient, pairs of categorical or boolean
//! columns a chi-square test of independence. Each unordered pair is computed once,
//! in `(earlier column, later column)` order.

use std::collections::HashMap;

use tracing::{debug, instrument};

use crate::analyzers::inference::{SemanticType, TypedColumn};
use crate::analyzers::math::{chi_square_p_value, correlation_p_value, pearson};
use crate::analyzers::profile::{RelationshipEdge, RelationshipKind};
use crate::cancellation::{CancellationToken, CHECK_INTERVAL};
use crate::config::AnalysisConfig;
use crate::error::{EngineError, Result};

/// Expected cell count below which the chi-square approximation is flagged.
const MIN_EXPECTED_COUNT: f64 = 5.0;

/// A pair of columns (by dataset position) and the statistic to compute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RelationshipPair {
    pub a: usize,
    pub b: usize,
    pub kind: RelationshipKind,
}

/// Lists every pair that has a defined statistic, `a < b`.
pub fn plan_pairs(types: &[SemanticType]) -> Vec<RelationshipPair> {
    let mut pairs = Vec::new();
    for a in 0..types.len() {
        for b in (a + 1)..types.len() {
            let kind = match (types[a], types[b]) {
                (SemanticType::Numeric, SemanticType::Numeric) => RelationshipKind::PearsonCorrelation,
                (ta, tb) if ta.is_label() && tb.is_label() => RelationshipKind::ChiSquare,
                _ => continue,
            };
            pairs.push(RelationshipPair { a, b, kind });
        }
    }
    pairs
}

/// Joins two row-ordered value lists on row index.
fn join_rows<'a, X, Y>(
    xs: &'a [(usize, X)],
    ys: &'a [(usize, Y)],
    token: &CancellationToken,
) -> Result<Vec<(&'a X, &'a Y)>> {
    let mut joined = Vec::new();
    let (mut i, mut j) = (0, 0);
    while i < xs.len() && j < ys.len() {
        if (i + j) % CHECK_INTERVAL == 0 {
            token.check()?;
        }
        match xs[i].0.cmp(&ys[j].0) {
            std::cmp::Ordering::Less => i += 1,
            std::cmp::Ordering::Greater => j += 1,
            std::cmp::Ordering::Equal => {
                joined.push((&xs[i].1, &ys[j].1));
                i += 1;
                j += 1;
            }
        }
    }
    Ok(joined)
}

/// Computes relationship edges under one configuration.
#[derive(Debug, Clone)]
pub struct RelationshipAnalyzer {
    min_samples: usize,
    significance_level: f64,
}

impl RelationshipAnalyzer {
    pub fn new(config: &AnalysisConfig) -> Self {
        Self {
            min_samples: config.min_correlation_samples,
            significance_level: config.significance_level,
        }
    }

    pub fn analyze(
        &self,
        kind: RelationshipKind,
        a: &TypedColumn,
        b: &TypedColumn,
        token: &CancellationToken,
    ) -> Result<RelationshipEdge> {
        match kind {
            RelationshipKind::PearsonCorrelation => self.pearson(a, b, token),
            RelationshipKind::ChiSquare => self.chi_square(a, b, token),
        }
    }

    /// Pearson correlation over rows where both columns hold a number.
    #[instrument(skip_all, fields(a = %a.name, b = %b.name))]
    pub fn pearson(
        &self,
        a: &TypedColumn,
        b: &TypedColumn,
        token: &CancellationToken,
    ) -> Result<RelationshipEdge> {
        let (Some(xs), Some(ys)) = (a.numbers(), b.numbers()) else {
            return Err(EngineError::internal("pearson requires two numeric columns"));
        };
        let joined = join_rows(xs, ys, token)?;
        if joined.len() < self.min_samples {
            return Err(EngineError::InsufficientData {
                required: self.min_samples,
                actual: joined.len(),
            });
        }

        let (x, y): (Vec<f64>, Vec<f64>) = joined.iter().map(|(x, y)| (**x, **y)).unzip();
        let n = x.len();
        let r = pearson(&x, &y).ok_or_else(|| {
            let x_constant = x.iter().all(|v| *v == x[0]);
            EngineError::ZeroVariance {
                column: if x_constant { a.name.clone() } else { b.name.clone() },
            }
        })?;
        let p_value = correlation_p_value(r, n);

        debug!(a = %a.name, b = %b.name, r, n, "Computed Pearson correlation");
        Ok(RelationshipEdge {
            column_a: a.name.clone(),
            column_b: b.name.clone(),
            kind: RelationshipKind::PearsonCorrelation,
            value: r,
            p_value,
            significant: p_value.is_some_and(|p| p < self.significance_level),
            sample_size: n,
            degrees_of_freedom: Some(n.saturating_sub(2)),
            association_strength: None,
            low_expected_count: false,
        })
    }

    /// Chi-square test of independence over rows where both columns hold a label.
    #[instrument(skip_all, fields(a = %a.name, b = %b.name))]
    pub fn chi_square(
        &self,
        a: &TypedColumn,
        b: &TypedColumn,
        token: &CancellationToken,
    ) -> Result<RelationshipEdge> {
        let (Some(xs), Some(ys)) = (a.labels(), b.labels()) else {
            return Err(EngineError::internal("chi-square requires two label columns"));
        };
        let joined = join_rows(xs, ys, token)?;

        let mut rows: HashMap<&str, usize> = HashMap::new();
        let mut cols: HashMap<&str, usize> = HashMap::new();
        let mut cells: HashMap<(usize, usize), usize> = HashMap::new();
        for (x, y) in &joined {
            let next_row = rows.len();
            let r = *rows.entry(x.as_str()).or_insert(next_row);
            let next_col = cols.len();
            let c = *cols.entry(y.as_str()).or_insert(next_col);
            *cells.entry((r, c)).or_insert(0) += 1;
        }

        let (r, c) = (rows.len(), cols.len());
        if r < 2 || c < 2 {
            return Err(EngineError::InsufficientData {
                required: 2,
                actual: r.min(c),
            });
        }
        token.check()?;

        let n = joined.len() as f64;
        let mut row_totals = vec![0usize; r];
        let mut col_totals = vec![0usize; c];
        for (&(i, j), &count) in &cells {
            row_totals[i] += count;
            col_totals[j] += count;
        }

        let mut statistic = 0.0;
        let mut low_expected_count = false;
        for (i, row_total) in row_totals.iter().enumerate() {
            for (j, col_total) in col_totals.iter().enumerate() {
                let expected = *row_total as f64 * *col_total as f64 / n;
                if expected < MIN_EXPECTED_COUNT {
                    low_expected_count = true;
                }
                let observed = cells.get(&(i, j)).copied().unwrap_or(0) as f64;
                statistic += (observed - expected).powi(2) / expected;
            }
        }
        let statistic = statistic.max(0.0);
        let df = (r - 1) * (c - 1);
        let p_value = chi_square_p_value(statistic, df);
        let cramers_v = (statistic / (n * (r.min(c) - 1) as f64)).sqrt().clamp(0.0, 1.0);

        debug!(
            a = %a.name,
            b = %b.name,
            statistic,
            p_value,
            cramers_v,
            "Computed chi-square test"
        );
        Ok(RelationshipEdge {
            column_a: a.name.clone(),
            column_b: b.name.clone(),
            kind: RelationshipKind::ChiSquare,
            value: statistic,
            p_value: Some(p_value),
            significant: p_value < self.significance_level,
            sample_size: joined.len(),
            degrees_of_freedom: Some(df),
            association_strength: Some(cramers_v),
            low_expected_count,
        })
    }
}
