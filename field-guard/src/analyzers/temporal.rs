//! Classical additive seasonal decomposition of datetime-indexed numeric series.
//!
//! The series is `value = trend + seasonal + residual`. The trend is a centered
//! moving average over one period (a 2 x period average for even periods), the
//! seasonal component is the mean detrended value at each position in the cycle,
//! shifted to sum to zero, and the residual is what remains.

use chrono::{Datelike, NaiveDateTime};
use tracing::{debug, instrument};

use crate::analyzers::inference::TypedColumn;
use crate::analyzers::profile::SeasonalDecomposition;
use crate::analyzers::statistics::modal_spacing;
use crate::cancellation::CancellationToken;
use crate::config::AnalysisConfig;
use crate::error::{EngineError, Result};

const MINUTE: i64 = 60;
const HOUR: i64 = 60 * MINUTE;
const DAY: i64 = 24 * HOUR;
const WEEK: i64 = 7 * DAY;

/// Seasonal period implied by the spacing between observations.
///
/// minutely data repeats hourly (60), hourly daily (24), daily weekly (7),
/// weekly yearly (52), monthly yearly (12) and quarterly yearly (4).
pub fn seasonal_period(spacing_seconds: i64) -> Option<usize> {
    match spacing_seconds {
        MINUTE => Some(60),
        HOUR => Some(24),
        DAY => Some(7),
        WEEK => Some(52),
        s if (28 * DAY..=31 * DAY).contains(&s) => Some(12),
        s if (89 * DAY..=92 * DAY).contains(&s) => Some(4),
        _ => None,
    }
}

/// Decomposes numeric series against one datetime column.
#[derive(Debug, Clone)]
pub struct SeasonalDecomposer {
    min_periods: usize,
}

impl SeasonalDecomposer {
    pub fn new(config: &AnalysisConfig) -> Self {
        Self {
            min_periods: config.decomposition_min_periods,
        }
    }

    #[instrument(skip_all, fields(time = %time.name, value = %value.name))]
    pub fn decompose(
        &self,
        time: &TypedColumn,
        value: &TypedColumn,
        token: &CancellationToken,
    ) -> Result<SeasonalDecomposition> {
        let (Some(instants), Some(numbers)) = (time.timestamps(), value.numbers()) else {
            return Err(EngineError::internal(
                "decomposition requires a datetime and a numeric column",
            ));
        };

        let mut series: Vec<(NaiveDateTime, f64)> = Vec::new();
        let mut j = 0;
        for (row, instant) in instants {
            while j < numbers.len() && numbers[j].0 < *row {
                j += 1;
            }
            if j < numbers.len() && numbers[j].0 == *row {
                series.push((*instant, numbers[j].1));
            }
        }
        series.sort_by(|a, b| a.0.cmp(&b.0));
        token.check()?;

        let timestamps: Vec<NaiveDateTime> = series.iter().map(|(t, _)| *t).collect();
        let modal = modal_spacing(&timestamps);
        let (spacing, period) = modal
            .and_then(|s| seasonal_period(s).map(|p| (s, p)))
            .ok_or(EngineError::NoSeasonalPeriod {
                spacing_seconds: modal,
            })?;

        let required = period * self.min_periods;
        if series.len() < required {
            return Err(EngineError::InsufficientData {
                required,
                actual: series.len(),
            });
        }

        let values: Vec<f64> = series.iter().map(|(_, v)| *v).collect();
        let trend = centered_moving_average(&values, period);
        token.check()?;

        // cycle position from elapsed time, so gaps do not shift later points
        let positions: Vec<usize> = timestamps
            .iter()
            .map(|t| elapsed_steps(timestamps[0], *t, spacing).rem_euclid(period as i64) as usize)
            .collect();

        let mut sums = vec![0.0; period];
        let mut counts = vec![0usize; period];
        for ((v, t), &position) in values.iter().zip(&trend).zip(&positions) {
            if let Some(t) = t {
                sums[position] += v - t;
                counts[position] += 1;
            }
        }
        let mut indices: Vec<f64> = sums
            .iter()
            .zip(&counts)
            .map(|(s, c)| if *c > 0 { s / *c as f64 } else { 0.0 })
            .collect();
        let offset = indices.iter().sum::<f64>() / period as f64;
        for index in &mut indices {
            *index -= offset;
        }

        let seasonal: Vec<f64> = positions.iter().map(|&p| indices[p]).collect();
        let residual: Vec<Option<f64>> = values
            .iter()
            .zip(&trend)
            .zip(&seasonal)
            .map(|((v, t), s)| t.map(|t| v - t - s))
            .collect();

        let seasonal_strength = seasonal_strength(&seasonal, &residual);
        debug!(
            time = %time.name,
            value = %value.name,
            period,
            observations = values.len(),
            "Decomposed series"
        );

        Ok(SeasonalDecomposition {
            time_column: time.name.clone(),
            value_column: value.name.clone(),
            period,
            timestamps,
            trend,
            seasonal,
            residual,
            seasonal_strength,
        })
    }
}

/// Whole sampling steps from `start` to `t`.
///
/// Monthly and quarterly steps count calendar months; fixed spacings round to the
/// nearest step.
fn elapsed_steps(start: NaiveDateTime, t: NaiveDateTime, spacing: i64) -> i64 {
    if spacing >= 28 * DAY {
        let months = i64::from(t.year() - start.year()) * 12 + i64::from(t.month())
            - i64::from(start.month());
        let step = if spacing >= 89 * DAY { 3 } else { 1 };
        months.div_euclid(step)
    } else {
        ((t - start).num_seconds() + spacing / 2).div_euclid(spacing)
    }
}

/// Centered moving average over `period` points; `None` where the window is incomplete.
fn centered_moving_average(values: &[f64], period: usize) -> Vec<Option<f64>> {
    let n = values.len();
    let half = period / 2;
    let mut trend = vec![None; n];
    if n < period + (period + 1) % 2 {
        return trend;
    }
    for (i, slot) in trend.iter_mut().enumerate().take(n - half).skip(half) {
        let average = if period % 2 == 1 {
            values[i - half..=i + half].iter().sum::<f64>() / period as f64
        } else {
            // 2 x period average: half weight on both ends
            let inner: f64 = values[i - half + 1..i + half].iter().sum();
            (inner + 0.5 * (values[i - half] + values[i + half])) / period as f64
        };
        *slot = Some(average);
    }
    trend
}

fn variance(values: &[f64]) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }
    let mean = values.iter().sum::<f64>() / values.len() as f64;
    Some(values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / values.len() as f64)
}

fn seasonal_strength(seasonal: &[f64], residual: &[Option<f64>]) -> Option<f64> {
    let (resid, detrended): (Vec<f64>, Vec<f64>) = residual
        .iter()
        .zip(seasonal)
        .filter_map(|(r, s)| r.map(|r| (r, r + s)))
        .unzip();
    let var_detrended = variance(&detrended)?;
    if var_detrended <= 0.0 {
        return None;
    }
    Some((1.0 - variance(&resid)? / var_detrended).clamp(0.0, 1.0))
}
