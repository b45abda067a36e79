//! Numeric helpers shared by the summarizer, relationship analyzer and outlier detector.
//!
//! Moments and distribution tails come from `statrs`. Quartiles use the
//! linear-interpolation definition at position `p * (n - 1)`, which is not the
//! estimator behind `statrs`' `OrderStatistics::quantile`.

use statrs::distribution::{ChiSquared, ContinuousCDF, StudentsT};
use statrs::statistics::Statistics;

/// Quantile of sorted data by linear interpolation between order statistics.
///
/// `p = 0` is the minimum and `p = 1` the maximum. Returns `None` for empty input.
pub fn quantile(sorted: &[f64], p: f64) -> Option<f64> {
    if sorted.is_empty() {
        return None;
    }
    let pos = p.clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lower = pos.floor() as usize;
    let upper = pos.ceil() as usize;
    let fraction = pos - lower as f64;
    Some(sorted[lower] + (sorted[upper] - sorted[lower]) * fraction)
}

/// Sorts a copy of `values` ascending.
pub fn sorted(values: &[f64]) -> Vec<f64> {
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    sorted
}

/// Pearson r of paired samples, clamped to [-1, 1].
///
/// `None` with fewer than two pairs, unequal lengths, or zero spread on either side.
pub fn pearson(xs: &[f64], ys: &[f64]) -> Option<f64> {
    if xs.len() < 2 || xs.len() != ys.len() {
        return None;
    }
    let sx = xs.iter().population_std_dev();
    let sy = ys.iter().population_std_dev();
    if !(sx > 0.0 && sy > 0.0) {
        return None;
    }
    let r = xs.iter().population_covariance(ys.iter()) / (sx * sy);
    r.is_finite().then(|| r.clamp(-1.0, 1.0))
}

/// Survival function of the chi-square distribution: P(X >= statistic).
pub fn chi_square_p_value(statistic: f64, degrees_of_freedom: usize) -> f64 {
    if degrees_of_freedom == 0 || statistic <= 0.0 {
        return 1.0;
    }
    ChiSquared::new(degrees_of_freedom as f64)
        .map(|dist| dist.sf(statistic))
        .unwrap_or(1.0)
        .clamp(0.0, 1.0)
}

/// Two-sided p-value of a Pearson coefficient via the t statistic with n - 2 df.
pub fn correlation_p_value(r: f64, n: usize) -> Option<f64> {
    if n < 3 {
        return None;
    }
    let df = (n - 2) as f64;
    let r2 = r * r;
    if r2 >= 1.0 {
        return Some(0.0);
    }
    let t = (r2 * df / (1.0 - r2)).sqrt();
    let dist = StudentsT::new(0.0, 1.0, df).ok()?;
    Some((2.0 * dist.sf(t)).clamp(0.0, 1.0))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f64, b: f64, tol: f64) -> bool {
        (a - b).abs() < tol
    }

    #[test]
    fn test_quantile_interpolation() {
        let data = [1.0, 2.0, 3.0, 4.0, 100.0];
        assert_eq!(quantile(&data, 0.25), Some(2.0));
        assert_eq!(quantile(&data, 0.5), Some(3.0));
        assert_eq!(quantile(&data, 0.75), Some(4.0));
        assert_eq!(quantile(&[1.0, 2.0], 0.5), Some(1.5));
        assert_eq!(quantile(&[7.0], 0.9), Some(7.0));
        assert_eq!(quantile(&[], 0.5), None);
    }

    #[test]
    fn test_pearson() {
        assert!(close(pearson(&[1.0, 2.0, 3.0], &[2.0, 4.0, 6.0]).unwrap(), 1.0, 1e-12));
        assert!(close(pearson(&[1.0, 2.0, 3.0], &[3.0, 2.0, 1.0]).unwrap(), -1.0, 1e-12));
        assert_eq!(pearson(&[1.0, 2.0], &[5.0, 5.0]), None);
        assert_eq!(pearson(&[1.0], &[5.0]), None);
    }

    #[test]
    fn test_chi_square_p_value() {
        // critical value for alpha = 0.05 with 1 df
        assert!(close(chi_square_p_value(3.841_458_820_694_124, 1), 0.05, 1e-6));
        // with 2 df the survival function is exp(-x/2)
        assert!(close(chi_square_p_value(4.0, 2), (-2.0f64).exp(), 1e-9));
        assert_eq!(chi_square_p_value(0.0, 3), 1.0);
        assert_eq!(chi_square_p_value(12.0, 0), 1.0);
    }

    #[test]
    fn test_correlation_p_value() {
        // t = 2.0 with 8 df => two-sided p ~= 0.0805
        let r = (4.0f64 / 12.0).sqrt();
        let p = correlation_p_value(r, 10).unwrap();
        assert!(close(p, 0.0805, 1e-3), "p = {p}");
        assert_eq!(correlation_p_value(1.0, 10), Some(0.0));
        assert_eq!(correlation_p_value(0.5, 2), None);
    }
}
