//! Descriptive statistics over demand series
//!
//! Contains the summary statistics the forecasting strategies and anomaly
//! detectors are built from:
//! - Mean, population and sample standard deviation
//! - Linearly weighted (recency-biased) average
//! - Single-step trend
//! - Percentiles with linear interpolation

use crate::{MathError, Result};

/// Arithmetic mean of a series
pub fn mean(values: &[f64]) -> Result<f64> {
    if values.is_empty() {
        return Err(MathError::InsufficientData(
            "Cannot calculate mean of an empty series".to_string(),
        ));
    }

    Ok(values.iter().sum::<f64>() / values.len() as f64)
}

/// Population variance (divides by `n`)
pub fn population_variance(values: &[f64]) -> Result<f64> {
    let mean = mean(values)?;

    let variance = values
        .iter()
        .map(|&value| {
            let diff = value - mean;
            diff * diff
        })
        .sum::<f64>()
        / values.len() as f64;

    Ok(variance)
}

/// Population standard deviation (divides by `n`)
pub fn population_std(values: &[f64]) -> Result<f64> {
    Ok(population_variance(values)?.sqrt())
}

/// Sample standard deviation (divides by `n - 1`)
pub fn sample_std(values: &[f64]) -> Result<f64> {
    if values.len() < 2 {
        return Err(MathError::InsufficientData(format!(
            "Not enough data to calculate sample standard deviation. Need 2 values, have {}.",
            values.len()
        )));
    }

    let mean = mean(values)?;
    let sum_sq = values.iter().map(|&v| (v - mean).powi(2)).sum::<f64>();

    Ok((sum_sq / (values.len() - 1) as f64).sqrt())
}

/// Weighted average with explicit weights
pub fn weighted_average(values: &[f64], weights: &[f64]) -> Result<f64> {
    if values.len() != weights.len() {
        return Err(MathError::InvalidInput(format!(
            "Values length ({}) doesn't match weights length ({})",
            values.len(),
            weights.len()
        )));
    }

    let total_weight: f64 = weights.iter().sum();
    if values.is_empty() || total_weight.abs() < f64::EPSILON {
        return Err(MathError::CalculationError(
            "Weights must sum to a non-zero value".to_string(),
        ));
    }

    let weighted_sum: f64 = values.iter().zip(weights).map(|(v, w)| v * w).sum();

    Ok(weighted_sum / total_weight)
}

/// Recency-weighted average of the trailing `window` values.
///
/// Weights run `1..=window` from the oldest to the newest value in the
/// window, so the latest observation counts the most. The window shrinks to
/// the series length when the series is shorter.
pub fn trailing_weighted_average(values: &[f64], window: usize) -> Result<f64> {
    if values.is_empty() {
        return Err(MathError::InsufficientData(
            "Cannot average an empty series".to_string(),
        ));
    }

    let window = window.clamp(1, values.len());
    let recent = &values[values.len() - window..];
    let weights: Vec<f64> = (1..=window).map(|w| w as f64).collect();

    weighted_average(recent, &weights)
}

/// Difference between the last two values scaled by `factor`, or `0.0` with
/// fewer than two values.
pub fn last_step_trend(values: &[f64], factor: f64) -> f64 {
    match values {
        [.., previous, last] => (last - previous) * factor,
        _ => 0.0,
    }
}

/// Percentile using linear interpolation between closest ranks.
///
/// `q` is expressed in percent (`25.0` for the first quartile).
pub fn percentile(values: &[f64], q: f64) -> Result<f64> {
    if values.is_empty() {
        return Err(MathError::InsufficientData(
            "Cannot calculate percentile of an empty series".to_string(),
        ));
    }
    if !(0.0..=100.0).contains(&q) {
        return Err(MathError::InvalidInput(format!(
            "Percentile must be within [0, 100], got {}",
            q
        )));
    }

    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

    let rank = q / 100.0 * (sorted.len() - 1) as f64;
    let lower = rank.floor() as usize;
    let upper = rank.ceil() as usize;
    let fraction = rank - lower as f64;

    Ok(sorted[lower] + (sorted[upper] - sorted[lower]) * fraction)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rstest::rstest;

    #[test]
    fn test_population_and_sample_std() {
        let values = [10.0, 20.0, 30.0];

        // sqrt(200 / 3) and sqrt(200 / 2)
        assert_relative_eq!(population_std(&values).unwrap(), (200.0f64 / 3.0).sqrt());
        assert_relative_eq!(sample_std(&values).unwrap(), 10.0);
        assert!(sample_std(&[5.0]).is_err());
    }

    #[test]
    fn test_trailing_weighted_average_favours_recent_values() {
        // (1*10 + 2*20 + 3*30) / 6
        let avg = trailing_weighted_average(&[999.0, 10.0, 20.0, 30.0], 3).unwrap();
        assert_relative_eq!(avg, 140.0 / 6.0);

        // window shrinks to the series length
        let short = trailing_weighted_average(&[10.0, 20.0], 6).unwrap();
        assert_relative_eq!(short, 50.0 / 3.0);
    }

    #[test]
    fn test_last_step_trend() {
        assert_relative_eq!(last_step_trend(&[100.0, 110.0], 0.3), 3.0);
        assert_eq!(last_step_trend(&[100.0], 0.3), 0.0);
        assert_eq!(last_step_trend(&[], 0.3), 0.0);
    }

    #[rstest]
    #[case(0.0, 1.0)]
    #[case(25.0, 1.75)]
    #[case(50.0, 2.5)]
    #[case(75.0, 3.25)]
    #[case(100.0, 4.0)]
    fn test_percentile_interpolates(#[case] q: f64, #[case] expected: f64) {
        // input order does not matter
        assert_relative_eq!(percentile(&[3.0, 1.0, 4.0, 2.0], q).unwrap(), expected);
    }

    #[rstest]
    #[case(&[1.0, 2.0], -1.0)]
    #[case(&[1.0, 2.0], 101.0)]
    #[case(&[], 50.0)]
    fn test_percentile_rejects_bad_input(#[case] values: &[f64], #[case] q: f64) {
        assert!(percentile(values, q).is_err());
    }
}
