//! Metrics for evaluating forecast performance

use crate::data::TimeSeries;
use crate::error::{ForecastError, Result};
use crate::models::{ForecastStrategy, MovingAverage};
use serde::{Deserialize, Serialize};
use sop_math::metrics::{forecast_accuracy, mape};

/// Evaluate forecast accuracy against actual values
pub fn evaluate_forecast(forecast: &[f64], actual: &[f64]) -> Result<ForecastMetrics> {
    if forecast.len() != actual.len() || forecast.is_empty() {
        return Err(ForecastError::InvalidParameter(
            "Forecast and actual values must have the same non-zero length".to_string(),
        ));
    }

    let accuracy = forecast_accuracy(forecast, actual)?;

    // Only steps where both series actually move count towards direction accuracy
    let moves: Vec<bool> = forecast
        .windows(2)
        .zip(actual.windows(2))
        .filter(|(f, a)| (f[1] - f[0]).abs() > 1e-10 && (a[1] - a[0]).abs() > 1e-10)
        .map(|(f, a)| (f[1] > f[0]) == (a[1] > a[0]))
        .collect();

    let direction_accuracy = if moves.is_empty() {
        0.0
    } else {
        moves.iter().filter(|&&correct| correct).count() as f64 / moves.len() as f64 * 100.0
    };

    Ok(ForecastMetrics {
        mae: accuracy.mae,
        mse: accuracy.mse,
        rmse: accuracy.rmse,
        mape: accuracy.mape,
        smape: accuracy.smape,
        direction_accuracy,
    })
}

/// Holdout MAPE of `model`: fit on all but the last `holdout` points and
/// compare its forecast of those points with what was observed.
///
/// Returns `None` when the series has fewer than `min_points` observations
/// or leaves nothing to train on.
pub fn backtest_mape_with(
    model: &dyn ForecastStrategy,
    series: &TimeSeries,
    holdout: usize,
    min_points: usize,
) -> Option<f64> {
    if holdout == 0 || series.len() < min_points.max(holdout + 1) {
        return None;
    }

    let train = series.head(series.len() - holdout)?;
    let actual = &series.values()[series.len() - holdout..];
    let predicted = model.forecast(&train, holdout).values();

    Some(mape(actual, &predicted))
}

/// Holdout MAPE of the default moving average
pub fn backtest_mape(series: &TimeSeries, holdout: usize, min_points: usize) -> Option<f64> {
    backtest_mape_with(&MovingAverage::default(), series, holdout, min_points)
}

/// Forecast evaluation metrics
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastMetrics {
    /// Mean Absolute Error
    pub mae: f64,
    /// Mean Squared Error
    pub mse: f64,
    /// Root Mean Squared Error
    pub rmse: f64,
    /// Mean Absolute Percentage Error
    pub mape: f64,
    /// Symmetric Mean Absolute Percentage Error
    pub smape: f64,
    /// Share of period-over-period moves predicted in the right direction
    pub direction_accuracy: f64,
}

impl std::fmt::Display for ForecastMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Forecast Metrics:")?;
        writeln!(f, "  MAE:                {:.4}", self.mae)?;
        writeln!(f, "  MSE:                {:.4}", self.mse)?;
        writeln!(f, "  RMSE:               {:.4}", self.rmse)?;
        writeln!(f, "  MAPE:               {:.4}%", self.mape)?;
        writeln!(f, "  SMAPE:              {:.4}%", self.smape)?;
        writeln!(f, "  Direction Accuracy: {:.2}%", self.direction_accuracy)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use chrono::NaiveDate;

    #[test]
    fn test_evaluate_forecast() {
        let metrics = evaluate_forecast(&[110.0, 120.0, 115.0], &[100.0, 125.0, 110.0]).unwrap();

        assert_relative_eq!(metrics.mae, 20.0 / 3.0, epsilon = 1e-10);
        assert_relative_eq!(metrics.direction_accuracy, 100.0);
        assert!(metrics.to_string().contains("Direction Accuracy"));
    }

    #[test]
    fn test_evaluate_forecast_rejects_mismatched_lengths() {
        assert!(evaluate_forecast(&[1.0], &[1.0, 2.0]).is_err());
        assert!(evaluate_forecast(&[], &[]).is_err());
    }

    #[test]
    fn test_backtest_mape() {
        let start = NaiveDate::from_ymd_opt(2023, 1, 1).unwrap();
        let series = TimeSeries::from_values(start, &[100.0; 8]).unwrap();
        assert_eq!(backtest_mape(&series, 3, 6), Some(0.0));

        let short = TimeSeries::from_values(start, &[100.0; 5]).unwrap();
        assert_eq!(backtest_mape(&short, 3, 6), None);
    }

    #[test]
    fn test_backtest_compares_last_points() {
        let start = NaiveDate::from_ymd_opt(2023, 1, 1).unwrap();
        let series =
            TimeSeries::from_values(start, &[100.0, 100.0, 100.0, 200.0, 200.0, 200.0]).unwrap();

        // A flat training window predicts 100 for every held-out month
        assert_relative_eq!(backtest_mape(&series, 3, 6).unwrap(), 50.0);
    }
}
