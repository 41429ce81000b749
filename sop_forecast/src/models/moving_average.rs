//! Weighted moving average with a damped single-step trend

use crate::config::MovingAverageConfig;
use crate::data::TimeSeries;
use crate::models::{ForecastPoint, ForecastResult, ForecastStrategy};
use sop_math::stats;

/// Registry id of the moving average model
pub const MODEL_ID: &str = "moving_average";

/// Recency-weighted moving average model.
///
/// The level is the trailing average with weights `1..=window` (newest
/// heaviest). The last observed step, scaled by `trend_factor`, is added with
/// weight `step * trend_damping` for each forecast step. Bounds are
/// `interval_z` sample standard deviations of the full history.
#[derive(Debug, Clone, Default)]
pub struct MovingAverage {
    config: MovingAverageConfig,
}

impl MovingAverage {
    /// Create a moving average model from its configuration
    pub fn new(config: MovingAverageConfig) -> Self {
        Self { config }
    }

    /// Model configuration
    pub fn config(&self) -> &MovingAverageConfig {
        &self.config
    }
}

impl ForecastStrategy for MovingAverage {
    fn model_id(&self) -> &str {
        MODEL_ID
    }

    fn display_name(&self) -> &str {
        "Moving Average"
    }

    fn min_data_months(&self) -> usize {
        3
    }

    fn forecast(&self, series: &TimeSeries, horizon: usize) -> ForecastResult {
        let values = series.values();
        let cfg = &self.config;

        // A TimeSeries is never empty, so the average always exists
        let weighted_avg = stats::trailing_weighted_average(values, cfg.window)
            .unwrap_or_else(|_| series.last_value());
        let trend = stats::last_step_trend(values, cfg.trend_factor);
        let std = stats::sample_std(values).unwrap_or(weighted_avg * 0.1);
        let spread = cfg.interval_z * std;

        let points = series
            .future_periods(horizon)
            .into_iter()
            .enumerate()
            .map(|(i, period)| {
                let step = (i + 1) as f64;
                let predicted = weighted_avg + trend * step * cfg.trend_damping;
                // Interval centres on the clamped prediction so upper never drops below lower
                ForecastPoint::with_spread(period, predicted, spread, cfg.confidence)
            })
            .collect();

        ForecastResult::new(MODEL_ID, points)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use chrono::NaiveDate;

    fn series(values: &[f64]) -> TimeSeries {
        TimeSeries::from_values(NaiveDate::from_ymd_opt(2023, 1, 1).unwrap(), values).unwrap()
    }

    #[test]
    fn test_weighted_level_and_damped_trend() {
        let data = series(&[100.0, 110.0, 120.0]);
        let result = MovingAverage::default().forecast(&data, 2);

        // weighted average (1*100 + 2*110 + 3*120) / 6, trend (120 - 110) * 0.3
        let level = 680.0 / 6.0;
        assert_relative_eq!(result.points()[0].predicted_qty, crate::utils::round2(level + 1.5));
        assert_relative_eq!(result.points()[1].predicted_qty, crate::utils::round2(level + 3.0));
        assert_eq!(result.model_id(), MODEL_ID);
    }

    #[test]
    fn test_bounds_use_sample_std() {
        let data = series(&[100.0, 110.0, 120.0]);
        let forecast = MovingAverage::default().forecast(&data, 1);
        let point = &forecast.points()[0];

        // sample std of the history is 10
        assert_relative_eq!(point.upper_bound - point.predicted_qty, 19.6, epsilon = 0.011);
        assert_relative_eq!(point.predicted_qty - point.lower_bound, 19.6, epsilon = 0.011);
        assert_eq!(point.confidence, 80.0);
    }

    #[test]
    fn test_single_point_uses_relative_spread() {
        let data = series(&[50.0]);
        let forecast = MovingAverage::default().forecast(&data, 1);
        let point = &forecast.points()[0];

        assert_eq!(point.predicted_qty, 50.0);
        // spread is 1.96 * 10% of the level
        assert_relative_eq!(point.upper_bound, 59.8);
        assert_relative_eq!(point.lower_bound, 40.2);
    }

    #[test]
    fn test_falling_series_is_clamped_at_zero() {
        let data = series(&[500.0, 400.0, 10.0, 0.0]);
        let result = MovingAverage::default().forecast(&data, 12);

        assert_eq!(result.horizons(), 12);
        for point in result.points() {
            assert!(point.predicted_qty >= 0.0);
            assert!(point.lower_bound >= 0.0);
            assert!(point.upper_bound >= point.lower_bound);
        }
    }

    #[test]
    fn test_interval_centres_on_clamped_prediction() {
        // Level 1000/3 with trend -300 goes negative from the third month
        let result = MovingAverage::default().forecast(&series(&[1000.0, 0.0]), 3);
        let point = &result.points()[2];
        let spread = 1.96 * 500_000f64.sqrt();

        assert_eq!(point.predicted_qty, 0.0);
        assert_eq!(point.lower_bound, 0.0);
        assert_relative_eq!(point.upper_bound, spread, epsilon = 0.01);
    }

    #[test]
    fn test_zero_horizon_is_empty() {
        let result = MovingAverage::default().forecast(&series(&[1.0, 2.0]), 0);
        assert_eq!(result.horizons(), 0);
    }
}
