//! Forecasting strategies for monthly demand series
//!
//! Every strategy turns a [`TimeSeries`] and a horizon into exactly `horizon`
//! dated [`ForecastPoint`]s. Richer strategies delegate to simpler ones when
//! the history is too short or their fit fails, in the fixed order
//! prophet -> exponential smoothing -> moving average, so `forecast` itself
//! never fails.

use crate::data::TimeSeries;
use crate::error::{ForecastError, Result};
use crate::utils::round2;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sop_math::MathError;
use std::fmt::Debug;
use thiserror::Error;

pub mod exponential_smoothing;
pub mod moving_average;
pub mod prophet;

pub use exponential_smoothing::ExponentialSmoothing;
pub use moving_average::MovingAverage;
pub use prophet::Prophet;

/// One forecast period
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastPoint {
    pub period: NaiveDate,
    pub predicted_qty: f64,
    pub lower_bound: f64,
    pub upper_bound: f64,
    /// Nominal confidence of the producing model, in percent
    pub confidence: f64,
    /// Backtest MAPE of the run, when one could be computed
    pub mape: Option<f64>,
}

impl ForecastPoint {
    /// Create a point from explicit bounds.
    ///
    /// All quantities are clamped at zero and rounded to two decimals; the
    /// upper bound never falls below the lower one.
    pub fn new(
        period: NaiveDate,
        predicted_qty: f64,
        lower_bound: f64,
        upper_bound: f64,
        confidence: f64,
    ) -> Self {
        let lower_bound = round2(lower_bound.max(0.0));

        Self {
            period,
            predicted_qty: round2(predicted_qty.max(0.0)),
            lower_bound,
            upper_bound: round2(upper_bound.max(0.0)).max(lower_bound),
            confidence,
            mape: None,
        }
    }

    /// Create a point with a symmetric interval of half-width `spread`
    /// around the zero-clamped prediction
    pub fn with_spread(period: NaiveDate, predicted_qty: f64, spread: f64, confidence: f64) -> Self {
        let predicted = predicted_qty.max(0.0);
        Self::new(period, predicted, predicted - spread, predicted + spread, confidence)
    }
}

/// Points produced by one forecast run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastResult {
    /// Model that actually produced the points, after any fallback
    model_id: String,
    points: Vec<ForecastPoint>,
}

impl ForecastResult {
    /// Create a new forecast result
    pub fn new(model_id: impl Into<String>, points: Vec<ForecastPoint>) -> Self {
        Self {
            model_id: model_id.into(),
            points,
        }
    }

    /// Id of the model that produced the points
    pub fn model_id(&self) -> &str {
        &self.model_id
    }

    /// Get the forecast points
    pub fn points(&self) -> &[ForecastPoint] {
        &self.points
    }

    /// Take ownership of the points
    pub fn into_points(self) -> Vec<ForecastPoint> {
        self.points
    }

    /// Get the number of periods forecasted
    pub fn horizons(&self) -> usize {
        self.points.len()
    }

    /// Get the predicted quantities
    pub fn values(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.predicted_qty).collect()
    }

    /// Stamp a run-level MAPE onto every point
    pub fn with_mape(mut self, mape: Option<f64>) -> Self {
        let mape = mape.map(|m| (m * 10_000.0).round() / 10_000.0);
        for point in &mut self.points {
            point.mape = mape;
        }
        self
    }

    /// Calculate mean absolute error between forecast and actual values
    pub fn mean_absolute_error(&self, actual: &[f64]) -> Result<f64> {
        if self.points.len() != actual.len() || actual.is_empty() {
            return Err(ForecastError::InvalidParameter(format!(
                "Forecast length ({}) doesn't match actual length ({})",
                self.points.len(),
                actual.len()
            )));
        }

        let sum: f64 = self
            .points
            .iter()
            .zip(actual)
            .map(|(p, a)| (p.predicted_qty - a).abs())
            .sum();

        Ok(sum / actual.len() as f64)
    }

    /// Serialize to a JSON document
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Interchangeable forecasting algorithm.
///
/// Implementations are stateless and may be shared across threads.
pub trait ForecastStrategy: Debug + Send + Sync {
    /// Unique identifier used by the registry
    fn model_id(&self) -> &str;

    /// Human-readable name
    fn display_name(&self) -> &str;

    /// Months of history this model is designed for
    fn min_data_months(&self) -> usize;

    /// Forecast `horizon` consecutive months after the last observation.
    ///
    /// Returns exactly `horizon` points unless the periods would run past
    /// the last month `NaiveDate` can represent; callers bound the horizon
    /// (the service accepts `1..=max_horizon`).
    fn forecast(&self, series: &TimeSeries, horizon: usize) -> ForecastResult;
}

/// Reasons a model could not be fitted; recovered by falling back
#[derive(Debug, Error)]
pub(crate) enum FitError {
    #[error("needs {required} points, got {available}")]
    TooShort { required: usize, available: usize },

    #[error("numerical failure: {0}")]
    Numerical(String),

    #[error(transparent)]
    Math(#[from] MathError),
}

/// Reject non-finite model output before it becomes a forecast
pub(crate) fn ensure_finite(label: &str, values: &[f64]) -> std::result::Result<(), FitError> {
    match values.iter().position(|v| !v.is_finite()) {
        Some(index) => Err(FitError::Numerical(format!(
            "{} is not finite at step {}",
            label,
            index + 1
        ))),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, 1).unwrap()
    }

    #[test]
    fn test_point_clamps_and_rounds() {
        let point = ForecastPoint::with_spread(date(2024, 1), 10.004, 20.0, 80.0);
        assert_eq!(point.predicted_qty, 10.0);
        assert_eq!(point.lower_bound, 0.0);
        assert_eq!(point.upper_bound, 30.0);

        let negative = ForecastPoint::with_spread(date(2024, 1), -5.0, 1.0, 80.0);
        assert_eq!(negative.predicted_qty, 0.0);
        assert_eq!(negative.lower_bound, 0.0);
        assert_eq!(negative.upper_bound, 1.0);
    }

    #[test]
    fn test_upper_never_below_lower() {
        let point = ForecastPoint::new(date(2024, 1), 5.0, 4.0, 3.0, 95.0);
        assert!(point.upper_bound >= point.lower_bound);
    }

    #[test]
    fn test_result_operations() {
        let points = vec![
            ForecastPoint::with_spread(date(2024, 1), 105.0, 1.0, 80.0),
            ForecastPoint::with_spread(date(2024, 2), 106.0, 1.0, 80.0),
            ForecastPoint::with_spread(date(2024, 3), 107.0, 1.0, 80.0),
        ];
        let result = ForecastResult::new("moving_average", points).with_mape(Some(4.123456));

        assert_eq!(result.horizons(), 3);
        assert_eq!(result.values(), vec![105.0, 106.0, 107.0]);
        assert!(result.points().iter().all(|p| p.mape == Some(4.1235)));

        let error = result.mean_absolute_error(&[106.0, 107.0, 108.0]).unwrap();
        assert!((error - 1.0).abs() < 1e-12);
        assert!(result.mean_absolute_error(&[1.0]).is_err());

        let json = result.to_json().unwrap();
        assert!(json.contains("\"model_id\":\"moving_average\""));
        assert!(json.contains("\"period\":\"2024-01-01\""));
    }

    #[test]
    fn test_ensure_finite() {
        assert!(ensure_finite("forecast", &[1.0, 2.0]).is_ok());
        assert!(ensure_finite("forecast", &[1.0, f64::NAN]).is_err());
    }
}
