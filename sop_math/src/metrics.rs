//! Forecast accuracy metrics

use crate::{MathError, Result};
use serde::{Deserialize, Serialize};

/// Mean Absolute Percentage Error.
///
/// Only positions where the actual value is non-zero contribute; the series
/// are compared up to the shorter length. Returns `0.0` when no position
/// qualifies.
pub fn mape(actual: &[f64], predicted: &[f64]) -> f64 {
    let ratios: Vec<f64> = actual
        .iter()
        .zip(predicted)
        .filter(|(&a, _)| a != 0.0)
        .map(|(&a, &p)| ((a - p) / a).abs())
        .collect();

    if ratios.is_empty() {
        return 0.0;
    }

    ratios.iter().sum::<f64>() / ratios.len() as f64 * 100.0
}

/// Symmetric Mean Absolute Percentage Error, with `0/0` terms counted as zero
pub fn smape(actual: &[f64], predicted: &[f64]) -> f64 {
    let n = actual.len().min(predicted.len());
    if n == 0 {
        return 0.0;
    }

    actual
        .iter()
        .zip(predicted)
        .map(|(&a, &f)| {
            let denom = a.abs() + f.abs();
            if denom == 0.0 {
                0.0
            } else {
                200.0 * (a - f).abs() / denom
            }
        })
        .sum::<f64>()
        / n as f64
}

/// Calculate accuracy metrics for a forecast vs actual values
pub fn forecast_accuracy(forecast: &[f64], actual: &[f64]) -> Result<ForecastAccuracy> {
    if forecast.len() != actual.len() || forecast.is_empty() {
        return Err(MathError::InvalidInput(
            "Forecast and actual values must have the same non-zero length".to_string(),
        ));
    }

    let n = forecast.len() as f64;

    let errors: Vec<f64> = forecast
        .iter()
        .zip(actual)
        .map(|(&f, &a)| a - f)
        .collect();

    let mae = errors.iter().map(|e| e.abs()).sum::<f64>() / n;
    let mse = errors.iter().map(|e| e.powi(2)).sum::<f64>() / n;

    Ok(ForecastAccuracy {
        mae,
        mse,
        rmse: mse.sqrt(),
        mape: mape(actual, forecast),
        smape: smape(actual, forecast),
    })
}

/// Forecast accuracy metrics
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastAccuracy {
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
}

impl std::fmt::Display for ForecastAccuracy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Forecast Accuracy Metrics:")?;
        writeln!(f, "  MAE:   {:.4}", self.mae)?;
        writeln!(f, "  MSE:   {:.4}", self.mse)?;
        writeln!(f, "  RMSE:  {:.4}", self.rmse)?;
        writeln!(f, "  MAPE:  {:.4}%", self.mape)?;
        writeln!(f, "  SMAPE: {:.4}%", self.smape)?;
        Ok(())
    }
}
