//! Damped-trend exponential smoothing for time series forecasting
//!
//! Additive damped trend, with additive seasonality once the history covers
//! two full seasons:
//! - Level: `l_t = α(y_t - s_{t-m}) + (1-α)(l_{t-1} + φ b_{t-1})`
//! - Trend: `b_t = β(l_t - l_{t-1}) + (1-β) φ b_{t-1}`
//! - Season: `s_t = γ(y_t - l_t) + (1-γ) s_{t-m}`
//! - Forecast: `ŷ_{T+h} = l_T + (φ + … + φ^h) b_T + s_{T+h-m}`
//!
//! Smoothing parameters are chosen by minimising the in-sample one-step SSE.

use crate::config::{ExpSmoothingConfig, MovingAverageConfig};
use crate::data::TimeSeries;
use crate::models::moving_average::MovingAverage;
use crate::models::{ensure_finite, FitError, ForecastPoint, ForecastResult, ForecastStrategy};
use sop_math::optimization::{nelder_mead, NelderMeadConfig};
use sop_math::stats;
use tracing::{debug, warn};

/// Registry id of the exponential smoothing model
pub const MODEL_ID: &str = "exp_smoothing";

const PARAM_BOUNDS: (f64, f64) = (1e-4, 0.9999);

/// Exponential smoothing model with automatic parameter estimation
#[derive(Debug, Clone, Default)]
pub struct ExponentialSmoothing {
    config: ExpSmoothingConfig,
    fallback: MovingAverage,
}

/// Smoothing parameters
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct Params {
    alpha: f64,
    beta: f64,
    phi: f64,
    gamma: f64,
}

/// Fitted model state
#[derive(Debug, Clone)]
pub(crate) struct FittedSmoothing {
    params: Params,
    level: f64,
    trend: f64,
    /// Seasonal indices for the next `m` periods, oldest first
    seasonals: Option<Vec<f64>>,
    residuals: Vec<f64>,
}

impl FittedSmoothing {
    /// Point forecasts for `horizon` steps
    fn forecast(&self, horizon: usize) -> Vec<f64> {
        let mut damped_sum = 0.0;
        let mut phi_power = 1.0;

        (0..horizon)
            .map(|h| {
                phi_power *= self.params.phi;
                damped_sum += phi_power;
                let seasonal = self
                    .seasonals
                    .as_ref()
                    .map_or(0.0, |s| s[h % s.len()]);
                self.level + damped_sum * self.trend + seasonal
            })
            .collect()
    }

    /// Population standard deviation of the in-sample residuals
    fn residual_std(&self) -> f64 {
        stats::population_std(&self.residuals).unwrap_or(0.0)
    }
}

impl ExponentialSmoothing {
    /// Create an exponential smoothing model; `fallback` configures the
    /// moving average used for short or unfittable histories
    pub fn new(config: ExpSmoothingConfig, fallback: MovingAverageConfig) -> Self {
        Self {
            config,
            fallback: MovingAverage::new(fallback),
        }
    }

    /// Model configuration
    pub fn config(&self) -> &ExpSmoothingConfig {
        &self.config
    }

    /// Fit the model, choosing seasonality from the history length
    pub(crate) fn fit(&self, values: &[f64]) -> Result<FittedSmoothing, FitError> {
        let n = values.len();
        if n < self.config.min_points.max(3) {
            return Err(FitError::TooShort {
                required: self.config.min_points.max(3),
                available: n,
            });
        }

        // Seasonal initialisation needs two full seasons
        let m = self.config.seasonal_period;
        let period = Some(m).filter(|&m| m >= 2 && n >= self.config.seasonal_min_points.max(2 * m));

        let (phi_lo, phi_hi) = self.config.damping_bounds;
        let mut initial = vec![0.5, 0.1, (phi_lo + phi_hi) / 2.0];
        let mut bounds = vec![PARAM_BOUNDS, PARAM_BOUNDS, (phi_lo, phi_hi)];
        if period.is_some() {
            initial.push(0.1);
            bounds.push(PARAM_BOUNDS);
        }

        let objective = |x: &[f64]| match run_filter(values, to_params(x), period) {
            Ok(state) => state.residuals.iter().map(|r| r * r).sum::<f64>(),
            Err(_) => f64::INFINITY,
        };

        let nm_config = NelderMeadConfig {
            max_iter: self.config.max_iterations,
            ..NelderMeadConfig::default()
        };
        let optimum = nelder_mead(objective, &initial, &bounds, &nm_config);
        if !optimum.optimal_value.is_finite() {
            return Err(FitError::Numerical(
                "sum of squared errors did not converge to a finite value".to_string(),
            ));
        }

        let fitted = run_filter(values, to_params(&optimum.optimal_point), period)?;
        debug!(
            alpha = fitted.params.alpha,
            beta = fitted.params.beta,
            phi = fitted.params.phi,
            gamma = fitted.params.gamma,
            seasonal = period.is_some(),
            converged = optimum.converged,
            "Exponential smoothing fitted"
        );

        Ok(fitted)
    }

    fn try_forecast(
        &self,
        series: &TimeSeries,
        horizon: usize,
    ) -> Result<ForecastResult, FitError> {
        let fitted = self.fit(series.values())?;
        let forecasts = fitted.forecast(horizon);
        ensure_finite("exponential smoothing forecast", &forecasts)?;

        let std = fitted.residual_std();
        let spread = self.config.interval_z * std;
        ensure_finite("residual spread", &[spread])?;

        let points = series
            .future_periods(horizon)
            .into_iter()
            .zip(forecasts)
            .map(|(period, value)| {
                ForecastPoint::with_spread(period, value, spread, self.config.confidence)
            })
            .collect();

        Ok(ForecastResult::new(MODEL_ID, points))
    }
}

impl ForecastStrategy for ExponentialSmoothing {
    fn model_id(&self) -> &str {
        MODEL_ID
    }

    fn display_name(&self) -> &str {
        "Exponential Smoothing (Holt-Winters)"
    }

    fn min_data_months(&self) -> usize {
        12
    }

    fn forecast(&self, series: &TimeSeries, horizon: usize) -> ForecastResult {
        if series.len() < self.config.min_points {
            debug!(
                points = series.len(),
                required = self.config.min_points,
                "History too short for exponential smoothing, using moving average"
            );
            return self.fallback.forecast(series, horizon);
        }

        match self.try_forecast(series, horizon) {
            Ok(result) => result,
            Err(e) => {
                warn!(
                    model = MODEL_ID,
                    fallback = self.fallback.model_id(),
                    error = %e,
                    "Model fitting failed, falling back"
                );
                self.fallback.forecast(series, horizon)
            }
        }
    }
}

fn to_params(x: &[f64]) -> Params {
    Params {
        alpha: x[0],
        beta: x[1],
        phi: x[2],
        gamma: x.get(3).copied().unwrap_or(0.0),
    }
}

/// Initial level, trend and seasonal indices
fn initial_state(values: &[f64], period: Option<usize>) -> (f64, f64, Option<Vec<f64>>, usize) {
    match period {
        Some(m) => {
            let first = values[..m].iter().sum::<f64>() / m as f64;
            let second = values[m..2 * m].iter().sum::<f64>() / m as f64;
            let trend = (second - first) / m as f64;

            let mut seasonals: Vec<f64> = values[..m].iter().map(|y| y - first).collect();
            let offset = seasonals.iter().sum::<f64>() / m as f64;
            seasonals.iter_mut().for_each(|s| *s -= offset);

            // The level is placed at the end of the first season
            let level = first + trend * (m as f64 - 1.0) / 2.0;
            (level, trend, Some(seasonals), m)
        }
        None => (values[0], values[1] - values[0], None, 1),
    }
}

/// Run the smoothing recursions, collecting one-step-ahead residuals
fn run_filter(
    values: &[f64],
    params: Params,
    period: Option<usize>,
) -> Result<FittedSmoothing, FitError> {
    let Params {
        alpha,
        beta,
        phi,
        gamma,
    } = params;
    let (mut level, mut trend, mut seasonals, start) = initial_state(values, period);
    let mut residuals = Vec::with_capacity(values.len() - start);

    for (t, &y) in values.iter().enumerate().skip(start) {
        let season_idx = period.map(|m| t % m);
        let seasonal = match (&seasonals, season_idx) {
            (Some(s), Some(i)) => s[i],
            _ => 0.0,
        };

        let residual = y - (level + phi * trend + seasonal);
        residuals.push(residual);

        let previous_level = level;
        level = alpha * (y - seasonal) + (1.0 - alpha) * (level + phi * trend);
        trend = beta * (level - previous_level) + (1.0 - beta) * phi * trend;
        if let (Some(s), Some(i)) = (seasonals.as_mut(), season_idx) {
            s[i] = gamma * (y - level) + (1.0 - gamma) * s[i];
        }

        if !level.is_finite() || !trend.is_finite() || !residual.is_finite() {
            return Err(FitError::Numerical(format!(
                "smoothing state diverged at observation {}",
                t
            )));
        }
    }

    // Rotate seasonals so index 0 is the first forecast period
    let seasonals = seasonals.map(|mut s| {
        let m = s.len();
        s.rotate_left(values.len() % m);
        s
    });

    Ok(FittedSmoothing {
        params,
        level,
        trend,
        seasonals,
        residuals,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn series(values: &[f64]) -> TimeSeries {
        TimeSeries::from_values(NaiveDate::from_ymd_opt(2022, 1, 1).unwrap(), values).unwrap()
    }

    #[test]
    fn test_short_history_delegates_to_moving_average() {
        let data = series(&[10.0, 12.0, 14.0]);
        let result = ExponentialSmoothing::default().forecast(&data, 4);
        let expected = MovingAverage::default().forecast(&data, 4);

        assert_eq!(result, expected);
        assert_eq!(result.model_id(), "moving_average");
    }

    #[test]
    fn test_linear_trend_is_followed() {
        let values: Vec<f64> = (0..15).map(|i| 100.0 + 5.0 * i as f64).collect();
        let result = ExponentialSmoothing::default().forecast(&series(&values), 3);

        assert_eq!(result.model_id(), MODEL_ID);
        let first = result.points()[0].predicted_qty;
        assert!(first > 165.0 && first < 180.0, "forecast {} off trend", first);
        assert!(result.points()[2].predicted_qty >= first);
        assert_eq!(result.points()[0].confidence, 85.0);
    }

    #[test]
    fn test_seasonal_fit_repeats_pattern() {
        let pattern = [
            80.0, 85.0, 95.0, 110.0, 130.0, 150.0, 160.0, 150.0, 125.0, 105.0, 90.0, 82.0,
        ];
        let values: Vec<f64> = (0..36).map(|i| pattern[i % 12] + i as f64).collect();
        let result = ExponentialSmoothing::default().forecast(&series(&values), 12);

        assert_eq!(result.model_id(), MODEL_ID);
        let forecast = result.values();
        // July peak stays well above the January trough
        assert!(forecast[6] > forecast[0] + 40.0);
    }

    #[test]
    fn test_fitting_failure_falls_back() {
        // Squared errors overflow to infinity for every parameter choice
        let values: Vec<f64> = (0..8).map(|i| if i % 2 == 0 { 0.0 } else { 1e200 }).collect();
        let data = series(&values);

        assert!(ExponentialSmoothing::default().fit(data.values()).is_err());
        let result = ExponentialSmoothing::default().forecast(&data, 2);
        assert_eq!(result.model_id(), "moving_average");
        assert_eq!(result.horizons(), 2);
    }

    #[test]
    fn test_forecast_is_non_negative() {
        let values = [90.0, 70.0, 50.0, 30.0, 12.0, 5.0];
        let result = ExponentialSmoothing::default().forecast(&series(&values), 6);

        for point in result.points() {
            assert!(point.predicted_qty >= 0.0);
            assert!(point.lower_bound >= 0.0);
            assert!(point.upper_bound >= point.lower_bound);
        }
    }
}
