//! Engine configuration
//!
//! Every section has defaults reproducing the engine's standard behaviour, so
//! a JSON file only needs the keys it overrides:
//!
//! ```json
//! { "anomaly": { "z_threshold": 3.0 }, "service": { "max_horizon": 36 } }
//! ```

use crate::error::{ForecastError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Top-level configuration for strategies, detectors and the service
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub moving_average: MovingAverageConfig,
    pub exp_smoothing: ExpSmoothingConfig,
    pub prophet: ProphetConfig,
    pub anomaly: AnomalyConfig,
    pub service: ServiceConfig,
}

/// Weighted moving average with a damped single-step trend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MovingAverageConfig {
    /// Maximum number of trailing points in the weighted average
    pub window: usize,
    /// Multiplier applied to the last observed step
    pub trend_factor: f64,
    /// Per-step damping of the trend as the horizon grows
    pub trend_damping: f64,
    /// Multiplier on the series standard deviation for the bounds
    pub interval_z: f64,
    pub confidence: f64,
}

impl Default for MovingAverageConfig {
    fn default() -> Self {
        Self {
            window: 6,
            trend_factor: 0.3,
            trend_damping: 0.5,
            interval_z: 1.96,
            confidence: 80.0,
        }
    }
}

/// Damped-trend exponential smoothing (Holt / additive Holt-Winters)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExpSmoothingConfig {
    /// Below this many points the moving average runs instead
    pub min_points: usize,
    pub seasonal_period: usize,
    /// Seasonality is only fitted from this many points on
    pub seasonal_min_points: usize,
    /// Bounds on the damping parameter phi
    pub damping_bounds: (f64, f64),
    pub max_iterations: usize,
    pub interval_z: f64,
    pub confidence: f64,
}

impl Default for ExpSmoothingConfig {
    fn default() -> Self {
        Self {
            min_points: 4,
            seasonal_period: 12,
            seasonal_min_points: 24,
            damping_bounds: (0.8, 0.98),
            max_iterations: 1000,
            interval_z: 1.96,
            confidence: 85.0,
        }
    }
}

/// How the yearly seasonal component combines with the trend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SeasonalityMode {
    Additive,
    #[default]
    Multiplicative,
}

/// Piecewise-linear trend plus Fourier seasonality curve fit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProphetConfig {
    /// Below this many points exponential smoothing runs instead
    pub min_points: usize,
    pub n_changepoints: usize,
    /// Share of the history in which changepoints may be placed
    pub changepoint_range: f64,
    pub changepoint_prior_scale: f64,
    pub seasonality_prior_scale: f64,
    pub yearly_fourier_order: usize,
    pub seasonality_mode: SeasonalityMode,
    pub interval_width: f64,
    /// Monte-Carlo paths for the interval; zero uses a normal approximation
    pub uncertainty_samples: usize,
    pub seed: u64,
    pub max_iterations: usize,
    pub confidence: f64,
}

impl Default for ProphetConfig {
    fn default() -> Self {
        Self {
            min_points: 12,
            n_changepoints: 25,
            changepoint_range: 0.8,
            changepoint_prior_scale: 0.05,
            seasonality_prior_scale: 10.0,
            yearly_fourier_order: 10,
            seasonality_mode: SeasonalityMode::Multiplicative,
            interval_width: 0.95,
            uncertainty_samples: 1000,
            seed: 0,
            max_iterations: 50,
            confidence: 95.0,
        }
    }
}

/// Z-score and IQR detector settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnomalyConfig {
    pub min_points: usize,
    pub z_threshold: f64,
    /// z-scores above this are reported as high severity
    pub high_severity_z: f64,
    pub iqr_multiplier: f64,
}

impl Default for AnomalyConfig {
    fn default() -> Self {
        Self {
            min_points: 6,
            z_threshold: 2.5,
            high_severity_z: 3.5,
            iqr_multiplier: 1.5,
        }
    }
}

/// Orchestration limits
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Minimum history length before any forecast is attempted
    pub min_history: usize,
    pub default_horizon: usize,
    pub max_horizon: usize,
    /// Trailing points held out for the backtest MAPE
    pub backtest_holdout: usize,
    pub backtest_min_points: usize,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            min_history: 3,
            default_horizon: 6,
            max_horizon: 24,
            backtest_holdout: 3,
            backtest_min_points: 6,
        }
    }
}

impl EngineConfig {
    /// Parse and validate a JSON document
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a JSON file
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json_str(&contents)
    }

    /// Reject values no strategy can run with
    pub fn validate(&self) -> Result<()> {
        let ma = &self.moving_average;
        if ma.window == 0 {
            return Err(config_error("moving_average.window must be positive"));
        }
        check_confidence("moving_average", ma.confidence)?;
        check_non_negative("moving_average.interval_z", ma.interval_z)?;

        let es = &self.exp_smoothing;
        if es.min_points < 3 {
            return Err(config_error("exp_smoothing.min_points must be at least 3"));
        }
        if es.seasonal_period < 2 || es.seasonal_min_points < 2 * es.seasonal_period {
            return Err(config_error(
                "exp_smoothing.seasonal_min_points must cover two seasonal periods of at least 2",
            ));
        }
        let (lo, hi) = es.damping_bounds;
        if !(0.0 < lo && lo <= hi && hi < 1.0) {
            return Err(config_error("exp_smoothing.damping_bounds must satisfy 0 < lo <= hi < 1"));
        }
        check_confidence("exp_smoothing", es.confidence)?;
        check_non_negative("exp_smoothing.interval_z", es.interval_z)?;

        let p = &self.prophet;
        if p.min_points < 3 {
            return Err(config_error("prophet.min_points must be at least 3"));
        }
        if !(0.0 < p.changepoint_range && p.changepoint_range <= 1.0) {
            return Err(config_error("prophet.changepoint_range must be within (0, 1]"));
        }
        if p.changepoint_prior_scale <= 0.0 || p.seasonality_prior_scale <= 0.0 {
            return Err(config_error("prophet prior scales must be positive"));
        }
        if !(0.0 < p.interval_width && p.interval_width < 1.0) {
            return Err(config_error("prophet.interval_width must be within (0, 1)"));
        }
        check_confidence("prophet", p.confidence)?;

        let a = &self.anomaly;
        if a.min_points < 2 {
            return Err(config_error("anomaly.min_points must be at least 2"));
        }
        if a.z_threshold <= 0.0 || a.high_severity_z < a.z_threshold {
            return Err(config_error(
                "anomaly thresholds must satisfy 0 < z_threshold <= high_severity_z",
            ));
        }
        check_non_negative("anomaly.iqr_multiplier", a.iqr_multiplier)?;

        let s = &self.service;
        if s.min_history == 0 {
            return Err(config_error("service.min_history must be positive"));
        }
        if s.default_horizon == 0 || s.default_horizon > s.max_horizon {
            return Err(config_error(
                "service.default_horizon must be within 1..=max_horizon",
            ));
        }
        if s.backtest_holdout == 0 || s.backtest_min_points <= s.backtest_holdout {
            return Err(config_error(
                "service.backtest_min_points must exceed a positive backtest_holdout",
            ));
        }

        Ok(())
    }
}

fn config_error(message: &str) -> ForecastError {
    ForecastError::Config(message.to_string())
}

fn check_confidence(section: &str, confidence: f64) -> Result<()> {
    if confidence > 0.0 && confidence <= 100.0 {
        Ok(())
    } else {
        Err(ForecastError::Config(format!(
            "{}.confidence must be within (0, 100], got {}",
            section, confidence
        )))
    }
}

fn check_non_negative(key: &str, value: f64) -> Result<()> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(ForecastError::Config(format!(
            "{} must be a finite non-negative number, got {}",
            key, value
        )))
    }
}
