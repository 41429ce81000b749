//! Piecewise-linear trend with yearly Fourier seasonality
//!
//! The curve is `y(t) = g(t) + s(t)` (additive) or `y(t) = g(t) * (1 + s(t))`
//! (multiplicative), where
//! - `g(t) = m + k t + sum_j delta_j (t - c_j)+` is a trend whose slope may
//!   change at changepoints `c_j` spread over the first part of the history
//! - `s(t)` is a truncated Fourier series over a 365.25 day year
//!
//! Coefficients are MAP estimates under Gaussian priors, which reduces to a
//! ridge regression with one penalty per coefficient. Multiplicative fits
//! alternate between the trend and seasonal coefficients. Intervals come
//! from simulated future trend changes plus observation noise.

use crate::config::{ProphetConfig, SeasonalityMode};
use crate::data::TimeSeries;
use crate::models::exponential_smoothing::ExponentialSmoothing;
use crate::models::{ensure_finite, FitError, ForecastPoint, ForecastResult, ForecastStrategy};
use chrono::{Datelike, NaiveDate};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Exp, Normal, Poisson};
use sop_math::linalg::ridge_least_squares;
use sop_math::stats;
use statrs::distribution::{ContinuousCDF, Normal as Gaussian};
use std::f64::consts::PI;
use tracing::{debug, warn};

/// Registry id of the curve-fit model
pub const MODEL_ID: &str = "prophet";

/// Monthly data cannot resolve yearly harmonics above the sixth, and the
/// sixth collapses to a sign flip, so orders are capped below it
const MAX_FOURIER_ORDER: usize = 5;
const YEAR_DAYS: f64 = 365.25;
const TREND_PRIOR_SCALE: f64 = 5.0;
const MIN_PENALTY: f64 = 1e-8;
const MIN_NOISE_VARIANCE: f64 = 1e-4;

/// Decomposable trend plus seasonality curve fit
#[derive(Debug, Clone, Default)]
pub struct Prophet {
    config: ProphetConfig,
    fallback: ExponentialSmoothing,
}

/// Maps calendar dates onto `[0, 1]` over the history
#[derive(Debug, Clone, Copy)]
struct TimeScale {
    origin: NaiveDate,
    span_days: f64,
}

impl TimeScale {
    fn t(&self, date: NaiveDate) -> f64 {
        (date - self.origin).num_days() as f64 / self.span_days
    }
}

/// Fitted curve on the scaled value axis
#[derive(Debug, Clone)]
pub(crate) struct FittedCurve {
    scale: TimeScale,
    y_scale: f64,
    changepoints: Vec<f64>,
    /// `[m, k, delta_1, ..]`
    trend_coef: Vec<f64>,
    seasonal_coef: Vec<f64>,
    fourier_order: usize,
    mode: SeasonalityMode,
    /// Root mean squared in-sample residual
    sigma: f64,
}

impl FittedCurve {
    fn trend_at(&self, t: f64) -> f64 {
        dot(&trend_features(t, &self.changepoints), &self.trend_coef)
    }

    fn seasonal_at(&self, date: NaiveDate) -> f64 {
        dot(&fourier_features(date, self.fourier_order), &self.seasonal_coef)
    }

    fn combine(&self, trend: f64, seasonal: f64) -> f64 {
        match self.mode {
            SeasonalityMode::Additive => trend + seasonal,
            SeasonalityMode::Multiplicative => trend * (1.0 + seasonal),
        }
    }

    fn mean_abs_delta(&self) -> f64 {
        let deltas = &self.trend_coef[2..];
        if deltas.is_empty() {
            0.0
        } else {
            deltas.iter().map(|d| d.abs()).sum::<f64>() / deltas.len() as f64
        }
    }
}

impl Prophet {
    /// Create a curve-fit model; `fallback` runs for short or unfittable
    /// histories
    pub fn new(config: ProphetConfig, fallback: ExponentialSmoothing) -> Self {
        Self { config, fallback }
    }

    /// Model configuration
    pub fn config(&self) -> &ProphetConfig {
        &self.config
    }

    pub(crate) fn fit(&self, series: &TimeSeries) -> Result<FittedCurve, FitError> {
        let cfg = &self.config;
        let n = series.len();
        let origin = series.periods()[0];
        let span_days = (series.last_period() - origin).num_days() as f64;
        if n < 2 || span_days <= 0.0 {
            return Err(FitError::TooShort {
                required: 2,
                available: n,
            });
        }
        let scale = TimeScale { origin, span_days };

        let max_abs = series.values().iter().fold(0.0_f64, |acc, v| acc.max(v.abs()));
        let y_scale = if max_abs > 0.0 { max_abs } else { 1.0 };
        let y: Vec<f64> = series.values().iter().map(|v| v / y_scale).collect();
        let t: Vec<f64> = series.periods().iter().map(|&d| scale.t(d)).collect();

        let changepoints = changepoint_locations(&t, cfg.n_changepoints, cfg.changepoint_range);
        let fourier_order = cfg.yearly_fourier_order.min(MAX_FOURIER_ORDER);

        let trend_rows: Vec<Vec<f64>> = t.iter().map(|&ti| trend_features(ti, &changepoints)).collect();
        let season_rows: Vec<Vec<f64>> = series
            .periods()
            .iter()
            .map(|&d| fourier_features(d, fourier_order))
            .collect();

        let noise_var = linear_noise_variance(&t, &y)?;
        let mut trend_penalties = vec![penalty(noise_var, TREND_PRIOR_SCALE); 2];
        trend_penalties.extend(
            std::iter::repeat(penalty(noise_var, cfg.changepoint_prior_scale)).take(changepoints.len()),
        );
        let season_penalties =
            vec![penalty(noise_var, cfg.seasonality_prior_scale); 2 * fourier_order];

        let (trend_coef, seasonal_coef) = match cfg.seasonality_mode {
            SeasonalityMode::Additive => {
                fit_additive(&trend_rows, &season_rows, &y, &trend_penalties, &season_penalties)?
            }
            SeasonalityMode::Multiplicative => fit_multiplicative(
                &trend_rows,
                &season_rows,
                &y,
                &trend_penalties,
                &season_penalties,
                cfg.max_iterations,
            )?,
        };

        let mut fitted = FittedCurve {
            scale,
            y_scale,
            changepoints,
            trend_coef,
            seasonal_coef,
            fourier_order,
            mode: cfg.seasonality_mode,
            sigma: 0.0,
        };

        let sse: f64 = series
            .periods()
            .iter()
            .zip(t.iter().zip(&y))
            .map(|(&date, (&ti, &yi))| {
                let yhat = fitted.combine(fitted.trend_at(ti), fitted.seasonal_at(date));
                (yi - yhat).powi(2)
            })
            .sum();
        fitted.sigma = (sse / n as f64).sqrt();
        ensure_finite("in-sample residual scale", &[fitted.sigma])?;

        debug!(
            points = n,
            changepoints = fitted.changepoints.len(),
            fourier_order,
            sigma = fitted.sigma,
            "Curve fit complete"
        );

        Ok(fitted)
    }

    fn try_forecast(
        &self,
        series: &TimeSeries,
        horizon: usize,
    ) -> Result<ForecastResult, FitError> {
        let fitted = self.fit(series)?;
        let periods = series.future_periods(horizon);

        let t_future: Vec<f64> = periods.iter().map(|&d| fitted.scale.t(d)).collect();
        let trend: Vec<f64> = t_future.iter().map(|&t| fitted.trend_at(t)).collect();
        let seasonal: Vec<f64> = periods.iter().map(|&d| fitted.seasonal_at(d)).collect();
        let yhat: Vec<f64> = trend
            .iter()
            .zip(&seasonal)
            .map(|(&g, &s)| fitted.combine(g, s))
            .collect();
        ensure_finite("curve forecast", &yhat)?;

        let (lower, upper) = if self.config.uncertainty_samples > 0 {
            self.simulated_interval(&fitted, &t_future, &trend, &seasonal)?
        } else {
            self.analytic_interval(&fitted, &yhat)?
        };
        ensure_finite("lower bound", &lower)?;
        ensure_finite("upper bound", &upper)?;

        let y_scale = fitted.y_scale;
        let points = periods
            .into_iter()
            .enumerate()
            .map(|(h, period)| {
                ForecastPoint::new(
                    period,
                    yhat[h] * y_scale,
                    lower[h] * y_scale,
                    upper[h] * y_scale,
                    self.config.confidence,
                )
            })
            .collect();

        Ok(ForecastResult::new(MODEL_ID, points))
    }

    /// Percentile interval over simulated futures.
    ///
    /// Each path draws new changepoints after the history at the fitted
    /// changepoint rate, with Laplace-distributed slope changes scaled by the
    /// mean fitted change, and adds Gaussian observation noise.
    fn simulated_interval(
        &self,
        fitted: &FittedCurve,
        t_future: &[f64],
        trend: &[f64],
        seasonal: &[f64],
    ) -> Result<(Vec<f64>, Vec<f64>), FitError> {
        let cfg = &self.config;
        let mut rng = StdRng::seed_from_u64(cfg.seed);

        let noise = Normal::new(0.0, fitted.sigma).map_err(numerical)?;
        let magnitude = Exp::new(1.0 / (fitted.mean_abs_delta() + 1e-8)).map_err(numerical)?;

        let t_max = t_future.last().copied().unwrap_or(1.0);
        let rate = fitted.changepoints.len() as f64 * (t_max - 1.0);
        let arrivals = if rate > 0.0 {
            Some(Poisson::new(rate).map_err(numerical)?)
        } else {
            None
        };

        let mut paths = vec![Vec::with_capacity(cfg.uncertainty_samples); t_future.len()];
        for _ in 0..cfg.uncertainty_samples {
            let new_changes: Vec<(f64, f64)> = match &arrivals {
                Some(poisson) => {
                    let count: f64 = poisson.sample(&mut rng);
                    (0..count as usize)
                        .map(|_| {
                            let location = rng.gen_range(1.0..t_max);
                            let size: f64 = magnitude.sample(&mut rng);
                            let sign = if rng.gen_bool(0.5) { 1.0 } else { -1.0 };
                            (location, sign * size)
                        })
                        .collect()
                }
                None => Vec::new(),
            };

            for (h, path) in paths.iter_mut().enumerate() {
                let shift: f64 = new_changes
                    .iter()
                    .map(|(location, delta)| delta * (t_future[h] - location).max(0.0))
                    .sum();
                let value = fitted.combine(trend[h] + shift, seasonal[h]) + noise.sample(&mut rng);
                path.push(value);
            }
        }

        let lower_q = (1.0 - cfg.interval_width) / 2.0 * 100.0;
        let upper_q = (1.0 + cfg.interval_width) / 2.0 * 100.0;

        let mut lower = Vec::with_capacity(paths.len());
        let mut upper = Vec::with_capacity(paths.len());
        for path in &paths {
            lower.push(stats::percentile(path, lower_q)?);
            upper.push(stats::percentile(path, upper_q)?);
        }

        Ok((lower, upper))
    }

    /// Symmetric normal interval from the residual scale
    fn analytic_interval(
        &self,
        fitted: &FittedCurve,
        yhat: &[f64],
    ) -> Result<(Vec<f64>, Vec<f64>), FitError> {
        let z = Gaussian::new(0.0, 1.0)
            .map_err(numerical)?
            .inverse_cdf((1.0 + self.config.interval_width) / 2.0);
        let spread = z * fitted.sigma;

        Ok((
            yhat.iter().map(|y| y - spread).collect(),
            yhat.iter().map(|y| y + spread).collect(),
        ))
    }
}

impl ForecastStrategy for Prophet {
    fn model_id(&self) -> &str {
        MODEL_ID
    }

    fn display_name(&self) -> &str {
        "Prophet"
    }

    fn min_data_months(&self) -> usize {
        24
    }

    fn forecast(&self, series: &TimeSeries, horizon: usize) -> ForecastResult {
        if series.len() < self.config.min_points {
            debug!(
                points = series.len(),
                required = self.config.min_points,
                "History too short for curve fit, using exponential smoothing"
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

fn numerical<E: std::fmt::Display>(e: E) -> FitError {
    FitError::Numerical(e.to_string())
}

fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

fn penalty(noise_var: f64, prior_scale: f64) -> f64 {
    (noise_var / (prior_scale * prior_scale)).max(MIN_PENALTY)
}

/// `[1, t, (t - c_1)+, ..]`
fn trend_features(t: f64, changepoints: &[f64]) -> Vec<f64> {
    let mut row = Vec::with_capacity(2 + changepoints.len());
    row.push(1.0);
    row.push(t);
    row.extend(changepoints.iter().map(|c| (t - c).max(0.0)));
    row
}

/// `[sin(2πx/P), cos(2πx/P), .., sin(2πNx/P), cos(2πNx/P)]` with `x` in days
fn fourier_features(date: NaiveDate, order: usize) -> Vec<f64> {
    let x = date.num_days_from_ce() as f64;
    (1..=order)
        .flat_map(|k| {
            let angle = 2.0 * PI * k as f64 * x / YEAR_DAYS;
            [angle.sin(), angle.cos()]
        })
        .collect()
}

/// Evenly spaced changepoints over the first `range` share of the history,
/// excluding the origin
fn changepoint_locations(t: &[f64], requested: usize, range: f64) -> Vec<f64> {
    let hist_size = (t.len() as f64 * range).floor() as usize;
    let hist_size = hist_size.min(t.len());
    let count = requested.min(hist_size.saturating_sub(1));
    if count == 0 {
        return Vec::new();
    }

    let last = (hist_size - 1) as f64;
    (1..=count)
        .map(|j| {
            let index = (j as f64 * last / count as f64).round() as usize;
            t[index]
        })
        .collect()
}

/// Residual variance of a straight-line fit, the noise level priors are
/// measured against
fn linear_noise_variance(t: &[f64], y: &[f64]) -> Result<f64, FitError> {
    let rows: Vec<Vec<f64>> = t.iter().map(|&ti| vec![1.0, ti]).collect();
    let coef = ridge_least_squares(&rows, y, &[MIN_PENALTY, MIN_PENALTY])?;
    let residuals: Vec<f64> = rows.iter().zip(y).map(|(r, yi)| yi - dot(r, &coef)).collect();

    Ok(stats::population_variance(&residuals)?.max(MIN_NOISE_VARIANCE))
}

fn fit_additive(
    trend_rows: &[Vec<f64>],
    season_rows: &[Vec<f64>],
    y: &[f64],
    trend_penalties: &[f64],
    season_penalties: &[f64],
) -> Result<(Vec<f64>, Vec<f64>), FitError> {
    let design: Vec<Vec<f64>> = trend_rows
        .iter()
        .zip(season_rows)
        .map(|(trend, season)| trend.iter().chain(season).copied().collect())
        .collect();
    let penalties: Vec<f64> = trend_penalties.iter().chain(season_penalties).copied().collect();

    let mut coef = ridge_least_squares(&design, y, &penalties)?;
    let seasonal = coef.split_off(trend_penalties.len());
    Ok((coef, seasonal))
}

/// Alternating least squares for `y = g(t) * (1 + s(t))`
fn fit_multiplicative(
    trend_rows: &[Vec<f64>],
    season_rows: &[Vec<f64>],
    y: &[f64],
    trend_penalties: &[f64],
    season_penalties: &[f64],
    max_iterations: usize,
) -> Result<(Vec<f64>, Vec<f64>), FitError> {
    let mut trend_coef = ridge_least_squares(trend_rows, y, trend_penalties)?;
    let mut seasonal_coef = vec![0.0; season_penalties.len()];
    let mut previous_sse = f64::INFINITY;

    for _ in 0..max_iterations.max(1) {
        if !seasonal_coef.is_empty() {
            let (rows, target): (Vec<Vec<f64>>, Vec<f64>) = trend_rows
                .iter()
                .zip(season_rows)
                .zip(y)
                .map(|((trend, season), &yi)| {
                    let g = dot(trend, &trend_coef);
                    (season.iter().map(|x| x * g).collect(), yi - g)
                })
                .unzip();
            seasonal_coef = ridge_least_squares(&rows, &target, season_penalties)?;
        }

        let factors: Vec<f64> = season_rows
            .iter()
            .map(|season| 1.0 + dot(season, &seasonal_coef))
            .collect();
        let rows: Vec<Vec<f64>> = trend_rows
            .iter()
            .zip(&factors)
            .map(|(trend, f)| trend.iter().map(|x| x * f).collect())
            .collect();
        trend_coef = ridge_least_squares(&rows, y, trend_penalties)?;

        let sse: f64 = rows
            .iter()
            .zip(y)
            .map(|(row, yi)| (yi - dot(row, &trend_coef)).powi(2))
            .sum();
        if !sse.is_finite() {
            return Err(FitError::Numerical("alternating fit diverged".to_string()));
        }
        if previous_sse.is_finite() && (previous_sse - sse).abs() <= 1e-10 * previous_sse.max(1.0) {
            break;
        }
        previous_sse = sse;
    }

    Ok((trend_coef, seasonal_coef))
}
