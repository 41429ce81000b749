//! # SOP Forecast
//!
//! Demand forecasting and anomaly detection for sales and operations
//! planning.
//!
//! ## Features
//!
//! - Monthly demand histories with validated, month-start periods
//! - Forecasting models (Moving Average, damped Holt-Winters Exponential
//!   Smoothing, Prophet-style trend and seasonality curve fit)
//! - A fallback chain: a model that cannot fit hands over to the next simpler one
//! - A runtime model registry with selection by history length
//! - Z-score and IQR anomaly detection
//! - Backtest MAPE and forecast evaluation metrics
//! - An orchestration service with pluggable history and forecast storage
//!
//! ## Model Selection
//!
//! | Months of history | Model |
//! |---|---|
//! | 24 or more | `prophet` |
//! | 12 to 23 | `exp_smoothing` |
//! | fewer than 12 | `moving_average` |
//!
//! ## Quick Start
//!
//! ```rust
//! use chrono::NaiveDate;
//! use sop_forecast::{AnomalyDetector, ModelRegistry, TimeSeries};
//!
//! # fn main() -> sop_forecast::Result<()> {
//! let start = NaiveDate::from_ymd_opt(2023, 1, 1).unwrap();
//! let history: Vec<f64> = (0..18).map(|i| 100.0 + 2.0 * i as f64).collect();
//! let series = TimeSeries::from_values(start, &history)?;
//!
//! // Pick a model from the amount of history and run it
//! let registry = ModelRegistry::with_builtins();
//! let context = registry.create_context(ModelRegistry::best_model_id(series.len()))?;
//! let forecast = context.execute(&series, 6);
//! assert_eq!(forecast.horizons(), 6);
//!
//! // Flag unusual months
//! let anomalies = AnomalyDetector::default().detect(series.values());
//! assert!(anomalies.is_empty());
//! # Ok(())
//! # }
//! ```

pub mod anomaly;
pub mod config;
pub mod context;
pub mod data;
pub mod error;
pub mod events;
pub mod metrics;
pub mod models;
pub mod registry;
pub mod service;
pub mod store;
pub mod utils;

// Re-export commonly used types
pub use crate::anomaly::{AnomalyDetector, AnomalyRecord, Direction, IqrDetector, Severity};
pub use crate::config::EngineConfig;
pub use crate::context::ForecastContext;
pub use crate::data::{DataLoader, DemandRecord, Observation, TimeSeries};
pub use crate::error::{ForecastError, Result};
pub use crate::models::{ForecastPoint, ForecastResult, ForecastStrategy};
pub use crate::registry::{ModelInfo, ModelRegistry};
pub use crate::service::{ForecastRun, ForecastService};
pub use sop_math::metrics::mape;

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const NAME: &str = env!("CARGO_PKG_NAME");
