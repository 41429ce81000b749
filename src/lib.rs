//! # SOP Planner
//!
//! `sop_planner` bundles the workspace crates behind one dependency:
//! [`forecast`] for demand models, selection and anomaly detection and
//! [`math`] for the statistics and solvers they are built on.
//!
//! ## Example
//!
//! ```
//! use sop_planner::prelude::*;
//!
//! let start = chrono::NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
//! let series = TimeSeries::from_values(start, &[120.0, 118.0, 125.0, 130.0]).unwrap();
//!
//! let forecast = sop_planner::quick_forecast(&series, 3).unwrap();
//! assert_eq!(forecast.model_id(), "moving_average");
//! assert_eq!(forecast.horizons(), 3);
//! ```

pub use sop_forecast as forecast;
pub use sop_math as math;

/// Types most callers need
pub mod prelude {
    pub use sop_forecast::{
        AnomalyDetector, AnomalyRecord, EngineConfig, ForecastContext, ForecastError,
        ForecastResult, ForecastService, ForecastStrategy, IqrDetector, ModelRegistry,
        TimeSeries,
    };
}

use sop_forecast::{ForecastResult, ModelRegistry, Result, TimeSeries};

/// Forecast `horizon` months with the model the history length calls for.
pub fn quick_forecast(series: &TimeSeries, horizon: usize) -> Result<ForecastResult> {
    let registry = ModelRegistry::with_builtins();
    let context = registry.create_context(ModelRegistry::best_model_id(series.len()))?;
    Ok(context.execute(series, horizon))
}
