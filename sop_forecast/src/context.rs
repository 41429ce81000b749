//! Holder for the strategy a forecast run executes

use crate::data::TimeSeries;
use crate::models::{ForecastResult, ForecastStrategy};

/// Runs forecasts through one swappable strategy.
///
/// A context is meant for a single run at a time; create one per call when
/// forecasting products in parallel.
#[derive(Debug)]
pub struct ForecastContext {
    strategy: Box<dyn ForecastStrategy>,
}

impl ForecastContext {
    pub fn new(strategy: Box<dyn ForecastStrategy>) -> Self {
        Self { strategy }
    }

    /// Strategy currently in use
    pub fn strategy(&self) -> &dyn ForecastStrategy {
        self.strategy.as_ref()
    }

    /// Replace the strategy, returning the previous one
    pub fn set_strategy(&mut self, strategy: Box<dyn ForecastStrategy>) -> Box<dyn ForecastStrategy> {
        std::mem::replace(&mut self.strategy, strategy)
    }

    /// Forecast `horizon` months with the current strategy
    pub fn execute(&self, series: &TimeSeries, horizon: usize) -> ForecastResult {
        self.strategy.forecast(series, horizon)
    }
}
