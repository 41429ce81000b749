//! Registering a custom model alongside the built-in ones

use chrono::NaiveDate;
use sop_forecast::events::EventBus;
use sop_forecast::store::{ForecastFilter, InMemoryForecastStore, InMemoryHistory};
use sop_forecast::{
    ForecastPoint, ForecastResult, ForecastService, ForecastStrategy, ModelRegistry, TimeSeries,
};
use std::sync::Arc;

/// Repeats the value observed twelve months before each forecast month
#[derive(Debug, Default)]
struct SeasonalNaive;

impl ForecastStrategy for SeasonalNaive {
    fn model_id(&self) -> &str {
        "seasonal_naive"
    }

    fn display_name(&self) -> &str {
        "Seasonal Naive"
    }

    fn min_data_months(&self) -> usize {
        12
    }

    fn forecast(&self, series: &TimeSeries, horizon: usize) -> ForecastResult {
        let values = series.values();
        let points = series
            .future_periods(horizon)
            .into_iter()
            .enumerate()
            .map(|(step, period)| {
                let value = match values.len() {
                    n if n >= 12 => values[n - 12 + step % 12],
                    _ => series.last_value(),
                };
                ForecastPoint::with_spread(period, value, value * 0.1, 70.0)
            })
            .collect();

        ForecastResult::new(self.model_id(), points)
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let registry = Arc::new(ModelRegistry::with_builtins());
    registry.register("seasonal_naive", || Box::new(SeasonalNaive));

    println!("Available models:");
    for model in registry.list_models() {
        println!(
            "  {:<16} {:<40} needs {} months",
            model.id, model.display_name, model.min_data_months
        );
    }

    let history = Arc::new(InMemoryHistory::new());
    let start = NaiveDate::from_ymd_opt(2023, 1, 1).unwrap();
    let values: Vec<f64> = (0..18).map(|i| 200.0 + 15.0 * ((i % 12) as f64 - 6.0).abs()).collect();
    history.insert_actuals("SKU-42", start, &values);

    let store = Arc::new(InMemoryForecastStore::new());
    let service = ForecastService::new(registry, history, store, Arc::new(EventBus::with_logging()));

    let run = service.generate_forecast("SKU-42", Some("seasonal_naive"), 6)?;
    println!("\n{} forecast, backtest MAPE {:?}", run.fitted_by, run.mape);

    for row in service.list_forecasts(&ForecastFilter::new().product("SKU-42"))? {
        println!("  {}  {:.2}", row.period, row.predicted_qty);
    }

    match service.generate_forecast("SKU-42", Some("arima"), 6) {
        Ok(_) => println!("unexpected success"),
        Err(e) => println!("\n{}", e),
    }

    Ok(())
}
