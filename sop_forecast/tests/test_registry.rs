use chrono::NaiveDate;
use pretty_assertions::assert_eq;
use sop_forecast::config::EngineConfig;
use sop_forecast::models::MovingAverage;
use sop_forecast::{
    ForecastError, ForecastPoint, ForecastResult, ForecastStrategy, ModelInfo, ModelRegistry,
    TimeSeries,
};
use std::sync::Arc;
use std::thread;

#[derive(Debug)]
struct Constant(f64);

impl ForecastStrategy for Constant {
    fn model_id(&self) -> &str {
        "custom_id"
    }

    fn display_name(&self) -> &str {
        "Constant"
    }

    fn min_data_months(&self) -> usize {
        1
    }

    fn forecast(&self, series: &TimeSeries, horizon: usize) -> ForecastResult {
        let points = series
            .future_periods(horizon)
            .into_iter()
            .map(|period| ForecastPoint::with_spread(period, self.0, 0.0, 50.0))
            .collect();
        ForecastResult::new(self.model_id(), points)
    }
}

#[test]
fn test_register_then_create() {
    let registry = ModelRegistry::with_builtins();
    registry.register("custom_id", || Box::new(Constant(7.0)));

    let model = registry.create("custom_id").unwrap();
    assert_eq!(model.display_name(), "Constant");

    let series =
        TimeSeries::from_values(NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(), &[1.0, 2.0]).unwrap();
    assert_eq!(model.forecast(&series, 2).values(), vec![7.0, 7.0]);

    assert_eq!(
        registry.list_models().last(),
        Some(&ModelInfo {
            id: "custom_id".to_string(),
            display_name: "Constant".to_string(),
            min_data_months: 1,
        })
    );
}

#[test]
fn test_create_unknown_model() {
    let registry = ModelRegistry::with_builtins();
    registry.register("custom_id", || Box::new(Constant(1.0)));

    match registry.create("nonexistent") {
        Err(ForecastError::UnknownModel { requested, available }) => {
            assert_eq!(requested, "nonexistent");
            assert_eq!(
                available,
                vec!["moving_average", "exp_smoothing", "prophet", "custom_id"]
            );
        }
        other => panic!("expected UnknownModel, got {:?}", other.map(|m| m.model_id().to_string())),
    }
}

#[test]
fn test_selection_tiers() {
    let registry = ModelRegistry::with_builtins();
    assert_eq!(registry.select_by_history_length(3).unwrap().model_id(), "moving_average");
    assert_eq!(registry.select_by_history_length(15).unwrap().model_id(), "exp_smoothing");
    assert_eq!(registry.select_by_history_length(30).unwrap().model_id(), "prophet");
}

#[test]
fn test_registry_from_config() {
    let mut config = EngineConfig::default();
    config.moving_average.confidence = 60.0;
    let registry = ModelRegistry::from_config(&config);

    let series = TimeSeries::from_values(
        NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
        &[5.0, 6.0, 7.0],
    )
    .unwrap();

    // Every tier bottoms out in the configured moving average
    for id in ["moving_average", "exp_smoothing", "prophet"] {
        let result = registry.create_context(id).unwrap().execute(&series, 1);
        assert_eq!(result.points()[0].confidence, 60.0, "model {}", id);
    }
}

#[test]
fn test_concurrent_registration_and_lookup() {
    let registry = Arc::new(ModelRegistry::with_builtins());

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let registry = Arc::clone(&registry);
            thread::spawn(move || {
                registry.register(format!("model_{}", i), || Box::new(MovingAverage::default()));
                registry.create("prophet").map(|m| m.model_id().to_string())
            })
        })
        .collect();

    for handle in handles {
        assert_eq!(handle.join().unwrap().unwrap(), "prophet");
    }
    assert_eq!(registry.model_ids().len(), 11);
}
