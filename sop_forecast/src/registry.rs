//! Model registry and history-based model selection
//!
//! The registry maps model ids to constructors. It comes seeded with the
//! built-in strategies and accepts new ids at runtime without touching the
//! existing ones.

use crate::config::EngineConfig;
use crate::context::ForecastContext;
use crate::error::{ForecastError, Result};
use crate::models::{exponential_smoothing, moving_average, prophet};
use crate::models::{ExponentialSmoothing, ForecastStrategy, MovingAverage, Prophet};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// Builds a fresh strategy instance
pub type StrategyConstructor = Arc<dyn Fn() -> Box<dyn ForecastStrategy> + Send + Sync>;

/// Months of history from which the curve fit is selected
pub const PROPHET_MIN_MONTHS: usize = 24;
/// Months of history from which exponential smoothing is selected
pub const EXP_SMOOTHING_MIN_MONTHS: usize = 12;

/// Catalog entry for one registered model
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelInfo {
    pub id: String,
    pub display_name: String,
    pub min_data_months: usize,
}

/// Registry of forecasting models keyed by id, in registration order
pub struct ModelRegistry {
    entries: RwLock<Vec<(String, StrategyConstructor)>>,
}

impl fmt::Debug for ModelRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelRegistry")
            .field("models", &self.model_ids())
            .finish()
    }
}

impl Default for ModelRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

impl ModelRegistry {
    /// Registry with no models
    pub fn empty() -> Self {
        Self {
            entries: RwLock::new(Vec::new()),
        }
    }

    /// Registry seeded with the built-in models using default settings
    pub fn with_builtins() -> Self {
        Self::from_config(&EngineConfig::default())
    }

    /// Registry seeded with the built-in models configured from `config`
    pub fn from_config(config: &EngineConfig) -> Self {
        let registry = Self::empty();

        let ma = config.moving_average.clone();
        let es = config.exp_smoothing.clone();
        let prophet_cfg = config.prophet.clone();

        let build_ma = {
            let ma = ma.clone();
            move || MovingAverage::new(ma.clone())
        };
        let build_es = {
            let (es, ma) = (es.clone(), ma.clone());
            move || ExponentialSmoothing::new(es.clone(), ma.clone())
        };
        let build_prophet = {
            let build_es = build_es.clone();
            move || Prophet::new(prophet_cfg.clone(), build_es())
        };

        registry.register(moving_average::MODEL_ID, move || Box::new(build_ma()));
        registry.register(exponential_smoothing::MODEL_ID, move || Box::new(build_es()));
        registry.register(prophet::MODEL_ID, move || Box::new(build_prophet()));

        registry
    }

    /// Register a model, replacing any previous constructor for the same id
    pub fn register<F>(&self, model_id: impl Into<String>, constructor: F)
    where
        F: Fn() -> Box<dyn ForecastStrategy> + Send + Sync + 'static,
    {
        let model_id = model_id.into();
        let constructor: StrategyConstructor = Arc::new(constructor);
        let mut entries = self.entries.write();

        match entries.iter_mut().find(|(id, _)| *id == model_id) {
            Some(entry) => {
                debug!(model = %model_id, "Replacing registered forecast model");
                entry.1 = constructor;
            }
            None => {
                debug!(model = %model_id, "Registering forecast model");
                entries.push((model_id, constructor));
            }
        }
    }

    /// Whether `model_id` is registered
    pub fn contains(&self, model_id: &str) -> bool {
        self.entries.read().iter().any(|(id, _)| id == model_id)
    }

    /// Registered ids in registration order
    pub fn model_ids(&self) -> Vec<String> {
        self.entries.read().iter().map(|(id, _)| id.clone()).collect()
    }

    /// Instantiate the model registered under `model_id`
    pub fn create(&self, model_id: &str) -> Result<Box<dyn ForecastStrategy>> {
        // Clone the constructor so user code never runs under the lock
        let constructor = self
            .entries
            .read()
            .iter()
            .find(|(id, _)| id == model_id)
            .map(|(_, constructor)| Arc::clone(constructor));

        match constructor {
            Some(constructor) => Ok(constructor()),
            None => Err(ForecastError::UnknownModel {
                requested: model_id.to_string(),
                available: self.model_ids(),
            }),
        }
    }

    /// Context running the model registered under `model_id`
    pub fn create_context(&self, model_id: &str) -> Result<ForecastContext> {
        self.create(model_id).map(ForecastContext::new)
    }

    /// Catalog of every registered model
    pub fn list_models(&self) -> Vec<ModelInfo> {
        // One snapshot of the entries; constructors run after the lock is released
        let entries: Vec<(String, StrategyConstructor)> = self
            .entries
            .read()
            .iter()
            .map(|(id, constructor)| (id.clone(), Arc::clone(constructor)))
            .collect();

        entries
            .into_iter()
            .map(|(id, constructor)| {
                let model = constructor();
                ModelInfo {
                    id,
                    display_name: model.display_name().to_string(),
                    min_data_months: model.min_data_months(),
                }
            })
            .collect()
    }

    /// Model id suited to `months_available` months of history
    pub fn best_model_id(months_available: usize) -> &'static str {
        if months_available >= PROPHET_MIN_MONTHS {
            prophet::MODEL_ID
        } else if months_available >= EXP_SMOOTHING_MIN_MONTHS {
            exponential_smoothing::MODEL_ID
        } else {
            moving_average::MODEL_ID
        }
    }

    /// Instantiate the model suited to `months_available` months of history
    pub fn select_by_history_length(&self, months_available: usize) -> Result<Box<dyn ForecastStrategy>> {
        self.create(Self::best_model_id(months_available))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(0, "moving_average")]
    #[case(3, "moving_average")]
    #[case(11, "moving_average")]
    #[case(12, "exp_smoothing")]
    #[case(15, "exp_smoothing")]
    #[case(23, "exp_smoothing")]
    #[case(24, "prophet")]
    #[case(30, "prophet")]
    fn test_select_by_history_length(#[case] months: usize, #[case] expected: &str) {
        let registry = ModelRegistry::with_builtins();
        assert_eq!(ModelRegistry::best_model_id(months), expected);
        assert_eq!(registry.select_by_history_length(months).unwrap().model_id(), expected);
    }

    #[test]
    fn test_builtin_catalog() {
        let models = ModelRegistry::with_builtins().list_models();
        let summary: Vec<(&str, usize)> = models
            .iter()
            .map(|m| (m.id.as_str(), m.min_data_months))
            .collect();

        assert_eq!(
            summary,
            vec![("moving_average", 3), ("exp_smoothing", 12), ("prophet", 24)]
        );
    }

    #[test]
    fn test_unknown_model_lists_available_ids() {
        let err = ModelRegistry::with_builtins().create("nonexistent").unwrap_err();
        match err {
            ForecastError::UnknownModel { requested, available } => {
                assert_eq!(requested, "nonexistent");
                assert_eq!(available, vec!["moving_average", "exp_smoothing", "prophet"]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_register_overwrites_in_place() {
        let registry = ModelRegistry::with_builtins();
        registry.register("moving_average", || Box::new(ExponentialSmoothing::default()));

        assert_eq!(registry.model_ids().len(), 3);
        assert_eq!(registry.create("moving_average").unwrap().model_id(), "exp_smoothing");
    }

    #[test]
    fn test_catalog_stays_consistent_during_registration() {
        let registry = Arc::new(ModelRegistry::with_builtins());

        let writer = {
            let registry = Arc::clone(&registry);
            std::thread::spawn(move || {
                for i in 0..50 {
                    registry.register(format!("alias_{i}"), || Box::new(MovingAverage::default()));
                }
            })
        };

        for _ in 0..50 {
            let catalog = registry.list_models();
            let ids: Vec<&str> = catalog.iter().map(|m| m.id.as_str()).collect();
            assert_eq!(&ids[..3], ["moving_average", "exp_smoothing", "prophet"]);
            for (i, info) in catalog.iter().skip(3).enumerate() {
                assert_eq!(info.id, format!("alias_{i}"));
                assert_eq!(info.display_name, "Moving Average");
                assert_eq!(info.min_data_months, 3);
            }
        }

        writer.join().unwrap();
        assert_eq!(registry.list_models().len(), 53);
    }
}
