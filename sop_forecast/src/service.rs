//! Forecast orchestration: history lookup, model selection, storage and
//! event publication

use crate::anomaly::{AnomalyDetector, AnomalyRecord};
use crate::config::{EngineConfig, ServiceConfig};
use crate::context::ForecastContext;
use crate::data::TimeSeries;
use crate::error::{ForecastError, Result};
use crate::events::{DomainEvent, EventBus, ForecastGenerated};
use crate::metrics::backtest_mape_with;
use crate::models::{ForecastPoint, MovingAverage};
use crate::registry::{ModelInfo, ModelRegistry};
use crate::store::{ForecastFilter, ForecastStore, HistorySource, StoredForecast};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info};

/// Outcome of one forecast generation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastRun {
    pub product_id: String,
    /// Model that was requested or auto-selected
    pub model_type: String,
    /// Model that produced the points after any fallback
    pub fitted_by: String,
    pub history_len: usize,
    pub mape: Option<f64>,
    pub points: Vec<ForecastPoint>,
}

/// Average backtest error of stored forecasts for one model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelAccuracy {
    pub model_type: String,
    pub avg_mape: f64,
    pub sample_count: usize,
}

/// Generates, stores and evaluates forecasts per product
pub struct ForecastService {
    registry: Arc<ModelRegistry>,
    history: Arc<dyn HistorySource>,
    store: Arc<dyn ForecastStore>,
    events: Arc<EventBus>,
    config: ServiceConfig,
    detector: AnomalyDetector,
    backtest_model: MovingAverage,
}

impl std::fmt::Debug for ForecastService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ForecastService")
            .field("registry", &self.registry)
            .field("events", &self.events)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl ForecastService {
    /// Service with default settings
    pub fn new(
        registry: Arc<ModelRegistry>,
        history: Arc<dyn HistorySource>,
        store: Arc<dyn ForecastStore>,
        events: Arc<EventBus>,
    ) -> Self {
        Self {
            registry,
            history,
            store,
            events,
            config: ServiceConfig::default(),
            detector: AnomalyDetector::default(),
            backtest_model: MovingAverage::default(),
        }
    }

    /// Apply the service, anomaly and backtest settings of `config`
    pub fn with_config(mut self, config: &EngineConfig) -> Self {
        self.config = config.service.clone();
        self.detector = AnomalyDetector::from_config(&config.anomaly);
        self.backtest_model = MovingAverage::new(config.moving_average.clone());
        self
    }

    pub fn registry(&self) -> &ModelRegistry {
        &self.registry
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    fn load_series(&self, product_id: &str) -> Result<Option<TimeSeries>> {
        let records = self.history.demand_history(product_id)?;
        if records.is_empty() {
            return Ok(None);
        }
        TimeSeries::from_demand_records(&records).map(Some)
    }

    /// Forecast `horizon` months for a product and replace its stored rows.
    ///
    /// Without `model_id` the model is chosen from the history length.
    pub fn generate_forecast(
        &self,
        product_id: &str,
        model_id: Option<&str>,
        horizon: usize,
    ) -> Result<ForecastRun> {
        if horizon == 0 || horizon > self.config.max_horizon {
            return Err(ForecastError::InvalidParameter(format!(
                "horizon must be within 1..={}, got {}",
                self.config.max_horizon, horizon
            )));
        }

        let series = self.load_series(product_id)?;
        let available = series.as_ref().map_or(0, TimeSeries::len);
        let series = match series {
            Some(series) if available >= self.config.min_history => series,
            _ => {
                return Err(ForecastError::InsufficientData {
                    required: self.config.min_history,
                    available,
                    operation: "forecast generation".to_string(),
                })
            }
        };

        let strategy = match model_id {
            Some(id) => self.registry.create(id)?,
            None => self.registry.select_by_history_length(series.len())?,
        };
        let context = ForecastContext::new(strategy);
        let model_type = context.strategy().model_id().to_string();
        debug!(product = product_id, model = %model_type, points = series.len(), "Running forecast");

        let mape = backtest_mape_with(
            &self.backtest_model,
            &series,
            self.config.backtest_holdout,
            self.config.backtest_min_points,
        );
        let result = context.execute(&series, horizon).with_mape(mape);
        let fitted_by = result.model_id().to_string();
        let points = result.into_points();

        let rows = points
            .iter()
            .map(|p| StoredForecast {
                product_id: product_id.to_string(),
                model_type: model_type.clone(),
                fitted_by: fitted_by.clone(),
                period: p.period,
                predicted_qty: p.predicted_qty,
                lower_bound: p.lower_bound,
                upper_bound: p.upper_bound,
                confidence: p.confidence,
                mape: p.mape,
            })
            .collect();
        let records_created = self.store.replace(rows)?;

        info!(
            product = product_id,
            model = %model_type,
            fitted_by = %fitted_by,
            horizon,
            records = records_created,
            "Forecast stored"
        );

        self.events
            .publish(&DomainEvent::ForecastGenerated(ForecastGenerated {
                product_id: product_id.to_string(),
                model_type: model_type.clone(),
                fitted_by: fitted_by.clone(),
                horizon_months: horizon,
                records_created,
            }));

        Ok(ForecastRun {
            product_id: product_id.to_string(),
            model_type,
            fitted_by,
            history_len: series.len(),
            mape: points.first().and_then(|p| p.mape),
            points,
        })
    }

    /// Anomalous months in a product's demand history
    pub fn detect_anomalies(&self, product_id: &str) -> Result<Vec<AnomalyRecord>> {
        Ok(self
            .load_series(product_id)?
            .map(|series| self.detector.detect_records(&series))
            .unwrap_or_default())
    }

    /// Stored forecasts matching `filter`, ascending by period
    pub fn list_forecasts(&self, filter: &ForecastFilter) -> Result<Vec<StoredForecast>> {
        self.store.list(filter)
    }

    /// Average stored MAPE per model, optionally for one product
    pub fn accuracy_metrics(&self, product_id: Option<&str>) -> Result<Vec<ModelAccuracy>> {
        let filter = ForecastFilter {
            product_id: product_id.map(str::to_string),
            ..ForecastFilter::default()
        };

        // (model, sum, count) in first-seen order
        let mut totals: Vec<(String, f64, usize)> = Vec::new();
        for row in self.store.list(&filter)? {
            let Some(mape) = row.mape else { continue };
            match totals.iter_mut().find(|(model, _, _)| *model == row.model_type) {
                Some((_, sum, count)) => {
                    *sum += mape;
                    *count += 1;
                }
                None => totals.push((row.model_type, mape, 1)),
            }
        }

        Ok(totals
            .into_iter()
            .map(|(model_type, sum, count)| ModelAccuracy {
                model_type,
                avg_mape: (sum / count as f64 * 10_000.0).round() / 10_000.0,
                sample_count: count,
            })
            .collect())
    }

    /// Catalog of available models
    pub fn list_models(&self) -> Vec<ModelInfo> {
        self.registry.list_models()
    }
}
