//! Storage seams used by the forecast service
//!
//! [`HistorySource`] supplies demand plan rows per product and
//! [`ForecastStore`] keeps generated forecasts. In-memory implementations
//! are provided for tests and the command-line tool.

use crate::data::DemandRecord;
use crate::error::Result;
use chrono::NaiveDate;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A persisted forecast period
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredForecast {
    pub product_id: String,
    /// Model the caller selected; part of the storage key
    pub model_type: String,
    /// Model that produced the numbers after any fallback
    pub fitted_by: String,
    pub period: NaiveDate,
    pub predicted_qty: f64,
    pub lower_bound: f64,
    pub upper_bound: f64,
    pub confidence: f64,
    pub mape: Option<f64>,
}

/// Optional criteria for listing stored forecasts; bounds are inclusive
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ForecastFilter {
    pub product_id: Option<String>,
    pub model_type: Option<String>,
    pub period_from: Option<NaiveDate>,
    pub period_to: Option<NaiveDate>,
}

impl ForecastFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn product(mut self, product_id: impl Into<String>) -> Self {
        self.product_id = Some(product_id.into());
        self
    }

    pub fn model(mut self, model_type: impl Into<String>) -> Self {
        self.model_type = Some(model_type.into());
        self
    }

    pub fn since(mut self, period: NaiveDate) -> Self {
        self.period_from = Some(period);
        self
    }

    pub fn until(mut self, period: NaiveDate) -> Self {
        self.period_to = Some(period);
        self
    }

    pub fn matches(&self, row: &StoredForecast) -> bool {
        self.product_id.as_ref().map_or(true, |p| *p == row.product_id)
            && self.model_type.as_ref().map_or(true, |m| *m == row.model_type)
            && self.period_from.map_or(true, |from| row.period >= from)
            && self.period_to.map_or(true, |to| row.period <= to)
    }
}

/// Source of demand history per product
pub trait HistorySource: Send + Sync {
    /// Demand plan rows for `product_id`, in any order
    fn demand_history(&self, product_id: &str) -> Result<Vec<DemandRecord>>;
}

/// Persistence for generated forecasts
pub trait ForecastStore: Send + Sync {
    /// Store `rows`, first deleting every existing row with the same
    /// product, model and period as one of them
    fn replace(&self, rows: Vec<StoredForecast>) -> Result<usize>;

    /// Rows matching `filter`, ascending by period
    fn list(&self, filter: &ForecastFilter) -> Result<Vec<StoredForecast>>;
}

/// Demand history held in memory
#[derive(Debug, Default)]
pub struct InMemoryHistory {
    records: RwLock<HashMap<String, Vec<DemandRecord>>>,
}

impl InMemoryHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append demand rows for a product
    pub fn insert_records(&self, product_id: impl Into<String>, records: Vec<DemandRecord>) {
        self.records
            .write()
            .entry(product_id.into())
            .or_default()
            .extend(records);
    }

    /// Append consecutive monthly actuals starting at `start`
    pub fn insert_actuals(&self, product_id: impl Into<String>, start: NaiveDate, values: &[f64]) {
        let mut periods = vec![crate::utils::month_start(start)];
        periods.extend(crate::utils::future_months(start, values.len().saturating_sub(1)));

        let records = periods
            .into_iter()
            .zip(values)
            .map(|(period, &value)| DemandRecord {
                period,
                actual_qty: Some(value),
                consensus_qty: None,
                adjusted_qty: None,
                forecast_qty: 0.0,
            })
            .collect();

        self.insert_records(product_id, records);
    }
}

impl HistorySource for InMemoryHistory {
    fn demand_history(&self, product_id: &str) -> Result<Vec<DemandRecord>> {
        Ok(self.records.read().get(product_id).cloned().unwrap_or_default())
    }
}

/// Forecast rows held in memory
#[derive(Debug, Default)]
pub struct InMemoryForecastStore {
    rows: RwLock<Vec<StoredForecast>>,
}

impl InMemoryForecastStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.rows.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.read().is_empty()
    }
}

impl ForecastStore for InMemoryForecastStore {
    fn replace(&self, new_rows: Vec<StoredForecast>) -> Result<usize> {
        let mut rows = self.rows.write();
        rows.retain(|existing| {
            !new_rows.iter().any(|new| {
                new.product_id == existing.product_id
                    && new.model_type == existing.model_type
                    && new.period == existing.period
            })
        });

        let inserted = new_rows.len();
        rows.extend(new_rows);
        Ok(inserted)
    }

    fn list(&self, filter: &ForecastFilter) -> Result<Vec<StoredForecast>> {
        let mut matching: Vec<StoredForecast> = self
            .rows
            .read()
            .iter()
            .filter(|row| filter.matches(row))
            .cloned()
            .collect();
        // Stable sort keeps insertion order within a period
        matching.sort_by_key(|row| row.period);
        Ok(matching)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, 1).unwrap()
    }

    fn row(product: &str, model: &str, period: NaiveDate, qty: f64) -> StoredForecast {
        StoredForecast {
            product_id: product.to_string(),
            model_type: model.to_string(),
            fitted_by: model.to_string(),
            period,
            predicted_qty: qty,
            lower_bound: qty,
            upper_bound: qty,
            confidence: 80.0,
            mape: None,
        }
    }

    #[test]
    fn test_replace_deletes_matching_keys_only() {
        let store = InMemoryForecastStore::new();
        store
            .replace(vec![
                row("A", "moving_average", date(2024, 1), 1.0),
                row("A", "moving_average", date(2024, 2), 2.0),
                row("A", "prophet", date(2024, 1), 3.0),
                row("B", "moving_average", date(2024, 1), 4.0),
            ])
            .unwrap();

        store
            .replace(vec![row("A", "moving_average", date(2024, 1), 10.0)])
            .unwrap();

        let rows = store.list(&ForecastFilter::new().product("A").model("moving_average")).unwrap();
        let quantities: Vec<f64> = rows.iter().map(|r| r.predicted_qty).collect();
        assert_eq!(quantities, vec![10.0, 2.0]);
        assert_eq!(store.len(), 4);
    }

    #[test]
    fn test_list_filters_by_period_range() {
        let store = InMemoryForecastStore::new();
        store
            .replace((1..=6).map(|m| row("A", "moving_average", date(2024, m), m as f64)).collect())
            .unwrap();

        let rows = store
            .list(&ForecastFilter::new().since(date(2024, 2)).until(date(2024, 4)))
            .unwrap();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].period, date(2024, 2));
        assert_eq!(rows[2].period, date(2024, 4));
    }

    #[test]
    fn test_history_actuals() {
        let history = InMemoryHistory::new();
        history.insert_actuals("A", date(2023, 12), &[5.0, 6.0]);

        let records = history.demand_history("A").unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].period, date(2024, 1));
        assert_eq!(records[1].resolved_qty(), 6.0);
        assert!(history.demand_history("missing").unwrap().is_empty());
    }
}
