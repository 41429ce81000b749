//! Time series input handling for forecasting
//!
//! Callers hand the engine an ordered list of `(period, value)` pairs. This
//! module normalises periods to month starts, checks ordering and values, and
//! loads histories from CSV.

use crate::error::{ForecastError, Result};
use crate::utils::{future_months, month_start};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Read;
use std::path::Path;

/// One observed period
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub period: NaiveDate,
    pub value: f64,
}

impl Observation {
    pub fn new(period: NaiveDate, value: f64) -> Self {
        Self { period, value }
    }
}

/// A stored demand plan row with the quantities planners may fill in.
///
/// The value used for forecasting is the first present quantity in the order
/// actual, consensus, adjusted, originally forecast. Zero counts as absent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DemandRecord {
    pub period: NaiveDate,
    pub actual_qty: Option<f64>,
    pub consensus_qty: Option<f64>,
    pub adjusted_qty: Option<f64>,
    pub forecast_qty: f64,
}

impl DemandRecord {
    /// Quantity this record contributes to the history
    pub fn resolved_qty(&self) -> f64 {
        [self.actual_qty, self.consensus_qty, self.adjusted_qty]
            .into_iter()
            .flatten()
            .find(|qty| *qty != 0.0)
            .unwrap_or(self.forecast_qty)
    }

    /// Whether an actual quantity has been recorded
    pub fn has_actual(&self) -> bool {
        self.actual_qty.is_some()
    }
}

/// Ascending, unique, monthly series of non-negative values.
///
/// A `TimeSeries` always holds at least one observation.
#[derive(Debug, Clone, PartialEq)]
pub struct TimeSeries {
    periods: Vec<NaiveDate>,
    values: Vec<f64>,
}

impl TimeSeries {
    /// Build a series from observations already in period order
    pub fn new(observations: Vec<Observation>) -> Result<Self> {
        if observations.is_empty() {
            return Err(ForecastError::InsufficientData {
                required: 1,
                available: 0,
                operation: "time series construction".to_string(),
            });
        }

        let mut periods = Vec::with_capacity(observations.len());
        let mut values = Vec::with_capacity(observations.len());

        for obs in observations {
            let period = month_start(obs.period);

            if !obs.value.is_finite() || obs.value < 0.0 {
                return Err(ForecastError::InvalidSeries(format!(
                    "value for {} must be a finite non-negative number, got {}",
                    period, obs.value
                )));
            }

            if let Some(previous) = periods.last() {
                if period <= *previous {
                    return Err(ForecastError::InvalidSeries(format!(
                        "periods must be strictly ascending by month: {} follows {}",
                        period, previous
                    )));
                }
            }

            periods.push(period);
            values.push(obs.value);
        }

        Ok(Self { periods, values })
    }

    /// Build a series from `(period, value)` pairs
    pub fn from_pairs<I>(pairs: I) -> Result<Self>
    where
        I: IntoIterator<Item = (NaiveDate, f64)>,
    {
        Self::new(
            pairs
                .into_iter()
                .map(|(period, value)| Observation::new(period, value))
                .collect(),
        )
    }

    /// Build a series of consecutive months starting at `start`
    pub fn from_values(start: NaiveDate, values: &[f64]) -> Result<Self> {
        let first = month_start(start);
        let mut periods = vec![first];
        periods.extend(future_months(first, values.len().saturating_sub(1)));

        Self::from_pairs(periods.into_iter().zip(values.iter().copied()))
    }

    /// Build a series from demand plan rows, ordering them by period
    pub fn from_demand_records(records: &[DemandRecord]) -> Result<Self> {
        let mut pairs: Vec<(NaiveDate, f64)> = records
            .iter()
            .map(|r| (r.period, r.resolved_qty()))
            .collect();
        pairs.sort_by_key(|(period, _)| *period);

        Self::from_pairs(pairs)
    }

    /// Number of observations
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Always `false`; kept for API symmetry with collections
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Observed values in period order
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Observed periods in ascending order
    pub fn periods(&self) -> &[NaiveDate] {
        &self.periods
    }

    /// Most recent period
    pub fn last_period(&self) -> NaiveDate {
        self.periods[self.periods.len() - 1]
    }

    /// Most recent value
    pub fn last_value(&self) -> f64 {
        self.values[self.values.len() - 1]
    }

    /// Iterate over observations
    pub fn iter(&self) -> impl Iterator<Item = Observation> + '_ {
        self.periods
            .iter()
            .zip(&self.values)
            .map(|(&period, &value)| Observation::new(period, value))
    }

    /// The first `len` observations, or `None` when that would be empty
    pub fn head(&self, len: usize) -> Option<Self> {
        let len = len.min(self.len());
        if len == 0 {
            return None;
        }

        Some(Self {
            periods: self.periods[..len].to_vec(),
            values: self.values[..len].to_vec(),
        })
    }

    /// The `horizon` months following the last observation
    pub fn future_periods(&self, horizon: usize) -> Vec<NaiveDate> {
        future_months(self.last_period(), horizon)
    }
}

/// Row layout accepted by [`DataLoader`].
///
/// Either `value` is given directly, or the demand plan quantities are, in
/// which case the usual precedence applies.
#[derive(Debug, Deserialize)]
struct HistoryRow {
    period: String,
    #[serde(default)]
    value: Option<f64>,
    #[serde(default)]
    actual_qty: Option<f64>,
    #[serde(default)]
    consensus_qty: Option<f64>,
    #[serde(default)]
    adjusted_qty: Option<f64>,
    #[serde(default)]
    forecast_qty: Option<f64>,
}

/// Data loader for demand histories
#[derive(Debug)]
pub struct DataLoader;

impl DataLoader {
    /// Load a history from a CSV file with a header row
    pub fn from_csv<P: AsRef<Path>>(path: P) -> Result<TimeSeries> {
        let file = File::open(path)?;
        Self::from_reader(file)
    }

    /// Load a history from any CSV source with a header row.
    ///
    /// Rows are sorted by period before validation.
    pub fn from_reader<R: Read>(reader: R) -> Result<TimeSeries> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .trim(csv::Trim::All)
            .from_reader(reader);

        let mut pairs = Vec::new();
        for row in csv_reader.deserialize::<HistoryRow>() {
            let row = row?;
            let period = parse_period(&row.period)?;
            let value = match row.value {
                Some(value) => value,
                None => DemandRecord {
                    period,
                    actual_qty: row.actual_qty,
                    consensus_qty: row.consensus_qty,
                    adjusted_qty: row.adjusted_qty,
                    forecast_qty: row.forecast_qty.ok_or_else(|| {
                        ForecastError::InvalidSeries(format!(
                            "row for {} has neither a value nor a forecast_qty",
                            row.period
                        ))
                    })?,
                }
                .resolved_qty(),
            };
            pairs.push((period, value));
        }

        pairs.sort_by_key(|(period, _)| *period);
        TimeSeries::from_pairs(pairs)
    }
}

/// Parse `YYYY-MM-DD` or `YYYY-MM` into a month start
pub fn parse_period(raw: &str) -> Result<NaiveDate> {
    let raw = raw.trim();
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(&format!("{}-01", raw), "%Y-%m-%d"))
        .map(month_start)
        .map_err(|_| ForecastError::InvalidSeries(format!("unrecognised period '{}'", raw)))
}
