//! Statistical anomaly detection over demand histories
//!
//! [`AnomalyDetector`] scores every observation by its distance from the
//! series mean in population standard deviations. [`IqrDetector`] is an
//! alternative policy based on the interquartile range.

use crate::config::AnomalyConfig;
use crate::data::TimeSeries;
use crate::utils::round2;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sop_math::stats;
use std::fmt;

/// How far an anomaly lies from the mean
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Medium,
    High,
}

/// Whether an anomaly lies above or below the mean
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Spike,
    Drop,
}

impl Direction {
    /// Follow-up suggested to planners
    pub fn suggested_action(&self) -> &'static str {
        match self {
            Direction::Spike => "Investigate demand spike",
            Direction::Drop => "Investigate demand drop",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Medium => write!(f, "medium"),
            Severity::High => write!(f, "high"),
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Spike => write!(f, "spike"),
            Direction::Drop => write!(f, "drop"),
        }
    }
}

/// One flagged observation, rounded for presentation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnomalyRecord {
    pub index: usize,
    pub period: NaiveDate,
    pub value: f64,
    pub mean: f64,
    pub std: f64,
    pub z_score: f64,
    pub severity: Severity,
    pub direction: Direction,
    pub suggested_action: String,
}

/// Z-score detector
#[derive(Debug, Clone, PartialEq)]
pub struct AnomalyDetector {
    z_threshold: f64,
    high_severity_z: f64,
    min_points: usize,
}

impl Default for AnomalyDetector {
    fn default() -> Self {
        Self::from_config(&AnomalyConfig::default())
    }
}

/// Scores for a series with non-zero spread
struct Scores {
    mean: f64,
    std: f64,
    z: Vec<f64>,
}

impl AnomalyDetector {
    /// Detector flagging z-scores above `z_threshold`, with default severity
    /// and minimum-length settings
    pub fn new(z_threshold: f64) -> Self {
        Self {
            z_threshold,
            ..Self::default()
        }
    }

    pub fn from_config(config: &AnomalyConfig) -> Self {
        Self {
            z_threshold: config.z_threshold,
            high_severity_z: config.high_severity_z,
            min_points: config.min_points,
        }
    }

    pub fn z_threshold(&self) -> f64 {
        self.z_threshold
    }

    /// Absolute z-score of every value, or `None` when the series is too
    /// short or flat to score
    pub fn scores(&self, values: &[f64]) -> Option<Vec<f64>> {
        self.compute(values).map(|s| s.z)
    }

    fn compute(&self, values: &[f64]) -> Option<Scores> {
        if values.len() < self.min_points {
            return None;
        }

        let mean = stats::mean(values).ok()?;
        let std = stats::population_std(values).ok()?;
        if std == 0.0 || !std.is_finite() {
            return None;
        }

        let z = values.iter().map(|v| (v - mean).abs() / std).collect();
        Some(Scores { mean, std, z })
    }

    /// Indices whose z-score exceeds the threshold, ascending
    pub fn detect(&self, values: &[f64]) -> Vec<usize> {
        match self.compute(values) {
            Some(scores) => scores
                .z
                .iter()
                .enumerate()
                .filter(|(_, &z)| z > self.z_threshold)
                .map(|(i, _)| i)
                .collect(),
            None => Vec::new(),
        }
    }

    /// Severity-annotated anomalies for a dated series
    pub fn detect_records(&self, series: &TimeSeries) -> Vec<AnomalyRecord> {
        let Some(scores) = self.compute(series.values()) else {
            return Vec::new();
        };

        series
            .iter()
            .zip(&scores.z)
            .enumerate()
            .filter(|(_, (_, &z))| z > self.z_threshold)
            .map(|(index, (obs, &z))| {
                let severity = if z > self.high_severity_z {
                    Severity::High
                } else {
                    Severity::Medium
                };
                let direction = if obs.value > scores.mean {
                    Direction::Spike
                } else {
                    Direction::Drop
                };

                AnomalyRecord {
                    index,
                    period: obs.period,
                    value: round2(obs.value),
                    mean: round2(scores.mean),
                    std: round2(scores.std),
                    z_score: round2(z),
                    severity,
                    direction,
                    suggested_action: direction.suggested_action().to_string(),
                }
            })
            .collect()
    }
}

/// Interquartile-range outlier detector
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IqrDetector {
    multiplier: f64,
}

impl Default for IqrDetector {
    fn default() -> Self {
        Self { multiplier: 1.5 }
    }
}

impl IqrDetector {
    pub fn new(multiplier: f64) -> Self {
        Self { multiplier }
    }

    /// `(Q1 - k*IQR, Q3 + k*IQR)`, or `None` for fewer than two values
    pub fn bounds(&self, values: &[f64]) -> Option<(f64, f64)> {
        if values.len() < 2 {
            return None;
        }

        let q1 = stats::percentile(values, 25.0).ok()?;
        let q3 = stats::percentile(values, 75.0).ok()?;
        let iqr = q3 - q1;
        Some((q1 - self.multiplier * iqr, q3 + self.multiplier * iqr))
    }

    /// `true` for every value outside the bounds
    pub fn outlier_mask(&self, values: &[f64]) -> Vec<bool> {
        match self.bounds(values) {
            Some((lower, upper)) => values.iter().map(|&v| v < lower || v > upper).collect(),
            None => vec![false; values.len()],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_short_series_has_no_anomalies() {
        let detector = AnomalyDetector::new(0.1);
        assert!(detector.detect(&[1.0, 100.0, 1.0, 100.0, 1.0]).is_empty());
    }

    #[test]
    fn test_constant_series_has_no_anomalies() {
        assert!(AnomalyDetector::default().detect(&[42.0; 12]).is_empty());
        assert!(AnomalyDetector::default().scores(&[42.0; 12]).is_none());
    }

    #[test]
    fn test_spike_is_flagged() {
        let mut values = vec![100.0; 10];
        values.push(5000.0);

        assert_eq!(AnomalyDetector::new(2.0).detect(&values), vec![10]);
    }

    #[test]
    fn test_threshold_is_strict() {
        // Every value sits exactly one std from the mean
        let values = [-1.0, 1.0, -1.0, 1.0, -1.0, 1.0];
        assert!(AnomalyDetector::new(1.0).detect(&values).is_empty());
        assert_eq!(AnomalyDetector::new(0.99).detect(&values).len(), 6);
    }

    #[test]
    fn test_records_carry_severity_and_direction() {
        let start = NaiveDate::from_ymd_opt(2023, 1, 1).unwrap();

        // A lone outlier among n points scores sqrt(n - 1)
        let mut values = vec![100.0; 20];
        values[5] = 400.0;
        let records = AnomalyDetector::default()
            .detect_records(&TimeSeries::from_values(start, &values).unwrap());
        assert_eq!(records.len(), 1);

        let spike = &records[0];
        assert_eq!(spike.index, 5);
        assert_eq!(spike.period, NaiveDate::from_ymd_opt(2023, 6, 1).unwrap());
        assert_eq!(spike.direction, Direction::Spike);
        assert_eq!(spike.severity, Severity::High);
        assert_eq!(spike.mean, 115.0);
        assert_eq!(spike.suggested_action, "Investigate demand spike");

        let mut values = vec![100.0; 10];
        values[7] = 40.0;
        let records = AnomalyDetector::default()
            .detect_records(&TimeSeries::from_values(start, &values).unwrap());
        assert_eq!(records.len(), 1);

        let drop = &records[0];
        assert_eq!(drop.index, 7);
        assert_eq!(drop.direction, Direction::Drop);
        assert_eq!(drop.severity, Severity::Medium);
        assert_eq!(drop.z_score, 3.0);
        assert_eq!(drop.suggested_action, "Investigate demand drop");
    }

    #[test]
    fn test_iqr_mask() {
        let values = [10.0, 12.0, 11.0, 13.0, 12.0, 11.0, 60.0, 12.0];
        let mask = IqrDetector::default().outlier_mask(&values);

        assert_eq!(mask, vec![false, false, false, false, false, false, true, false]);
        assert_eq!(IqrDetector::default().outlier_mask(&[5.0]), vec![false]);
    }
}
