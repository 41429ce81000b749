//! Utility functions for the sop_forecast crate

use chrono::{Datelike, Months, NaiveDate};

/// First day of the month containing `date`
pub fn month_start(date: NaiveDate) -> NaiveDate {
    date.with_day(1).unwrap_or(date)
}

/// Consecutive calendar months following `last_period`.
///
/// Periods are month starts; the first returned period is the month after
/// `last_period`. The sequence stops at the last month `NaiveDate` can
/// represent, so a horizon reaching past it yields fewer periods.
pub fn future_months(last_period: NaiveDate, horizon: usize) -> Vec<NaiveDate> {
    let start = month_start(last_period);

    (1..=horizon)
        .map_while(|step| {
            let step = u32::try_from(step).ok()?;
            start.checked_add_months(Months::new(step))
        })
        .collect()
}

/// Round to two decimals, the precision forecasts are reported at
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Split a series into training and holdout parts, keeping the last
/// `holdout` points for testing
pub fn train_test_split(data: &[f64], holdout: usize) -> (&[f64], &[f64]) {
    let split = data.len().saturating_sub(holdout);
    data.split_at(split)
}
