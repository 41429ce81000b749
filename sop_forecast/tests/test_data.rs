use chrono::NaiveDate;
use sop_forecast::data::{DataLoader, DemandRecord, TimeSeries};
use sop_forecast::error::ForecastError;
use std::io::Write;
use tempfile::NamedTempFile;

fn date(y: i32, m: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, 1).unwrap()
}

#[test]
fn test_data_loader_from_csv() {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "period,value").unwrap();
    writeln!(file, "2023-03,130").unwrap();
    writeln!(file, "2023-01,100").unwrap();
    writeln!(file, "2023-02-15,120.5").unwrap();

    let series = DataLoader::from_csv(file.path()).unwrap();

    assert_eq!(series.len(), 3);
    assert_eq!(series.periods(), &[date(2023, 1), date(2023, 2), date(2023, 3)]);
    assert_eq!(series.values(), &[100.0, 120.5, 130.0]);
}

#[test]
fn test_data_loader_resolves_demand_columns() {
    let csv = "\
period,actual_qty,consensus_qty,adjusted_qty,forecast_qty
2024-01-01,90,,,100
2024-02-01,,110,,100
2024-03-01,0,,95,100
2024-04-01,,,,100
";
    let series = DataLoader::from_reader(csv.as_bytes()).unwrap();
    assert_eq!(series.values(), &[90.0, 110.0, 95.0, 100.0]);
}

#[test]
fn test_data_loader_rejects_bad_rows() {
    let missing_value = "period,value\n2024-01,\n";
    assert!(matches!(
        DataLoader::from_reader(missing_value.as_bytes()),
        Err(ForecastError::InvalidSeries(_))
    ));

    let bad_period = "period,value\nJanuary,10\n";
    assert!(DataLoader::from_reader(bad_period.as_bytes()).is_err());

    let duplicate = "period,value\n2024-01,10\n2024-01-20,12\n";
    assert!(matches!(
        DataLoader::from_reader(duplicate.as_bytes()),
        Err(ForecastError::InvalidSeries(_))
    ));

    assert!(matches!(
        DataLoader::from_csv("/nonexistent/history.csv"),
        Err(ForecastError::Io(_))
    ));
}

#[test]
fn test_series_from_unordered_demand_records() {
    let records = vec![
        DemandRecord {
            period: date(2024, 2),
            actual_qty: None,
            consensus_qty: Some(55.0),
            adjusted_qty: None,
            forecast_qty: 40.0,
        },
        DemandRecord {
            period: date(2024, 1),
            actual_qty: Some(50.0),
            consensus_qty: None,
            adjusted_qty: None,
            forecast_qty: 40.0,
        },
    ];

    let series = TimeSeries::from_demand_records(&records).unwrap();
    assert_eq!(series.values(), &[50.0, 55.0]);
    assert_eq!(series.last_period(), date(2024, 2));
}

#[test]
fn test_time_series_rejects_invalid_values() {
    let nan = TimeSeries::from_pairs(vec![(date(2024, 1), f64::NAN)]);
    assert!(matches!(nan, Err(ForecastError::InvalidSeries(_))));

    let descending = TimeSeries::from_pairs(vec![(date(2024, 2), 1.0), (date(2024, 1), 1.0)]);
    assert!(matches!(descending, Err(ForecastError::InvalidSeries(_))));
}
