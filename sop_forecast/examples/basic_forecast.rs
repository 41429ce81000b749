use chrono::NaiveDate;
use sop_forecast::models::{ExponentialSmoothing, MovingAverage, Prophet};
use sop_forecast::{AnomalyDetector, ForecastContext, ForecastStrategy, IqrDetector, TimeSeries};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("SOP Forecast: Basic Forecasting Example");
    println!("=======================================\n");

    let series = create_sample_history()?;
    println!(
        "Sample history: {} months from {} to {}\n",
        series.len(),
        series.periods()[0],
        series.last_period()
    );

    // Run every built-in model through one context, swapping strategies
    let mut context = ForecastContext::new(Box::new(MovingAverage::default()));
    let strategies: Vec<Box<dyn ForecastStrategy>> = vec![
        Box::new(ExponentialSmoothing::default()),
        Box::new(Prophet::default()),
    ];

    print_forecast(&context, &series);
    for strategy in strategies {
        context.set_strategy(strategy);
        print_forecast(&context, &series);
    }

    // Anomalies in the history
    let detector = AnomalyDetector::default();
    println!("Z-score anomalies (threshold {}):", detector.z_threshold());
    for record in detector.detect_records(&series) {
        println!(
            "  {} value {:.0} z={:.2} {} {} -> {}",
            record.period,
            record.value,
            record.z_score,
            record.severity,
            record.direction,
            record.suggested_action
        );
    }

    let mask = IqrDetector::default().outlier_mask(series.values());
    let outliers: Vec<_> = series
        .periods()
        .iter()
        .zip(mask)
        .filter(|(_, flagged)| *flagged)
        .map(|(period, _)| period.to_string())
        .collect();
    println!("IQR outliers: {:?}", outliers);

    Ok(())
}

fn print_forecast(context: &ForecastContext, series: &TimeSeries) {
    let result = context.execute(series, 6);
    println!(
        "{} (ran as {}):",
        context.strategy().display_name(),
        result.model_id()
    );
    for point in result.points() {
        println!(
            "  {}  {:>8.2}  [{:>8.2}, {:>8.2}]  confidence {:.0}%",
            point.period, point.predicted_qty, point.lower_bound, point.upper_bound, point.confidence
        );
    }
    println!();
}

/// Three years of seasonal demand with growth and one promotion spike
fn create_sample_history() -> sop_forecast::Result<TimeSeries> {
    let start = NaiveDate::from_ymd_opt(2022, 1, 1).unwrap();
    let seasonal = [0.8, 0.85, 0.95, 1.0, 1.1, 1.25, 1.3, 1.2, 1.05, 0.95, 0.9, 1.15];

    let values: Vec<f64> = (0..36)
        .map(|i| {
            let base = 500.0 + 8.0 * i as f64;
            let promotion = if i == 20 { 900.0 } else { 0.0 };
            base * seasonal[i % 12] + promotion
        })
        .collect();

    TimeSeries::from_values(start, &values)
}
