//! Forecast a demand history from CSV and print the run as JSON.
//!
//! ```text
//! sop-forecast <history.csv> [--model <id>] [--horizon <months>] [--config <engine.json>]
//! ```
//!
//! The CSV needs a `period` column plus either `value` or the demand plan
//! quantity columns. Logs go to stderr and honour `RUST_LOG`.

use clap::Parser;
use sop_forecast::data::DataLoader;
use sop_forecast::events::EventBus;
use sop_forecast::store::{InMemoryForecastStore, InMemoryHistory};
use sop_forecast::{DemandRecord, EngineConfig, ForecastService, ModelRegistry};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Debug, Parser)]
#[command(name = "sop-forecast")]
#[command(about = "Demand forecasting and anomaly detection", long_about = None)]
struct Args {
    /// Demand history CSV
    history: PathBuf,

    /// Model id (moving_average, exp_smoothing, prophet); auto-selected when absent
    #[arg(short, long)]
    model: Option<String>,

    /// Months to forecast; defaults to service.default_horizon
    #[arg(short = 'n', long)]
    horizon: Option<usize>,

    /// Engine configuration JSON
    #[arg(short, long)]
    config: Option<PathBuf>,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let args = Args::parse();

    let config = match &args.config {
        Some(path) => EngineConfig::from_path(path)?,
        None => EngineConfig::default(),
    };

    let series = DataLoader::from_csv(&args.history)?;
    let product_id = args
        .history
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| "product".to_string());

    let history = Arc::new(InMemoryHistory::new());
    history.insert_records(
        product_id.clone(),
        series
            .iter()
            .map(|obs| DemandRecord {
                period: obs.period,
                actual_qty: Some(obs.value),
                consensus_qty: None,
                adjusted_qty: None,
                forecast_qty: 0.0,
            })
            .collect(),
    );

    let service = ForecastService::new(
        Arc::new(ModelRegistry::from_config(&config)),
        history,
        Arc::new(InMemoryForecastStore::new()),
        Arc::new(EventBus::with_logging()),
    )
    .with_config(&config);

    let horizon = args.horizon.unwrap_or(config.service.default_horizon);
    let run = service.generate_forecast(&product_id, args.model.as_deref(), horizon)?;
    let anomalies = service.detect_anomalies(&product_id)?;

    let output = serde_json::json!({
        "forecast": run,
        "anomalies": anomalies,
    });
    println!("{}", serde_json::to_string_pretty(&output)?);

    Ok(())
}
