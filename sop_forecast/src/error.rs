//! Error types for the sop_forecast crate

use sop_math::MathError;
use thiserror::Error;

/// Errors surfaced to callers of the forecasting engine.
///
/// Numerical fitting failures inside a strategy never appear here; they are
/// absorbed by the fallback chain.
#[derive(Debug, Error)]
pub enum ForecastError {
    /// Requested model id is not registered
    #[error("Unknown forecast model '{requested}'. Available models: [{}]", .available.join(", "))]
    UnknownModel {
        requested: String,
        available: Vec<String>,
    },

    /// Not enough history to attempt any forecast
    #[error("Insufficient data for {operation}: requires {required} records, found {available}")]
    InsufficientData {
        required: usize,
        available: usize,
        operation: String,
    },

    /// Input series violates ordering or value constraints
    #[error("Invalid series: {0}")]
    InvalidSeries(String),

    /// Error from invalid parameters
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// Error in engine configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// Error from IO operations
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Error reading CSV history
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Error (de)serializing JSON
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Error from numeric helpers
    #[error("Math error: {0}")]
    Math(#[from] MathError),
}

/// Result type with our custom error
pub type Result<T> = std::result::Result<T, ForecastError>;
