//! # SOP Math
//!
//! Numeric building blocks for demand forecasting and anomaly detection.
//! This crate provides descriptive statistics, forecast accuracy metrics,
//! a bounded Nelder-Mead minimiser and a small dense least-squares solver.

use thiserror::Error;

pub mod linalg;
pub mod metrics;
pub mod optimization;
pub mod stats;

/// Errors that can occur in forecasting math
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MathError {
    #[error("Insufficient data for calculation: {0}")]
    InsufficientData(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Calculation error: {0}")]
    CalculationError(String),
}

/// Result type for forecasting math operations
pub type Result<T> = std::result::Result<T, MathError>;
