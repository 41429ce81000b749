use sop_forecast::error::ForecastError;
use sop_forecast::EngineConfig;
use sop_math::MathError;
use std::io;

#[test]
fn test_error_conversion() {
    let io_error = io::Error::new(io::ErrorKind::NotFound, "file not found");
    assert!(matches!(ForecastError::from(io_error), ForecastError::Io(_)));

    let math_error = MathError::InsufficientData("empty".to_string());
    assert!(matches!(ForecastError::from(math_error), ForecastError::Math(_)));

    let json_error = serde_json::from_str::<EngineConfig>("{").unwrap_err();
    assert!(matches!(ForecastError::from(json_error), ForecastError::Json(_)));
}

#[test]
fn test_error_display() {
    let error = ForecastError::UnknownModel {
        requested: "arima".to_string(),
        available: vec!["moving_average".to_string(), "prophet".to_string()],
    };
    assert_eq!(
        error.to_string(),
        "Unknown forecast model 'arima'. Available models: [moving_average, prophet]"
    );

    let error = ForecastError::InsufficientData {
        required: 3,
        available: 1,
        operation: "forecast generation".to_string(),
    };
    assert_eq!(
        error.to_string(),
        "Insufficient data for forecast generation: requires 3 records, found 1"
    );

    let error = ForecastError::InvalidParameter("horizon must be positive".to_string());
    assert_eq!(error.to_string(), "Invalid parameter: horizon must be positive");
}
