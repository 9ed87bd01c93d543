//! Error types for pool telemetry

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TelemetryError {
    #[error("Pool name must not be empty")]
    EmptyPoolName,

    #[error("Metric name '{0}' cannot be used as an instrument name")]
    InvalidMetricName(String),
}

pub type TelemetryResult<T> = Result<T, TelemetryError>;
