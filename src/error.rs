use chrono::NaiveDate;
use thiserror::Error;

/// Top-level error carried by the binary.
///
/// Exit codes:
/// - 2: usage, configuration or input-file problems
/// - 3: the metrics engine rejected its input
/// - 4: an external source (FRED, CSV reader, cache) failed
#[derive(Clone)]
pub struct AppError {
    exit_code: u8,
    message: String,
}

impl AppError {
    pub fn new(exit_code: u8, message: impl Into<String>) -> Self {
        Self {
            exit_code,
            message: message.into(),
        }
    }

    pub fn exit_code(&self) -> u8 {
        self.exit_code
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::fmt::Debug for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppError")
            .field("exit_code", &self.exit_code)
            .field("message", &self.message)
            .finish()
    }
}

impl std::error::Error for AppError {}

/// Errors raised by the inflation metrics engine.
///
/// Only malformed input and missing history are errors; undefined percentage
/// changes and reconciliation discrepancies are returned as values.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum MetricsError {
    #[error("malformed series: {0}")]
    MalformedSeries(String),

    #[error("insufficient data: need {required} defined values, have {available}")]
    InsufficientData { required: usize, available: usize },

    #[error("change for {category_id} at {date} is undefined")]
    UndefinedBase { category_id: String, date: NaiveDate },
}

impl MetricsError {
    pub fn malformed(message: impl Into<String>) -> Self {
        MetricsError::MalformedSeries(message.into())
    }
}

impl From<MetricsError> for AppError {
    fn from(err: MetricsError) -> Self {
        AppError::new(3, err.to_string())
    }
}
