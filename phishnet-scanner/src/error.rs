use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScanError {
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("HTTP status {0}")]
    Status(u16),

    #[error("Timed out after {0:?}")]
    Timeout(Duration),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Other error: {0}")]
    Other(String),
}

impl ScanError {
    /// Short variant name used in log lines, e.g. `Timeout`.
    pub fn kind(&self) -> &'static str {
        match self {
            ScanError::HttpError(_) => "HttpError",
            ScanError::Status(_) => "Status",
            ScanError::Timeout(_) => "Timeout",
            ScanError::InvalidUrl(_) => "InvalidUrl",
            ScanError::ParseError(_) => "ParseError",
            ScanError::JsonError(_) => "JsonError",
            ScanError::Other(_) => "Other",
        }
    }
}

pub type Result<T> = std::result::Result<T, ScanError>;
