use thiserror::Error;
use std::num::ParseIntError;

#[derive(Error, Debug)]
pub enum HarvesterError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("HTTP request error: {0}")]
    RequestError(#[from] reqwest::Error),

    #[error("JSON parsing error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Date parsing error: {0}")]
    DateError(#[from] chrono::ParseError),

    #[error("Parse int error: {0}")]
    ParseIntError(#[from] ParseIntError),

    #[error("WebDriver error: {0}")]
    AutomationError(String),

    #[error("No element matching {0} within the wait timeout")]
    ElementNotFound(String),

    #[error("{what} index {index} out of range (have {len})")]
    IndexOutOfRange {
        what: &'static str,
        index: usize,
        len: usize,
    },

    #[error("Export page error: {0}")]
    ExportError(String),

    #[error("Fetch error: {0}")]
    FetchError(#[from] crate::fetch::FetchError),

    #[error("Unknown error: {0}")]
    Unknown(String),
}

pub type Result<T> = std::result::Result<T, HarvesterError>;

impl From<String> for HarvesterError {
    fn from(s: String) -> Self {
        HarvesterError::Unknown(s)
    }
}

impl From<&str> for HarvesterError {
    fn from(s: &str) -> Self {
        HarvesterError::Unknown(s.to_string())
    }
}
