use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum FaultlineError {
    #[error("Invalid DSN: {reason}")]
    InvalidDsn { reason: String },

    #[error("Delivery failed with status {status}: {body}")]
    Delivery { status: u16, body: String },

    #[error("Could not persist pending event to {path}: {source}")]
    Persistence {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid event id {0:?}")]
    InvalidEventId(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON parse error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),
}

impl FaultlineError {
    pub(crate) fn invalid_dsn(reason: impl Into<String>) -> Self {
        FaultlineError::InvalidDsn {
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, FaultlineError>;
