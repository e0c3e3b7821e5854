//! Stage error types

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised by a running stage
#[derive(Debug, Error)]
pub enum StageError {
    #[error("IO error on {path}: {source}")]
    File {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("HTTP error {status} while downloading {url}")]
    HttpStatus { url: String, status: u16 },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Invalid JSON line '{line}': {source}")]
    Json {
        line: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Line exceeds maximum length of {max_length} bytes")]
    LineTooLong { max_length: usize },

    #[error("Stage {stage} cannot accept {item} items")]
    UnsupportedItem { stage: &'static str, item: &'static str },

    #[error("Downstream stage closed its input")]
    DownstreamClosed,

    #[error("Blocking worker failed: {0}")]
    Worker(String),
}

impl StageError {
    /// Check if this error only reports that the next stage went away
    pub fn is_downstream_closed(&self) -> bool {
        matches!(self, StageError::DownstreamClosed)
    }
}
