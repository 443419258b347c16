//! Error types for order_bridge

use thiserror::Error;

/// Unified error type for order bridge operations
#[derive(Debug, Error)]
pub enum BridgeError {
    /// Request was malformed (missing upload, unparseable field values)
    #[error("{0}")]
    Validation(String),
    /// Referenced resource does not exist
    #[error("{0}")]
    NotFound(String),
    /// Upstream API answered with a non-2xx status
    #[error("Upstream API error: {status} - {body}")]
    Upstream {
        status: reqwest::StatusCode,
        body: String,
    },
    /// HTTP request failed (network error, timeout, etc.)
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
    /// Failed to parse a JSON response
    #[error("Parse error: {0}")]
    Parse(#[from] serde_json::Error),
    /// CSV reading or writing failed
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    /// File system operation failed
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result alias for order bridge operations
pub type Result<T> = std::result::Result<T, BridgeError>;
