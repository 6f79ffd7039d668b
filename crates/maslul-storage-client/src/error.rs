//! Error types for the storage client

use thiserror::Error;

/// Storage client error
#[derive(Debug, Error)]
pub enum StorageError {
    /// HTTP request failed
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Server returned an error
    #[error("Server error {status}: {message}")]
    Server { status: u16, message: String },

    /// Resource not found
    #[error("Not found: {0}")]
    NotFound(String),
}

impl StorageError {
    /// Whether retrying this request could plausibly succeed.
    ///
    /// Timeouts, connection failures and 5xx responses are transient;
    /// any other 4xx outcome is terminal.
    pub fn is_transient(&self) -> bool {
        match self {
            StorageError::Http(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            StorageError::Server { status, .. } => *status >= 500,
            StorageError::NotFound(_) | StorageError::Json(_) => false,
        }
    }
}

/// Result type for storage operations
pub type Result<T> = std::result::Result<T, StorageError>;
