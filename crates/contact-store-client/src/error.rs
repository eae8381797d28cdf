//! Error types for contact store operations.

use thiserror::Error;

/// Error type for all contact store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Network or transport-level HTTP error from reqwest.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The store returned a non-success HTTP status.
    #[error("Store error: {status} - {message}")]
    Store {
        /// The HTTP status code returned by the store.
        status: u16,
        /// The response body, typically containing error details.
        message: String,
    },

    /// JSON serialization or deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The referenced record does not exist.
    #[error("Record not found: {0}")]
    NotFound(String),

    /// Configuration or initialization error.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl StoreError {
    /// Returns true if this error is transient and the operation can be retried.
    pub fn is_transient(&self) -> bool {
        match self {
            StoreError::Http(e) => {
                if e.is_connect() || e.is_timeout() {
                    return true;
                }
                e.status().map(|s| s.is_server_error()).unwrap_or(false)
            }
            StoreError::Store { status, .. } => *status >= 500,
            _ => false,
        }
    }
}

/// Convenience Result type alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
