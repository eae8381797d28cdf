//! Relay error types.

use thiserror::Error;

/// Relay error type.
#[derive(Error, Debug)]
pub enum RelayError {
    /// WebSocket error
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// HTTP request error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The bridge answered with a non-success status
    #[error("Bridge error: {status} - {message}")]
    Bridge { status: u16, message: String },

    /// Connection error
    #[error("Connection error: {0}")]
    Connection(String),

    /// Not connected error
    #[error("Not connected to bridge")]
    NotConnected,

    /// The connection manager has been torn down
    #[error("Connection manager stopped")]
    Stopped,

    /// Inbound frame could not be decoded
    #[error("Malformed frame: {0}")]
    MalformedFrame(String),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// URL parse error
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// Send error
    #[error("Failed to send message: {0}")]
    Send(String),
}

impl RelayError {
    /// Returns true for transport-level failures that the retry loop may
    /// recover from.
    pub fn is_transient(&self) -> bool {
        match self {
            RelayError::WebSocket(_)
            | RelayError::Connection(_)
            | RelayError::NotConnected
            | RelayError::Send(_) => true,
            RelayError::Http(e) => {
                if e.is_connect() || e.is_timeout() {
                    return true;
                }
                e.status().map(|s| s.is_server_error()).unwrap_or(false)
            }
            RelayError::Bridge { status, .. } => *status >= 500,
            _ => false,
        }
    }
}

/// Result type alias using RelayError.
pub type RelayResult<T> = Result<T, RelayError>;
