//! Connection status as observed by the rest of the bootstrap.

use serde::{Deserialize, Serialize};

/// Status of the bridge session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionStatus {
    Disconnected,
    Connecting,
    /// A scannable pairing code is available.
    Qr,
    Authenticated,
    Ready,
    Error,
}

impl ConnectionStatus {
    /// Returns true once the device link is established.
    pub fn is_linked(&self) -> bool {
        matches!(self, ConnectionStatus::Authenticated | ConnectionStatus::Ready)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionStatus::Disconnected => "disconnected",
            ConnectionStatus::Connecting => "connecting",
            ConnectionStatus::Qr => "qr",
            ConnectionStatus::Authenticated => "authenticated",
            ConnectionStatus::Ready => "ready",
            ConnectionStatus::Error => "error",
        }
    }
}

impl std::fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Published view of the connection session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionSnapshot {
    pub status: ConnectionStatus,
    /// QR payload to display while `status == Qr`.
    pub qr_code: Option<String>,
    pub last_error: Option<String>,
    pub retries_remaining: u32,
    /// Raised on entering a linked status; consumed by the sync pipeline
    /// on its rising edge.
    pub should_sync: bool,
}

impl ConnectionSnapshot {
    pub fn new(retry_budget: u32) -> Self {
        Self {
            status: ConnectionStatus::Disconnected,
            qr_code: None,
            last_error: None,
            retries_remaining: retry_budget,
            should_sync: false,
        }
    }
}
