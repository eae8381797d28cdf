//! Bridge protocol messages.

use serde::{Deserialize, Serialize};

/// Session status as reported by the bridge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BridgeStatus {
    Connecting,
    Qr,
    Authenticated,
    Ready,
    Disconnected,
    Error,
    /// Any status string this client does not know.
    #[serde(other)]
    Unknown,
}

impl BridgeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BridgeStatus::Connecting => "connecting",
            BridgeStatus::Qr => "qr",
            BridgeStatus::Authenticated => "authenticated",
            BridgeStatus::Ready => "ready",
            BridgeStatus::Disconnected => "disconnected",
            BridgeStatus::Error => "error",
            BridgeStatus::Unknown => "unknown",
        }
    }
}

/// A frame received on the persistent channel.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InboundFrame {
    /// Session status change.
    AuthStatus {
        status: BridgeStatus,
        #[serde(rename = "qrCode", default)]
        qr_code: Option<String>,
    },
    /// Frame types this client does not consume.
    #[serde(other)]
    Other,
}

impl InboundFrame {
    /// Parse from JSON text.
    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }
}

/// A frame sent on the persistent channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum OutboundFrame {
    /// Ask the bridge to run a bulk chat synchronization.
    FetchChats,
}

impl OutboundFrame {
    /// Serialize to JSON text.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// Response of the one-shot status probe.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct StatusReport {
    pub status: BridgeStatus,
    #[serde(rename = "qrCode", default)]
    pub qr_code: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct PairingCodeRequest<'a> {
    pub phone_number: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct PairingCodeResponse {
    pub pairing_code: String,
}
