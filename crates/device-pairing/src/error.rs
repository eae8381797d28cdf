//! Pairing error types.

use bridge_relay::RelayError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PairingError {
    #[error("Phone number is required")]
    EmptyPhoneNumber,

    #[error("Pairing request failed: {0}")]
    Relay(#[from] RelayError),

    /// A newer submission replaced this one before it completed.
    #[error("Pairing request superseded by a newer submission")]
    Superseded,
}

pub type PairingResult<T> = Result<T, PairingError>;
