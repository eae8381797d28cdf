//! Bootstrap error types.

use bridge_relay::RelayError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BootstrapError {
    /// The session is not linked to a user and tenant. The bootstrap
    /// returns to the login route.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Bridge error: {0}")]
    Relay(#[from] RelayError),
}

pub type BootstrapResult<T> = Result<T, BootstrapError>;
