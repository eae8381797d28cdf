//! Device pairing by phone number.
//!
//! The user submits a phone number, the bridge answers with a numeric
//! pairing code to type into the phone. Only the latest submission is
//! tracked; the result of an older one is dropped when it arrives.

mod controller;
mod error;

pub use controller::{PairingAttempt, PairingController};
pub use error::{PairingError, PairingResult};
