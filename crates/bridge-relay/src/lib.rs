//! # Bridge Relay
//!
//! Connection lifecycle for the messaging bridge.
//!
//! The [`ConnectionManager`] opens one persistent channel per (user, tenant)
//! pair, follows the session status the bridge pushes (pairing code, linked,
//! ready), and reconnects after failures on a fixed delay until the retry
//! budget is spent. It is the only writer of the session's
//! [`ConnectionSnapshot`](session_state::ConnectionSnapshot).
//!
//! [`BridgeApi`] covers the one-shot HTTP calls: the startup status probe
//! and the phone-number pairing code request.

mod api;
mod connector;
mod error;
mod lifecycle;
mod manager;
mod messages;

pub use api::{BridgeApi, BridgeHttpClient};
pub use connector::{BridgeChannel, BridgeConnector, WebSocketConnector};
pub use error::{RelayError, RelayResult};
pub use lifecycle::{
    ConnectionLifecycle, ConnectionMachine, ConnectionMachineInput, ConnectionMachineState,
    LifecycleEvent, StatusSource,
};
pub use manager::{ChannelConfig, ConnectionHandle, ConnectionManager, RetryPolicy};
pub use messages::{BridgeStatus, InboundFrame, OutboundFrame, StatusReport};
