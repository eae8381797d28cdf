//! # Bootstrap Lifecycle
//!
//! Wires the bootstrap together after sign-in:
//!
//! ```text
//! ConnectionManager ──(should_sync)──► SyncSupervisor ──► SyncPipeline
//!        │                                                    │
//!        └────────────── SessionState (watch) ◄───────────────┘
//!                               │
//!                        ReadinessGate ──► Navigator (Route::Main, once)
//! ```
//!
//! Components never call each other directly; they meet in the shared
//! [`SessionState`](session_state::SessionState).

mod error;
mod gate;
mod navigator;
mod session;

pub use error::{BootstrapError, BootstrapResult};
pub use gate::{
    should_navigate, GateConfig, GateHandle, ReadinessGate, ReadinessInput, ReadinessMachine,
    ReadinessState,
};
pub use navigator::{ChannelNavigator, Navigator, Route};
pub use session::{BootstrapConfig, BootstrapDeps, BootstrapSession};
