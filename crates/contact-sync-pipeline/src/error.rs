//! Synchronization error types.

use bridge_relay::RelayError;
use contact_cache::CacheError;
use contact_store_client::StoreError;
use session_state::SyncPhase;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SyncError {
    #[error("Contact store error: {0}")]
    Store(#[from] StoreError),

    /// A contact record could not be parsed. Records before it were kept.
    #[error("Malformed contact record #{index}: {source}")]
    MalformedDocument {
        index: usize,
        id: Option<String>,
        #[source]
        source: serde_json::Error,
    },

    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),

    #[error("Bulk sync signal failed: {0}")]
    Signal(#[from] RelayError),

    #[error("Invalid phase transition from {from} to {to}")]
    PhaseOrder { from: SyncPhase, to: SyncPhase },

    #[error("Background task failed: {0}")]
    Task(String),

    #[error("Session disposed")]
    Disposed,
}

pub type SyncResult<T> = Result<T, SyncError>;
