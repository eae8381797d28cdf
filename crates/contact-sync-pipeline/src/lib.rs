//! # Contact Sync Pipeline
//!
//! Multi-phase synchronization of a user's contacts, started when the
//! bridge session becomes linked:
//!
//! 1. `fetching_contacts`: read every contact record for the tenant
//! 2. `processing_pinned`: read the user's pin markers
//! 3. `updating_pins`: derive `pinned` from the markers and write missing
//!    flags back to the store
//! 4. `sorting_contacts`: pinned first, then most recent activity first
//! 5. `caching`: compress and persist the ordered bundle
//! 6. `complete`: ask the bridge to start its bulk chat synchronization
//!
//! [`SyncSupervisor`] owns the pipeline and starts a run on every rising
//! edge of the connection's `should_sync` flag.

mod error;
mod phase;
mod pins;
mod pipeline;
mod signal;
mod sort;
mod supervisor;

pub use error::{SyncError, SyncResult};
pub use pins::{derive_pins, write_back_pins, PinWrite, PinWriteReport};
pub use pipeline::{CachePolicy, SyncPipeline, SyncReport};
pub use signal::BulkSyncSignal;
pub use sort::sort_contacts;
pub use supervisor::{ResyncOutcome, SyncSupervisor};
