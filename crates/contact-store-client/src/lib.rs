//! Contact store client.
//!
//! Bulk reads of contact records for a tenant, bulk reads of pin markers
//! for a user, and per-record merge-writes of the derived `pinned` flag.
//!
//! # Architecture
//!
//! ```text
//! Sync pipeline → ContactStore (trait) → RestContactStore → store REST API
//!                                      └ MemoryContactStore (offline / tests)
//! ```

mod client;
mod error;
mod memory;

pub use client::{RestContactStore, StoreCredentials};
pub use error::{StoreError, StoreResult};
pub use memory::MemoryContactStore;

use async_trait::async_trait;
use contact_types::PinMarker;

/// Raw contact document as stored remotely. Parsed by the sync pipeline so
/// that malformed records surface as data errors with partial progress.
pub type ContactDocument = serde_json::Value;

/// Typed accessor over the remote per-tenant document store.
#[async_trait]
pub trait ContactStore: Send + Sync {
    /// Fetch every contact document for a tenant.
    async fn fetch_contacts(&self, tenant_id: &str) -> StoreResult<Vec<ContactDocument>>;

    /// Fetch every pin marker owned by a user.
    async fn fetch_pin_markers(&self, user_id: &str) -> StoreResult<Vec<PinMarker>>;

    /// Merge-write the derived `pinned` flag onto one contact record.
    async fn merge_contact_pinned(
        &self,
        tenant_id: &str,
        contact_id: &str,
        pinned: bool,
    ) -> StoreResult<()>;
}
