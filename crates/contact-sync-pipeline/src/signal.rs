//! Hand-off to the bridge's bulk message synchronization.

use crate::SyncResult;
use async_trait::async_trait;
use bridge_relay::{ConnectionHandle, OutboundFrame};

/// Tells the bridge to start its own bulk synchronization.
#[async_trait]
pub trait BulkSyncSignal: Send + Sync {
    async fn start_bulk_sync(&self) -> SyncResult<()>;
}

#[async_trait]
impl BulkSyncSignal for ConnectionHandle {
    async fn start_bulk_sync(&self) -> SyncResult<()> {
        self.send(OutboundFrame::FetchChats).await?;
        Ok(())
    }
}
