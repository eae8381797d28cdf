//! Disposal signal shared by every task of a bootstrap session.

use std::sync::Arc;
use tokio::sync::watch;

/// Cancellation handle for one bootstrap session.
///
/// Once disposed it stays disposed. Tasks select on [`SessionLifetime::disposed`]
/// and writers consult [`SessionLifetime::is_disposed`] before publishing.
#[derive(Debug, Clone)]
pub struct SessionLifetime {
    tx: Arc<watch::Sender<bool>>,
}

impl SessionLifetime {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    /// Mark the session disposed and wake every waiter.
    pub fn dispose(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_disposed(&self) -> bool {
        *self.tx.borrow()
    }

    /// Resolves once the session is disposed.
    pub async fn disposed(&self) {
        let mut rx = self.tx.subscribe();
        // The sender lives in `self`, so the channel cannot close while we wait.
        let _ = rx.wait_for(|disposed| *disposed).await;
    }
}

impl Default for SessionLifetime {
    fn default() -> Self {
        Self::new()
    }
}
