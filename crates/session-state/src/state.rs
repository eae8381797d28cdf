//! The session state container and its writer handles.

use crate::{ConnectionSnapshot, SessionLifetime, SyncProgress};
use contact_types::Contact;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::debug;

/// Read side of the session state. Cheap to clone.
#[derive(Debug, Clone)]
pub struct SessionState {
    connection: watch::Receiver<ConnectionSnapshot>,
    sync: watch::Receiver<SyncProgress>,
    loading: watch::Receiver<bool>,
    contacts: watch::Receiver<Arc<Vec<Contact>>>,
    notice: watch::Receiver<Option<String>>,
    lifetime: SessionLifetime,
}

/// Write side of the session state, one handle per owning component.
#[derive(Debug)]
pub struct SessionWriters {
    pub connection: ConnectionWriter,
    pub sync: SyncWriter,
    pub contacts: ContactsWriter,
    pub loading: LoadingWriter,
    pub notice: NoticeWriter,
}

impl SessionState {
    /// Create a fresh session. `loading` starts true and is cleared by the
    /// bootstrap once its first render inputs are resolved.
    pub fn new(retry_budget: u32) -> (Self, SessionWriters) {
        let lifetime = SessionLifetime::new();
        let (connection_tx, connection) = watch::channel(ConnectionSnapshot::new(retry_budget));
        let (sync_tx, sync) = watch::channel(SyncProgress::default());
        let (loading_tx, loading) = watch::channel(true);
        let (contacts_tx, contacts) = watch::channel(Arc::new(Vec::new()));
        let (notice_tx, notice) = watch::channel(None);

        let state = Self {
            connection,
            sync,
            loading,
            contacts,
            notice,
            lifetime: lifetime.clone(),
        };

        let writers = SessionWriters {
            connection: ConnectionWriter {
                tx: connection_tx,
                lifetime: lifetime.clone(),
            },
            sync: SyncWriter {
                tx: sync_tx,
                lifetime: lifetime.clone(),
            },
            contacts: ContactsWriter {
                tx: contacts_tx,
                lifetime: lifetime.clone(),
            },
            loading: LoadingWriter {
                tx: loading_tx,
                lifetime: lifetime.clone(),
            },
            notice: NoticeWriter {
                tx: Arc::new(notice_tx),
                lifetime,
            },
        };

        (state, writers)
    }

    pub fn lifetime(&self) -> &SessionLifetime {
        &self.lifetime
    }

    pub fn connection(&self) -> ConnectionSnapshot {
        self.connection.borrow().clone()
    }

    pub fn sync(&self) -> SyncProgress {
        self.sync.borrow().clone()
    }

    pub fn is_loading(&self) -> bool {
        *self.loading.borrow()
    }

    pub fn contacts(&self) -> Arc<Vec<Contact>> {
        self.contacts.borrow().clone()
    }

    /// Most recent user-visible error, if any.
    pub fn notice(&self) -> Option<String> {
        self.notice.borrow().clone()
    }

    pub fn watch_connection(&self) -> watch::Receiver<ConnectionSnapshot> {
        self.connection.clone()
    }

    pub fn watch_sync(&self) -> watch::Receiver<SyncProgress> {
        self.sync.clone()
    }

    pub fn watch_loading(&self) -> watch::Receiver<bool> {
        self.loading.clone()
    }

    pub fn watch_contacts(&self) -> watch::Receiver<Arc<Vec<Contact>>> {
        self.contacts.clone()
    }

    pub fn watch_notice(&self) -> watch::Receiver<Option<String>> {
        self.notice.clone()
    }
}

/// Publish `value` through `tx` unless the session is disposed.
///
/// Receivers are only woken when the value actually changes.
fn publish<T, F>(tx: &watch::Sender<T>, lifetime: &SessionLifetime, field: &str, update: F) -> bool
where
    T: Clone + PartialEq,
    F: FnOnce(&mut T),
{
    if lifetime.is_disposed() {
        debug!(field, "Dropping state write after disposal");
        return false;
    }
    tx.send_if_modified(|current| {
        let before = current.clone();
        update(current);
        *current != before
    });
    true
}

/// Sole writer of [`ConnectionSnapshot`].
#[derive(Debug)]
pub struct ConnectionWriter {
    tx: watch::Sender<ConnectionSnapshot>,
    lifetime: SessionLifetime,
}

impl ConnectionWriter {
    /// Apply `update` to the snapshot. Returns false when the write was
    /// suppressed because the session is disposed.
    pub fn update(&self, update: impl FnOnce(&mut ConnectionSnapshot)) -> bool {
        publish(&self.tx, &self.lifetime, "connection", update)
    }

    pub fn snapshot(&self) -> ConnectionSnapshot {
        self.tx.borrow().clone()
    }

    pub fn lifetime(&self) -> &SessionLifetime {
        &self.lifetime
    }
}

/// Sole writer of [`SyncProgress`].
#[derive(Debug)]
pub struct SyncWriter {
    tx: watch::Sender<SyncProgress>,
    lifetime: SessionLifetime,
}

impl SyncWriter {
    pub fn update(&self, update: impl FnOnce(&mut SyncProgress)) -> bool {
        publish(&self.tx, &self.lifetime, "sync", update)
    }

    pub fn snapshot(&self) -> SyncProgress {
        self.tx.borrow().clone()
    }

    pub fn lifetime(&self) -> &SessionLifetime {
        &self.lifetime
    }
}

/// Sole writer of the contacts view.
#[derive(Debug)]
pub struct ContactsWriter {
    tx: watch::Sender<Arc<Vec<Contact>>>,
    lifetime: SessionLifetime,
}

impl ContactsWriter {
    pub fn replace(&self, contacts: Vec<Contact>) -> bool {
        if self.lifetime.is_disposed() {
            debug!(field = "contacts", "Dropping state write after disposal");
            return false;
        }
        self.tx.send_replace(Arc::new(contacts));
        true
    }
}

/// Sole writer of the first-render loading flag.
#[derive(Debug)]
pub struct LoadingWriter {
    tx: watch::Sender<bool>,
    lifetime: SessionLifetime,
}

impl LoadingWriter {
    pub fn set(&self, loading: bool) -> bool {
        publish(&self.tx, &self.lifetime, "loading", |current| *current = loading)
    }
}

/// Writer of the single most-recent user-visible error.
///
/// Shared by every component: a later error replaces an earlier one and a
/// later success clears it.
#[derive(Debug, Clone)]
pub struct NoticeWriter {
    tx: Arc<watch::Sender<Option<String>>>,
    lifetime: SessionLifetime,
}

impl NoticeWriter {
    pub fn error(&self, message: impl Into<String>) -> bool {
        let message = message.into();
        publish(&self.tx, &self.lifetime, "notice", |current| {
            *current = Some(message)
        })
    }

    pub fn clear(&self) -> bool {
        publish(&self.tx, &self.lifetime, "notice", |current| *current = None)
    }
}
