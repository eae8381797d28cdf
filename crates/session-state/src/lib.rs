//! Shared state for one bootstrap session.
//!
//! Each field has exactly one writer component:
//!
//! | Field | Writer |
//! |---|---|
//! | [`ConnectionSnapshot`] | connection lifecycle manager |
//! | [`SyncProgress`] + contacts view | synchronization pipeline |
//! | loading flag | bootstrap session |
//! | user notice | any component (last writer wins) |
//!
//! Writers are distinct handle types handed out once by [`SessionState::new`],
//! so a component cannot write a field it does not own. Readers observe the
//! state through `tokio::sync::watch` receivers. Every writer becomes a
//! no-op once the session's [`SessionLifetime`] is disposed.

mod connection;
mod lifetime;
mod state;
mod sync;

pub use connection::{ConnectionSnapshot, ConnectionStatus};
pub use lifetime::SessionLifetime;
pub use state::{
    ConnectionWriter, ContactsWriter, LoadingWriter, NoticeWriter, SessionState, SessionWriters,
    SyncWriter,
};
pub use sync::{SyncPhase, SyncProgress};
