//! Pin derivation and write-back.
//!
//! A contact is pinned iff a pin marker exists for its chat. The stored
//! flag on the contact record is a denormalized copy; records whose copy is
//! missing the pin are repaired with a merge-write.

use contact_store_client::{ContactStore, StoreError};
use contact_types::{Contact, PinMarker};
use futures_util::future::join_all;
use std::collections::HashSet;
use tracing::{debug, warn};

/// Set each contact's `pinned` flag from `markers`.
///
/// Returns the ids of contacts that are pinned by a marker but were not
/// stored as pinned.
pub fn derive_pins(contacts: &mut [Contact], markers: &[PinMarker]) -> Vec<String> {
    let pinned_chats: HashSet<&str> = markers.iter().map(|m| m.chat_id.as_str()).collect();

    let mut repairs = Vec::new();
    for contact in contacts.iter_mut() {
        let derived = pinned_chats.contains(contact.chat_id.as_str());
        if derived && !contact.pinned {
            repairs.push(contact.id.clone());
        }
        contact.pinned = derived;
    }
    repairs
}

/// Outcome of one pin write-back.
#[derive(Debug)]
pub struct PinWrite {
    pub contact_id: String,
    pub result: Result<(), StoreError>,
}

/// Per-record results of a pin write-back batch.
///
/// Every write is attempted and awaited; a failed write neither aborts the
/// others nor is retried.
#[derive(Debug, Default)]
pub struct PinWriteReport {
    pub writes: Vec<PinWrite>,
}

impl PinWriteReport {
    pub fn attempted(&self) -> usize {
        self.writes.len()
    }

    pub fn succeeded(&self) -> usize {
        self.writes.iter().filter(|w| w.result.is_ok()).count()
    }

    pub fn failed(&self) -> impl Iterator<Item = &PinWrite> {
        self.writes.iter().filter(|w| w.result.is_err())
    }

    pub fn is_complete(&self) -> bool {
        self.writes.iter().all(|w| w.result.is_ok())
    }
}

/// Merge `pinned = true` onto every contact in `contact_ids`, concurrently.
pub async fn write_back_pins(
    store: &dyn ContactStore,
    tenant_id: &str,
    contact_ids: Vec<String>,
) -> PinWriteReport {
    let writes = contact_ids.into_iter().map(|contact_id| async move {
        let result = store.merge_contact_pinned(tenant_id, &contact_id, true).await;
        PinWrite { contact_id, result }
    });

    let report = PinWriteReport {
        writes: join_all(writes).await,
    };

    for write in report.failed() {
        if let Err(e) = &write.result {
            warn!(contact_id = %write.contact_id, error = %e, "Pin write-back failed");
        }
    }
    debug!(
        attempted = report.attempted(),
        succeeded = report.succeeded(),
        "Pin write-back finished"
    );
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use contact_store_client::MemoryContactStore;
    use serde_json::json;

    #[test]
    fn test_marker_pins_contact_and_requests_repair() {
        let mut contacts = vec![Contact::new("C", "chat-c"), Contact::new("D", "chat-d")];
        let markers = vec![PinMarker::new("m1", "chat-c")];

        let repairs = derive_pins(&mut contacts, &markers);

        assert_eq!(repairs, vec!["C".to_string()]);
        assert!(contacts[0].pinned);
        assert!(!contacts[1].pinned);
    }

    #[test]
    fn test_already_pinned_contact_needs_no_repair() {
        let mut contact = Contact::new("C", "chat-c");
        contact.pinned = true;
        let mut contacts = vec![contact];

        let repairs = derive_pins(&mut contacts, &[PinMarker::new("m1", "chat-c")]);
        assert!(repairs.is_empty());
        assert!(contacts[0].pinned);
    }

    #[test]
    fn test_marker_is_authoritative_over_stale_flag() {
        let mut contact = Contact::new("C", "chat-c");
        contact.pinned = true;
        let mut contacts = vec![contact];

        let repairs = derive_pins(&mut contacts, &[]);
        assert!(repairs.is_empty());
        assert!(!contacts[0].pinned);
    }

    #[tokio::test]
    async fn test_partial_failure_does_not_abort_batch() {
        let store = MemoryContactStore::new();
        for id in ["a", "b", "c"] {
            store.insert_contact("t1", json!({ "id": id, "chatId": format!("chat-{}", id) }));
        }
        store.fail_writes_for("b");

        let report = write_back_pins(
            &store,
            "t1",
            vec!["a".to_string(), "b".to_string(), "c".to_string()],
        )
        .await;

        assert_eq!(report.attempted(), 3);
        assert_eq!(report.succeeded(), 2);
        assert!(!report.is_complete());
        let failed: Vec<&str> = report.failed().map(|w| w.contact_id.as_str()).collect();
        assert_eq!(failed, vec!["b"]);
        assert_eq!(store.merge_writes().len(), 3);
    }
}
