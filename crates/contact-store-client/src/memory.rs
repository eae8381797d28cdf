//! In-process contact store, used for offline runs and tests.

use crate::error::{StoreError, StoreResult};
use crate::{ContactDocument, ContactStore};
use async_trait::async_trait;
use contact_types::PinMarker;
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

#[derive(Debug, Default)]
struct Inner {
    contacts: HashMap<String, Vec<ContactDocument>>,
    pin_markers: HashMap<String, Vec<PinMarker>>,
    merge_writes: Vec<(String, bool)>,
    failing_writes: HashSet<String>,
    fail_contact_fetch: bool,
}

/// Contact store kept in memory.
///
/// Documents are stored as raw JSON so malformed records can be modeled.
/// Merge-writes are recorded in order and applied to the stored document.
#[derive(Debug, Default)]
pub struct MemoryContactStore {
    inner: Mutex<Inner>,
}

impl MemoryContactStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_contact(&self, tenant_id: &str, document: ContactDocument) {
        let mut inner = self.inner.lock().expect("lock poisoned");
        inner
            .contacts
            .entry(tenant_id.to_string())
            .or_default()
            .push(document);
    }

    pub fn insert_pin_marker(&self, user_id: &str, marker: PinMarker) {
        let mut inner = self.inner.lock().expect("lock poisoned");
        inner
            .pin_markers
            .entry(user_id.to_string())
            .or_default()
            .push(marker);
    }

    /// Make every merge-write for `contact_id` fail.
    pub fn fail_writes_for(&self, contact_id: &str) {
        let mut inner = self.inner.lock().expect("lock poisoned");
        inner.failing_writes.insert(contact_id.to_string());
    }

    /// Make contact fetches fail with a server error.
    pub fn set_fail_contact_fetch(&self, fail: bool) {
        self.inner.lock().expect("lock poisoned").fail_contact_fetch = fail;
    }

    /// Merge-writes issued so far, as `(contact_id, pinned)`.
    pub fn merge_writes(&self) -> Vec<(String, bool)> {
        self.inner.lock().expect("lock poisoned").merge_writes.clone()
    }
}

#[async_trait]
impl ContactStore for MemoryContactStore {
    async fn fetch_contacts(&self, tenant_id: &str) -> StoreResult<Vec<ContactDocument>> {
        let inner = self.inner.lock().expect("lock poisoned");
        if inner.fail_contact_fetch {
            return Err(StoreError::Store {
                status: 503,
                message: "contact store unavailable".to_string(),
            });
        }
        Ok(inner.contacts.get(tenant_id).cloned().unwrap_or_default())
    }

    async fn fetch_pin_markers(&self, user_id: &str) -> StoreResult<Vec<PinMarker>> {
        let inner = self.inner.lock().expect("lock poisoned");
        Ok(inner.pin_markers.get(user_id).cloned().unwrap_or_default())
    }

    async fn merge_contact_pinned(
        &self,
        tenant_id: &str,
        contact_id: &str,
        pinned: bool,
    ) -> StoreResult<()> {
        let mut inner = self.inner.lock().expect("lock poisoned");
        inner.merge_writes.push((contact_id.to_string(), pinned));

        if inner.failing_writes.contains(contact_id) {
            return Err(StoreError::Store {
                status: 500,
                message: format!("write rejected for {}", contact_id),
            });
        }

        let document = inner
            .contacts
            .get_mut(tenant_id)
            .and_then(|docs| {
                docs.iter_mut()
                    .find(|doc| doc.get("id").and_then(|v| v.as_str()) == Some(contact_id))
            })
            .ok_or_else(|| StoreError::NotFound(contact_id.to_string()))?;

        document["pinned"] = serde_json::Value::Bool(pinned);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_merge_write_updates_document() {
        let store = MemoryContactStore::new();
        store.insert_contact("t1", json!({ "id": "c1", "chatId": "chat-1" }));

        store.merge_contact_pinned("t1", "c1", true).await.unwrap();

        let docs = store.fetch_contacts("t1").await.unwrap();
        assert_eq!(docs[0]["pinned"], json!(true));
        assert_eq!(store.merge_writes(), vec![("c1".to_string(), true)]);
    }

    #[tokio::test]
    async fn test_merge_write_unknown_contact_is_not_found() {
        let store = MemoryContactStore::new();
        let err = store.merge_contact_pinned("t1", "nope", true).await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_failing_write_is_recorded() {
        let store = MemoryContactStore::new();
        store.insert_contact("t1", json!({ "id": "c1", "chatId": "chat-1" }));
        store.fail_writes_for("c1");

        assert!(store.merge_contact_pinned("t1", "c1", true).await.is_err());
        assert_eq!(store.merge_writes().len(), 1);
    }

    #[tokio::test]
    async fn test_pin_markers_are_scoped_by_user() {
        let store = MemoryContactStore::new();
        store.insert_pin_marker("u1", PinMarker::new("p1", "chat-1"));

        assert_eq!(store.fetch_pin_markers("u1").await.unwrap().len(), 1);
        assert!(store.fetch_pin_markers("u2").await.unwrap().is_empty());
    }
}
