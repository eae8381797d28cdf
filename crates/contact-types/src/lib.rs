//! Contact model shared by the store client, the local cache and the sync
//! pipeline.
//!
//! Contacts are created server-side. The console only reads them and
//! repairs the denormalized `pinned` flag from the authoritative
//! [`PinMarker`] records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeSet;
use std::time::Duration;

/// Store documents write `null` where a field was never set.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

#[derive(Deserialize)]
#[serde(untagged)]
enum EpochValue {
    Whole(i64),
    Fractional(f64),
}

/// Epoch seconds as an integer or a float. Fractions are truncated.
fn epoch_seconds<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<EpochValue>::deserialize(deserializer)? {
        Some(EpochValue::Whole(secs)) => Ok(Some(secs)),
        Some(EpochValue::Fractional(secs)) if secs.is_finite() => Ok(Some(secs.trunc() as i64)),
        Some(EpochValue::Fractional(_)) | None => Ok(None),
    }
}

/// Summary of the last message exchanged with a contact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LastMessage {
    #[serde(default, deserialize_with = "null_as_default")]
    pub text: String,
    /// ISO-8601 creation time, preferred when present and parseable.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    /// Epoch seconds, used when no ISO creation time is available.
    #[serde(
        default,
        deserialize_with = "epoch_seconds",
        skip_serializing_if = "Option::is_none"
    )]
    pub timestamp: Option<i64>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub from_me: bool,
}

impl LastMessage {
    /// Best available timestamp: ISO creation time, then epoch seconds.
    pub fn best_timestamp(&self) -> Option<DateTime<Utc>> {
        self.created_at
            .as_deref()
            .and_then(|raw| DateTime::parse_from_rfc3339(raw).ok())
            .map(|parsed| parsed.with_timezone(&Utc))
            .or_else(|| {
                self.timestamp
                    .and_then(|secs| DateTime::<Utc>::from_timestamp(secs, 0))
            })
    }
}

/// A remote conversation partner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Contact {
    pub id: String,
    pub chat_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_message: Option<LastMessage>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub tags: BTreeSet<String>,
    /// Derived from pin markers; never authoritative.
    #[serde(default, deserialize_with = "null_as_default")]
    pub pinned: bool,
    #[serde(default, deserialize_with = "null_as_default")]
    pub unread_count: u32,
}

impl Contact {
    /// Create a contact with no message history.
    pub fn new(id: impl Into<String>, chat_id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            chat_id: chat_id.into(),
            last_message: None,
            tags: BTreeSet::new(),
            pinned: false,
            unread_count: 0,
        }
    }

    /// Attach a last-message summary.
    pub fn with_last_message(mut self, last_message: LastMessage) -> Self {
        self.last_message = Some(last_message);
        self
    }

    /// Parse a raw store document.
    pub fn from_document(document: serde_json::Value) -> Result<Self, serde_json::Error> {
        serde_json::from_value(document)
    }

    /// Timestamp used for recency ordering; the Unix epoch when the contact
    /// has no usable message time.
    pub fn effective_timestamp(&self) -> DateTime<Utc> {
        self.last_message
            .as_ref()
            .and_then(LastMessage::best_timestamp)
            .unwrap_or_default()
    }
}

/// Per-user record whose existence means "this chat is pinned".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PinMarker {
    pub id: String,
    pub chat_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pinned_at: Option<String>,
}

impl PinMarker {
    pub fn new(id: impl Into<String>, chat_id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            chat_id: chat_id.into(),
            pinned_at: None,
        }
    }
}

/// Cached, pre-sorted snapshot of a user's contacts.
///
/// The ordering is exactly the pipeline's display order at capture time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContactBundle {
    pub captured_at: DateTime<Utc>,
    pub contacts: Vec<Contact>,
}

impl ContactBundle {
    pub fn new(contacts: Vec<Contact>, captured_at: DateTime<Utc>) -> Self {
        Self {
            captured_at,
            contacts,
        }
    }

    /// Bundle captured now.
    pub fn capture(contacts: Vec<Contact>) -> Self {
        Self::new(contacts, Utc::now())
    }

    /// Whether the bundle is no older than `max_age` at `now`.
    ///
    /// Bundles stamped in the future (clock skew) count as fresh.
    pub fn is_fresh_at(&self, now: DateTime<Utc>, max_age: Duration) -> bool {
        match (now - self.captured_at).to_std() {
            Ok(age) => age <= max_age,
            Err(_) => true,
        }
    }

    pub fn len(&self) -> usize {
        self.contacts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.contacts.is_empty()
    }
}
