//! Cache key layout.
//!
//! Keys are `contacts.<slot>.<user_id>`. The slot names contain no `.`, so
//! two different (slot, user) pairs never produce the same key.

/// Cache keys, one set per user.
pub struct CacheKeys;

impl CacheKeys {
    /// Compressed serialized contact bundle.
    pub fn contacts(user_id: &str) -> String {
        format!("contacts.bundle.{}", user_id)
    }

    /// "contacts fetched" flag.
    pub fn contacts_fetched(user_id: &str) -> String {
        format!("contacts.fetched.{}", user_id)
    }

    /// Capture timestamp (RFC 3339).
    pub fn captured_at(user_id: &str) -> String {
        format!("contacts.captured_at.{}", user_id)
    }

    /// All keys owned by a user.
    pub fn all(user_id: &str) -> [String; 3] {
        [
            Self::contacts(user_id),
            Self::contacts_fetched(user_id),
            Self::captured_at(user_id),
        ]
    }
}
