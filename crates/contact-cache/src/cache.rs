//! Per-user contact bundle cache.

use crate::codec::{decode_bundle, encode_bundle};
use crate::{CacheKeys, CacheResult, CacheStorage};
use chrono::{DateTime, Utc};
use contact_types::ContactBundle;
use std::time::Duration;
use tracing::{debug, warn};

/// Auxiliary flags stored next to the bundle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CachedFlags {
    pub contacts_fetched: bool,
    pub captured_at: Option<DateTime<Utc>>,
}

/// Compressed contact bundle cache keyed by user.
pub struct ContactCache {
    storage: Box<dyn CacheStorage>,
}

impl ContactCache {
    pub fn new(storage: Box<dyn CacheStorage>) -> Self {
        Self { storage }
    }

    /// Persist `bundle` for `user_id` and raise the "contacts fetched" flag.
    ///
    /// The bundle is written before the flags so a crash in between leaves
    /// the previous flags pointing at valid data.
    pub fn store(&self, user_id: &str, bundle: &ContactBundle) -> CacheResult<()> {
        let encoded = encode_bundle(bundle)?;
        self.storage.set(&CacheKeys::contacts(user_id), &encoded)?;
        self.storage
            .set(&CacheKeys::captured_at(user_id), &bundle.captured_at.to_rfc3339())?;
        self.storage
            .set(&CacheKeys::contacts_fetched(user_id), "true")?;

        debug!(
            user_id,
            contacts = bundle.len(),
            bytes = encoded.len(),
            "Cached contact bundle"
        );
        Ok(())
    }

    /// Load the cached bundle, if any.
    pub fn load(&self, user_id: &str) -> CacheResult<Option<ContactBundle>> {
        match self.storage.get(&CacheKeys::contacts(user_id))? {
            Some(encoded) => Ok(Some(decode_bundle(&encoded)?)),
            None => Ok(None),
        }
    }

    /// Load the cached bundle only if the "contacts fetched" flag is set and
    /// the capture timestamp is no older than `max_age` at `now`.
    ///
    /// A corrupt entry is treated as a miss.
    pub fn load_fresh(
        &self,
        user_id: &str,
        max_age: Duration,
        now: DateTime<Utc>,
    ) -> CacheResult<Option<ContactBundle>> {
        let flags = self.flags(user_id)?;
        let Some(captured_at) = flags.captured_at else {
            return Ok(None);
        };
        if !flags.contacts_fetched {
            return Ok(None);
        }

        let probe = ContactBundle::new(Vec::new(), captured_at);
        if !probe.is_fresh_at(now, max_age) {
            debug!(user_id, %captured_at, "Cached bundle is stale");
            return Ok(None);
        }

        match self.load(user_id) {
            Ok(bundle) => Ok(bundle),
            Err(err) => {
                warn!(user_id, error = %err, "Discarding unreadable cached bundle");
                Ok(None)
            }
        }
    }

    /// Read the auxiliary flags.
    pub fn flags(&self, user_id: &str) -> CacheResult<CachedFlags> {
        let contacts_fetched = self
            .storage
            .get(&CacheKeys::contacts_fetched(user_id))?
            .map(|v| v.trim() == "true")
            .unwrap_or(false);

        let captured_at = self
            .storage
            .get(&CacheKeys::captured_at(user_id))?
            .and_then(|raw| DateTime::parse_from_rfc3339(raw.trim()).ok())
            .map(|ts| ts.with_timezone(&Utc));

        Ok(CachedFlags {
            contacts_fetched,
            captured_at,
        })
    }

    /// Remove everything cached for `user_id`.
    pub fn clear(&self, user_id: &str) -> CacheResult<()> {
        for key in CacheKeys::all(user_id) {
            self.storage.delete(&key)?;
        }
        debug!(user_id, "Cleared contact cache");
        Ok(())
    }
}

impl std::fmt::Debug for ContactCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContactCache").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{FileCacheStorage, MemoryCacheStorage};
    use contact_types::Contact;
    use tempfile::tempdir;

    fn ts(raw: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(raw).unwrap().with_timezone(&Utc)
    }

    fn bundle_at(raw: &str) -> ContactBundle {
        ContactBundle::new(
            vec![Contact::new("b", "chat-b"), Contact::new("a", "chat-a")],
            ts(raw),
        )
    }

    #[test]
    fn test_store_sets_flags_and_preserves_order() {
        let cache = ContactCache::new(Box::new(MemoryCacheStorage::new()));
        let bundle = bundle_at("2024-05-01T10:00:00Z");

        cache.store("u1", &bundle).unwrap();

        let flags = cache.flags("u1").unwrap();
        assert!(flags.contacts_fetched);
        assert_eq!(flags.captured_at, Some(ts("2024-05-01T10:00:00Z")));

        let loaded = cache.load("u1").unwrap().unwrap();
        let ids: Vec<&str> = loaded.contacts.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["b", "a"]);
    }

    #[test]
    fn test_load_fresh_respects_max_age() {
        let cache = ContactCache::new(Box::new(MemoryCacheStorage::new()));
        cache.store("u1", &bundle_at("2024-05-01T10:00:00Z")).unwrap();

        let max_age = Duration::from_secs(300);
        assert!(cache
            .load_fresh("u1", max_age, ts("2024-05-01T10:04:00Z"))
            .unwrap()
            .is_some());
        assert!(cache
            .load_fresh("u1", max_age, ts("2024-05-01T10:06:00Z"))
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_load_fresh_without_entry_is_miss() {
        let cache = ContactCache::new(Box::new(MemoryCacheStorage::new()));
        assert!(cache
            .load_fresh("nobody", Duration::from_secs(300), Utc::now())
            .unwrap()
            .is_none());
        assert_eq!(
            cache.flags("nobody").unwrap(),
            CachedFlags {
                contacts_fetched: false,
                captured_at: None
            }
        );
    }

    #[test]
    fn test_corrupt_bundle_is_a_miss_for_load_fresh() {
        let storage = MemoryCacheStorage::new();
        storage.set(&CacheKeys::contacts("u1"), "z1:garbage").unwrap();
        storage
            .set(&CacheKeys::captured_at("u1"), &Utc::now().to_rfc3339())
            .unwrap();
        storage.set(&CacheKeys::contacts_fetched("u1"), "true").unwrap();
        let cache = ContactCache::new(Box::new(storage));

        assert!(cache.load("u1").is_err());
        assert!(cache
            .load_fresh("u1", Duration::from_secs(300), Utc::now())
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_clear_removes_all_keys_on_disk() {
        let dir = tempdir().unwrap();
        let cache = ContactCache::new(Box::new(FileCacheStorage::new(dir.path()).unwrap()));
        cache.store("u1", &bundle_at("2024-05-01T10:00:00Z")).unwrap();
        cache.store("u2", &bundle_at("2024-05-01T10:00:00Z")).unwrap();

        cache.clear("u1").unwrap();

        assert!(cache.load("u1").unwrap().is_none());
        assert!(!cache.flags("u1").unwrap().contacts_fetched);
        assert!(cache.load("u2").unwrap().is_some());
    }
}
