//! Key/value storage backends for the cache.

use crate::{CacheError, CacheResult};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Mutex;

/// Trait for cache storage backends.
pub trait CacheStorage: Send + Sync {
    /// Store a value
    fn set(&self, key: &str, value: &str) -> CacheResult<()>;

    /// Retrieve a value
    fn get(&self, key: &str) -> CacheResult<Option<String>>;

    /// Delete a value
    fn delete(&self, key: &str) -> CacheResult<bool>;

    /// Check if a key exists
    fn has(&self, key: &str) -> CacheResult<bool> {
        Ok(self.get(key)?.is_some())
    }
}

/// One file per key under a cache directory.
///
/// Writes go to a temporary file first and are renamed into place, so a
/// reader never observes a half-written value.
#[derive(Debug, Clone)]
pub struct FileCacheStorage {
    dir: PathBuf,
}

impl FileCacheStorage {
    pub fn new(dir: impl Into<PathBuf>) -> CacheResult<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    fn path_for(&self, key: &str) -> CacheResult<PathBuf> {
        let valid = !key.is_empty()
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.' | '@'))
            && !key.starts_with('.');
        if !valid {
            return Err(CacheError::InvalidKey(key.to_string()));
        }
        Ok(self.dir.join(key))
    }
}

impl CacheStorage for FileCacheStorage {
    fn set(&self, key: &str, value: &str) -> CacheResult<()> {
        let path = self.path_for(key)?;
        let tmp = self.dir.join(format!(".{}.tmp", key));
        std::fs::write(&tmp, value)?;
        std::fs::rename(&tmp, &path)?;
        Ok(())
    }

    fn get(&self, key: &str) -> CacheResult<Option<String>> {
        let path = self.path_for(key)?;
        match std::fs::read_to_string(&path) {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn delete(&self, key: &str) -> CacheResult<bool> {
        let path = self.path_for(key)?;
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}

/// In-memory storage.
#[derive(Debug, Default)]
pub struct MemoryCacheStorage {
    data: Mutex<HashMap<String, String>>,
}

impl MemoryCacheStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CacheStorage for MemoryCacheStorage {
    fn set(&self, key: &str, value: &str) -> CacheResult<()> {
        let mut data = self.data.lock().expect("lock poisoned");
        data.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn get(&self, key: &str) -> CacheResult<Option<String>> {
        let data = self.data.lock().expect("lock poisoned");
        Ok(data.get(key).cloned())
    }

    fn delete(&self, key: &str) -> CacheResult<bool> {
        let mut data = self.data.lock().expect("lock poisoned");
        Ok(data.remove(key).is_some())
    }
}
