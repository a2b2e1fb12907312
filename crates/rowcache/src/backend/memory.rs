//! In-process backend with per-entry expiry.
//!
//! Used by tests and local development; behaves like the Redis contract
//! for the operations the cache store relies on, including `-2`/`-1` TTL
//! codes, wrong-shape errors, and hashes disappearing once their last
//! field is deleted.

use super::CacheBackend;
use async_trait::async_trait;
use rowcache_core::{RowCacheError, RowCacheResult};
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

enum Slot {
    Value(String),
    Hash(HashMap<String, String>),
}

struct Entry {
    slot: Slot,
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_expired(&self) -> bool {
        self.expires_at.is_some_and(|at| Instant::now() >= at)
    }
}

/// In-memory key-value backend.
#[derive(Default)]
pub struct MemoryBackend {
    entries: RwLock<HashMap<String, Entry>>,
}

impl MemoryBackend {
    /// Creates an empty backend.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn expiry(ttl_secs: u64) -> Option<Instant> {
        (ttl_secs > 0).then(|| Instant::now() + Duration::from_secs(ttl_secs))
    }

    fn wrong_shape(key: &str) -> RowCacheError {
        RowCacheError::cache(format!(
            "WRONGTYPE operation against key '{}' holding the other shape",
            key
        ))
    }
}

#[async_trait]
impl CacheBackend for MemoryBackend {
    async fn get(&self, key: &str) -> RowCacheResult<Option<String>> {
        let mut entries = self.entries.write().await;

        match entries.get(key) {
            None => Ok(None),
            Some(entry) if entry.is_expired() => {
                entries.remove(key);
                Ok(None)
            }
            Some(entry) => match &entry.slot {
                Slot::Value(value) => Ok(Some(value.clone())),
                Slot::Hash(_) => Err(Self::wrong_shape(key)),
            },
        }
    }

    async fn set(&self, key: &str, value: &str, ttl_secs: u64) -> RowCacheResult<()> {
        let mut entries = self.entries.write().await;
        entries.insert(
            key.to_string(),
            Entry {
                slot: Slot::Value(value.to_string()),
                expires_at: Self::expiry(ttl_secs),
            },
        );
        Ok(())
    }

    async fn del(&self, key: &str) -> RowCacheResult<bool> {
        let mut entries = self.entries.write().await;

        match entries.remove(key) {
            Some(entry) => Ok(!entry.is_expired()),
            None => Ok(false),
        }
    }

    async fn hgetall(&self, key: &str) -> RowCacheResult<HashMap<String, String>> {
        let mut entries = self.entries.write().await;

        match entries.get(key) {
            None => Ok(HashMap::new()),
            Some(entry) if entry.is_expired() => {
                entries.remove(key);
                Ok(HashMap::new())
            }
            Some(entry) => match &entry.slot {
                Slot::Hash(fields) => Ok(fields.clone()),
                Slot::Value(_) => Err(Self::wrong_shape(key)),
            },
        }
    }

    async fn hset_multiple(&self, key: &str, fields: &[(String, String)]) -> RowCacheResult<()> {
        if fields.is_empty() {
            return Ok(());
        }

        let mut entries = self.entries.write().await;

        if entries.get(key).is_some_and(Entry::is_expired) {
            entries.remove(key);
        }

        let entry = entries.entry(key.to_string()).or_insert_with(|| Entry {
            slot: Slot::Hash(HashMap::new()),
            expires_at: None,
        });

        match &mut entry.slot {
            Slot::Hash(existing) => {
                for (field, value) in fields {
                    existing.insert(field.clone(), value.clone());
                }
                Ok(())
            }
            Slot::Value(_) => Err(Self::wrong_shape(key)),
        }
    }

    async fn hdel(&self, key: &str, fields: &[String]) -> RowCacheResult<u64> {
        let mut entries = self.entries.write().await;

        let Some(entry) = entries.get_mut(key) else {
            return Ok(0);
        };
        if entry.is_expired() {
            entries.remove(key);
            return Ok(0);
        }

        match &mut entry.slot {
            Slot::Hash(existing) => {
                let mut removed = 0;
                for field in fields {
                    if existing.remove(field).is_some() {
                        removed += 1;
                    }
                }
                // An emptied hash no longer exists as a key.
                if existing.is_empty() {
                    entries.remove(key);
                }
                Ok(removed)
            }
            Slot::Value(_) => Err(Self::wrong_shape(key)),
        }
    }

    async fn expire(&self, key: &str, ttl_secs: u64) -> RowCacheResult<bool> {
        let mut entries = self.entries.write().await;

        match entries.get_mut(key) {
            None => Ok(false),
            Some(entry) if entry.is_expired() => {
                entries.remove(key);
                Ok(false)
            }
            Some(entry) => {
                entry.expires_at = Self::expiry(ttl_secs);
                Ok(true)
            }
        }
    }

    async fn ttl(&self, key: &str) -> RowCacheResult<i64> {
        let mut entries = self.entries.write().await;

        match entries.get(key) {
            None => Ok(-2),
            Some(entry) if entry.is_expired() => {
                entries.remove(key);
                Ok(-2)
            }
            Some(entry) => match entry.expires_at {
                None => Ok(-1),
                Some(at) => {
                    // Round up so a freshly set TTL reads back as itself.
                    let millis = at.saturating_duration_since(Instant::now()).as_millis();
                    Ok(((millis + 999) / 1000) as i64)
                }
            },
        }
    }
}
