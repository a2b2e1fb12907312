//! Backend abstraction over the key-value store.
//!
//! The trait mirrors the wire contract the cache relies on: plain
//! get/set/delete for single values, hash operations for keyed
//! collections, and TTL inspection for the merge race guard. Backends are
//! partitioned into named groups so callers can target separate logical
//! stores.

mod memory;
mod redis;

pub use memory::MemoryBackend;
pub use redis::RedisBackend;

use async_trait::async_trait;
use rowcache_core::{RowCacheError, RowCacheResult};
use rowcache_config::CacheSettings;
use std::collections::HashMap;
use std::sync::Arc;

/// Key-value store contract consumed by the cache store.
///
/// Implementations must provide single-key atomicity for `set` and for one
/// `hset_multiple` batch; no multi-key transaction is assumed.
#[async_trait]
pub trait CacheBackend: Send + Sync {
    /// Fetches a plain value. `None` means the key is absent.
    async fn get(&self, key: &str) -> RowCacheResult<Option<String>>;

    /// Stores a plain value with a TTL in seconds.
    async fn set(&self, key: &str, value: &str, ttl_secs: u64) -> RowCacheResult<()>;

    /// Deletes a key. Returns `true` if it existed.
    async fn del(&self, key: &str) -> RowCacheResult<bool>;

    /// Fetches all fields of a hash. Empty when the key is absent.
    async fn hgetall(&self, key: &str) -> RowCacheResult<HashMap<String, String>>;

    /// Writes multiple hash fields in one batch. Does not touch the TTL.
    async fn hset_multiple(&self, key: &str, fields: &[(String, String)]) -> RowCacheResult<()>;

    /// Deletes hash fields. Returns the number of fields removed.
    async fn hdel(&self, key: &str, fields: &[String]) -> RowCacheResult<u64>;

    /// Sets a key's TTL in seconds. Returns `false` if the key is absent.
    async fn expire(&self, key: &str, ttl_secs: u64) -> RowCacheResult<bool>;

    /// Remaining TTL in seconds: `-2` for a missing key, `-1` for a key
    /// without an expiry.
    async fn ttl(&self, key: &str) -> RowCacheResult<i64>;
}

impl std::fmt::Debug for dyn CacheBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("dyn CacheBackend")
    }
}

/// Named logical partitions of the store.
#[derive(Clone, Default)]
pub struct BackendGroups {
    groups: HashMap<String, Arc<dyn CacheBackend>>,
}

impl BackendGroups {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a backend under a group name.
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, backend: Arc<dyn CacheBackend>) -> Self {
        self.groups.insert(name.into(), backend);
        self
    }

    /// Looks up a group's backend.
    pub fn get(&self, name: &str) -> RowCacheResult<Arc<dyn CacheBackend>> {
        self.groups.get(name).cloned().ok_or_else(|| {
            RowCacheError::configuration(format!("Unknown cache group '{}'", name))
        })
    }

    /// Builds one Redis-backed group per configured entry.
    ///
    /// Disabled groups get a disabled backend: reads miss and writes
    /// vanish instead of failing.
    pub fn from_settings(settings: &CacheSettings) -> RowCacheResult<Self> {
        let mut groups = Self::new();
        for (name, group) in &settings.groups {
            let backend: Arc<dyn CacheBackend> = if group.enabled {
                Arc::new(RedisBackend::connect(&group.url, group.pool_size)?)
            } else {
                Arc::new(RedisBackend::disabled())
            };
            groups = groups.with(name.clone(), backend);
        }
        Ok(groups)
    }
}
