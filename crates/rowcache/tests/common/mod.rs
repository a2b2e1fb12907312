//! Shared helpers for the integration tests: an in-memory backed store
//! and service, plus record constructors.

#![allow(dead_code)]

use rowcache::{
    BackendGroups, CacheStore, MemoryBackend, Record, RowCache, Shape, WriteOptions,
};
use rowcache_config::CacheSettings;
use serde_json::Value;
use std::sync::Arc;

/// Builds a store over a single in-memory "default" group, returning the
/// backend handle so tests can inspect TTLs and raw entries.
pub fn memory_store() -> (CacheStore, Arc<MemoryBackend>) {
    let backend = Arc::new(MemoryBackend::new());
    let groups = BackendGroups::new().with("default", backend.clone());
    (CacheStore::new(groups), backend)
}

/// Builds a service over a single in-memory "default" group.
pub fn memory_service() -> (RowCache, Arc<MemoryBackend>) {
    let (store, backend) = memory_store();
    let service = RowCache::with_store(store, &CacheSettings::default());
    (service, backend)
}

/// Builds a record from field/value pairs.
pub fn record(pairs: &[(&str, Value)]) -> Record {
    pairs
        .iter()
        .map(|(k, v)| ((*k).to_string(), v.clone()))
        .collect()
}

/// Write options for the "default" group keyed by `uid`.
pub fn opts(shape: Shape, ttl: u64) -> WriteOptions<'static> {
    WriteOptions {
        sub_key_field: "uid",
        shape,
        group: "default",
        ttl,
    }
}
