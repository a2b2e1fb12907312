//! # Rowcache
//!
//! Redis-backed caching for keyed and keyed-list domain records.
//!
//! The library implements a read/write/evict protocol with TTL jitter,
//! null-caching of confirmed-absent lookups, and increment-merge updates,
//! fronted by an optional per-request in-memory overlay that avoids
//! duplicate Redis round trips within one logical request.
//!
//! The moving parts:
//! - [`key`] renders cache keys from a prefix and a placeholder template.
//! - [`backend`] abstracts the store behind an async trait with Redis and
//!   in-memory implementations, partitioned into named groups.
//! - [`store`] is the durable layer: get/put/update/delete/destroy over
//!   single records and keyed collections.
//! - [`context`] is the request-scoped overlay.
//! - [`service`] ties store and overlay together and adds the
//!   read-through/write-through combinators callers compose around their
//!   source-of-truth operations.

pub mod backend;
pub mod context;
pub mod key;
pub mod service;
pub mod store;

pub use backend::{BackendGroups, CacheBackend, MemoryBackend, RedisBackend};
pub use context::RequestContext;
pub use key::{render, KeyArgs, MAX_KEY_LEN};
pub use service::RowCache;
pub use store::{
    CacheStore, UpdateOutcome, WriteOptions, MERGE_TTL_FLOOR_SECS, TTL_JITTER_MAX, TTL_JITTER_MIN,
};

// Re-export the shared data model so most callers need only this crate.
pub use rowcache_core::{
    Cached, Increment, Payload, Record, RecordSet, RowCacheError, RowCacheResult, Shape, NIL_KEY,
    NIL_VALUE,
};
