//! The durable cache store: read, write, merge, and evict operations over
//! single records and keyed collections.

use crate::backend::{BackendGroups, CacheBackend};
use rand::Rng;
use rowcache_core::{
    merge_fields, sub_key_of, Cached, Increment, Payload, Record, RecordSet, RowCacheError,
    RowCacheResult, Shape, NIL_KEY, NIL_VALUE,
};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, warn};

/// Smallest random offset added to every requested TTL.
pub const TTL_JITTER_MIN: u64 = 100;

/// Upper bound (exclusive) of the random TTL offset.
pub const TTL_JITTER_MAX: u64 = 9999;

/// A merge is aborted and the key destroyed when less than this many
/// seconds remain before expiry.
pub const MERGE_TTL_FLOOR_SECS: i64 = 50;

/// Per-call write parameters.
#[derive(Debug, Clone, Copy)]
pub struct WriteOptions<'a> {
    /// Record field whose value keys each element of a collection.
    pub sub_key_field: &'a str,
    /// Storage shape of the target key.
    pub shape: Shape,
    /// Backend group the call targets.
    pub group: &'a str,
    /// Requested TTL in seconds; `0` disables caching for the call.
    pub ttl: u64,
}

/// Result of a merge-on-update operation.
#[derive(Debug, Clone, PartialEq)]
pub enum UpdateOutcome {
    /// The merge succeeded; carries the full merged value now cached.
    Merged(Cached),
    /// The race guard fired: the key was destroyed instead of merged.
    Destroyed,
    /// A zero TTL turned the call into a pass-through.
    Skipped,
}

/// Redis-backed persistence layer for cached records.
///
/// Writes always apply a jittered TTL (`requested + random(100..9999)`)
/// so keys written together do not expire together.
pub struct CacheStore {
    groups: BackendGroups,
}

impl CacheStore {
    /// Creates a store over the given backend groups.
    #[must_use]
    pub fn new(groups: BackendGroups) -> Self {
        Self { groups }
    }

    /// Resolves the backend for a group.
    pub fn backend(&self, group: &str) -> RowCacheResult<Arc<dyn CacheBackend>> {
        self.groups.get(group)
    }

    fn jittered(ttl: u64) -> u64 {
        ttl + rand::thread_rng().gen_range(TTL_JITTER_MIN..TTL_JITTER_MAX)
    }

    /// Reads the cached value under `key`.
    ///
    /// Returns [`Cached::Miss`] for an absent key and [`Cached::Nil`] when
    /// the null marker is cached; the two are never conflated.
    pub async fn get(&self, key: &str, shape: Shape, group: &str) -> RowCacheResult<Cached> {
        let backend = self.backend(group)?;

        match shape {
            Shape::Single => match backend.get(key).await? {
                None => Ok(Cached::Miss),
                Some(raw) if raw.is_empty() => Ok(Cached::Miss),
                Some(raw) if raw == NIL_VALUE => Ok(Cached::Nil),
                Some(raw) => Ok(Cached::Single(serde_json::from_str(&raw)?)),
            },
            Shape::List => {
                let fields = backend.hgetall(key).await?;
                if fields.is_empty() {
                    return Ok(Cached::Miss);
                }
                if fields.get(NIL_KEY).is_some_and(|v| v == NIL_VALUE) {
                    return Ok(Cached::Nil);
                }

                let mut set = RecordSet::new();
                for (field, raw) in fields {
                    set.insert(field, serde_json::from_str(&raw)?);
                }
                Ok(Cached::List(set))
            }
        }
    }

    /// Writes a value, overwriting whatever is cached (the populate path
    /// after a source-of-truth read).
    ///
    /// The null marker negative-caches a confirmed-absent lookup; for
    /// collections it occupies the reserved hash field instead of the
    /// whole value. A collection write with zero records is skipped.
    pub async fn put(&self, key: &str, payload: Payload, opts: WriteOptions<'_>) -> RowCacheResult<()> {
        if opts.ttl == 0 {
            debug!("Caching disabled for key '{}', skipping write", key);
            return Ok(());
        }

        let backend = self.backend(opts.group)?;
        let ttl = Self::jittered(opts.ttl);

        match payload {
            Payload::Nil => match opts.shape {
                Shape::Single => {
                    backend.set(key, NIL_VALUE, ttl).await?;
                }
                Shape::List => {
                    backend
                        .hset_multiple(key, &[(NIL_KEY.to_string(), NIL_VALUE.to_string())])
                        .await?;
                    backend.expire(key, ttl).await?;
                }
            },
            payload => match opts.shape {
                Shape::Single => {
                    let record = Self::single_record(payload)?;
                    backend
                        .set(key, &serde_json::to_string(&record)?, ttl)
                        .await?;
                }
                Shape::List => {
                    let records = payload.into_records().unwrap_or_default();
                    if records.is_empty() {
                        debug!("Empty collection for key '{}', skipping write", key);
                        return Ok(());
                    }

                    let mut fields = Vec::with_capacity(records.len());
                    for record in &records {
                        let sub = sub_key_of(record, opts.sub_key_field)?;
                        fields.push((sub, serde_json::to_string(record)?));
                    }

                    backend.hset_multiple(key, &fields).await?;
                    backend.expire(key, ttl).await?;
                }
            },
        }

        Ok(())
    }

    /// Merges a value into the cached copy (the consistency path after a
    /// source-of-truth mutation) and returns the merged result.
    ///
    /// Race guard: when the key has less than [`MERGE_TTL_FLOOR_SECS`]
    /// seconds left (or no TTL at all), the merge would extend the life of
    /// data that is about to legitimately expire, so the key is destroyed
    /// instead and the next reader repopulates from the source of truth.
    pub async fn update(
        &self,
        key: &str,
        payload: Payload,
        increment: Option<&Increment>,
        fillable: &Record,
        opts: WriteOptions<'_>,
    ) -> RowCacheResult<UpdateOutcome> {
        if opts.ttl == 0 {
            return Ok(UpdateOutcome::Skipped);
        }

        let backend = self.backend(opts.group)?;

        let remaining = backend.ttl(key).await?;
        if remaining < MERGE_TTL_FLOOR_SECS {
            warn!(
                "Key '{}' has {}s remaining, destroying instead of merging",
                key, remaining
            );
            backend.del(key).await?;
            return Ok(UpdateOutcome::Destroyed);
        }

        let current = self.get(key, opts.shape, opts.group).await?;
        let was_nil = current.is_nil();

        match opts.shape {
            Shape::Single => {
                let current = current.into_single().unwrap_or_default();
                let mut incoming = Self::single_record(payload)?;

                if let Some(inc) = increment {
                    let base = current.get(&inc.field).and_then(Value::as_i64).unwrap_or(0);
                    incoming.insert(inc.field.clone(), Value::from(base + inc.by));
                }

                let base = if current.is_empty() {
                    fillable.clone()
                } else {
                    current
                };
                let merged = merge_fields(base, incoming);

                backend
                    .set(key, &serde_json::to_string(&merged)?, Self::jittered(opts.ttl))
                    .await?;

                Ok(UpdateOutcome::Merged(Cached::Single(merged)))
            }
            Shape::List => {
                // The collection is handled as raw JSON values so the
                // increment base lookup sees exactly what the hash holds.
                let mut map: BTreeMap<String, Value> = match current {
                    Cached::List(set) => set
                        .into_iter()
                        .map(|(sub, record)| (sub, Value::Object(record)))
                        .collect(),
                    _ => BTreeMap::new(),
                };

                let records = payload
                    .into_records()
                    .ok_or_else(|| RowCacheError::validation("update requires record payloads"))?;

                let mut fields = Vec::with_capacity(records.len());
                for mut record in records {
                    let sub = sub_key_of(&record, opts.sub_key_field)?;

                    if let Some(inc) = increment {
                        // The base is resolved against the collection map
                        // under the increment field name, not against the
                        // element's own record; an entry stored there holds
                        // a record and never a number, so the base degrades
                        // to zero. Kept to match the established merge
                        // semantics.
                        let base = map.get(&inc.field).and_then(Value::as_i64).unwrap_or(0);
                        record.insert(inc.field.clone(), Value::from(base + inc.by));
                    }

                    let base = map
                        .get(&sub)
                        .and_then(Value::as_object)
                        .cloned()
                        .unwrap_or_else(|| fillable.clone());
                    let merged = merge_fields(base, record);

                    fields.push((sub.clone(), serde_json::to_string(&merged)?));
                    map.insert(sub, Value::Object(merged));
                }

                if !fields.is_empty() {
                    backend.hset_multiple(key, &fields).await?;
                    if was_nil {
                        backend.hdel(key, &[NIL_KEY.to_string()]).await?;
                    }
                    backend.expire(key, Self::jittered(opts.ttl)).await?;
                }

                let set: RecordSet = map
                    .into_iter()
                    .filter_map(|(sub, value)| match value {
                        Value::Object(record) => Some((sub, record)),
                        _ => None,
                    })
                    .collect();

                Ok(UpdateOutcome::Merged(Cached::List(set)))
            }
        }
    }

    /// Evicts cached data.
    ///
    /// Single shape: unconditional key delete. Collection shape: deletes
    /// only the named sub-keys; asking for a collection eviction without
    /// any sub-keys is a usage error.
    pub async fn delete(
        &self,
        key: &str,
        sub_keys: &[String],
        shape: Shape,
        group: &str,
    ) -> RowCacheResult<()> {
        let backend = self.backend(group)?;

        match shape {
            Shape::Single => {
                backend.del(key).await?;
            }
            Shape::List => {
                if sub_keys.is_empty() {
                    return Err(RowCacheError::missing_argument("sub_keys"));
                }
                backend.hdel(key, sub_keys).await?;
            }
        }

        Ok(())
    }

    /// Unconditionally deletes the whole key; used by the race guard and
    /// by failure-recovery paths.
    pub async fn destroy(&self, key: &str, group: &str) -> RowCacheResult<()> {
        let backend = self.backend(group)?;
        backend.del(key).await?;
        debug!("Destroyed key '{}'", key);
        Ok(())
    }

    fn single_record(payload: Payload) -> RowCacheResult<Record> {
        match payload {
            Payload::One(record) => Ok(record),
            Payload::Many(mut records) if records.len() == 1 => Ok(records.remove(0)),
            Payload::Nil | Payload::Many(_) => Err(RowCacheError::validation(
                "single-shape write requires exactly one record",
            )),
        }
    }
}
