//! High-level caching service: the durable store fronted by the optional
//! request-scoped overlay, plus the read-through and write-through
//! combinators callers compose around their source-of-truth operations.

use crate::backend::BackendGroups;
use crate::context::RequestContext;
use crate::store::{CacheStore, UpdateOutcome, WriteOptions};
use rowcache_config::CacheSettings;
use rowcache_core::{
    sub_key_of, Cached, Increment, Payload, Record, RecordSet, RowCacheError, RowCacheResult,
    Shape,
};
use std::future::Future;
use tracing::{debug, warn};

/// Overlay-aware cache service.
///
/// Every operation takes `Option<&mut RequestContext>`; passing `None`
/// opts out of the overlay for that call, so store writes are mirrored
/// into the overlay only when the caller opts in.
pub struct RowCache {
    store: CacheStore,
    default_group: String,
    null_ttl_secs: u64,
}

impl RowCache {
    /// Builds the service from settings: one Redis pool per configured
    /// group, plus the configured defaults.
    pub fn from_settings(settings: &CacheSettings) -> RowCacheResult<Self> {
        let groups = BackendGroups::from_settings(settings)?;
        Ok(Self::with_store(CacheStore::new(groups), settings))
    }

    /// Builds the service over an existing store (custom backends).
    #[must_use]
    pub fn with_store(store: CacheStore, settings: &CacheSettings) -> Self {
        Self {
            store,
            default_group: settings.default_group.clone(),
            null_ttl_secs: settings.null_ttl_secs,
        }
    }

    /// The underlying store.
    #[must_use]
    pub fn store(&self) -> &CacheStore {
        &self.store
    }

    /// Group used when callers do not pick one.
    #[must_use]
    pub fn default_group(&self) -> &str {
        &self.default_group
    }

    /// Reads a cached value, consulting the overlay first.
    pub async fn get(
        &self,
        key: &str,
        shape: Shape,
        group: &str,
        ctx: Option<&mut RequestContext>,
    ) -> RowCacheResult<Cached> {
        if let Some(hit) = ctx.as_deref().and_then(|ctx| ctx.read(key)) {
            debug!("Overlay hit for key '{}'", key);
            return Ok(hit.clone());
        }

        let result = self.store.get(key, shape, group).await?;
        if let Some(ctx) = ctx {
            ctx.write(key, result.clone());
        }

        Ok(result)
    }

    /// Overwrites the cached value (populate path) and mirrors it into
    /// the overlay.
    pub async fn put(
        &self,
        key: &str,
        payload: Payload,
        opts: WriteOptions<'_>,
        ctx: Option<&mut RequestContext>,
    ) -> RowCacheResult<()> {
        if opts.ttl == 0 {
            return self.store.put(key, payload, opts).await;
        }

        let mirror = Self::payload_as_cached(&payload, opts.shape, opts.sub_key_field)?;
        self.store.put(key, payload, opts).await?;

        if let Some(ctx) = ctx {
            ctx.write(key, mirror);
        }

        Ok(())
    }

    /// Merges into the cached value (consistency path); the merged result
    /// lands in the overlay, and a race-guard destroy evicts it instead.
    pub async fn update(
        &self,
        key: &str,
        payload: Payload,
        increment: Option<&Increment>,
        fillable: &Record,
        opts: WriteOptions<'_>,
        ctx: Option<&mut RequestContext>,
    ) -> RowCacheResult<UpdateOutcome> {
        let outcome = self.store.update(key, payload, increment, fillable, opts).await?;

        if let Some(ctx) = ctx {
            match &outcome {
                UpdateOutcome::Merged(merged) => ctx.write(key, merged.clone()),
                UpdateOutcome::Destroyed => ctx.evict(key),
                UpdateOutcome::Skipped => {}
            }
        }

        Ok(outcome)
    }

    /// Evicts cached data. The overlay entry for the key goes away even
    /// when only some sub-keys were removed from the store.
    pub async fn delete(
        &self,
        key: &str,
        sub_keys: &[String],
        shape: Shape,
        group: &str,
        ctx: Option<&mut RequestContext>,
    ) -> RowCacheResult<()> {
        self.store.delete(key, sub_keys, shape, group).await?;

        if let Some(ctx) = ctx {
            ctx.evict(key);
        }

        Ok(())
    }

    /// Unconditionally deletes the key in both layers.
    pub async fn destroy(
        &self,
        key: &str,
        group: &str,
        ctx: Option<&mut RequestContext>,
    ) -> RowCacheResult<()> {
        self.store.destroy(key, group).await?;

        if let Some(ctx) = ctx {
            ctx.evict(key);
        }

        Ok(())
    }

    /// Read-through: consult the cache, fall back to the loader, cache
    /// what it returns.
    ///
    /// A cached null marker short-circuits to [`Cached::Miss`] without
    /// invoking the loader. An unavailable backend degrades to a miss
    /// (fail-open) — the loader result is still returned, only the
    /// write-back is lost. An empty load is negative-cached with the
    /// configured null TTL. `ttl == 0` bypasses the cache entirely.
    pub async fn get_or_load<F, Fut>(
        &self,
        key: &str,
        sub_key_field: &str,
        shape: Shape,
        group: &str,
        ttl: u64,
        mut ctx: Option<&mut RequestContext>,
        load: F,
    ) -> RowCacheResult<Cached>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = RowCacheResult<Vec<Record>>>,
    {
        if ttl != 0 {
            match self.get(key, shape, group, ctx.as_deref_mut()).await {
                Ok(Cached::Nil) => {
                    debug!("Null-marker hit for key '{}'", key);
                    return Ok(Cached::Miss);
                }
                Ok(Cached::Miss) => {}
                Ok(hit) => return Ok(hit),
                Err(e) if e.is_unavailable() => {
                    warn!("Cache unavailable for key '{}', falling back to source: {}", key, e);
                }
                Err(e) => return Err(e),
            }
        }

        let rows = load().await?;
        let (payload, result) = Self::shape_rows(rows, shape, sub_key_field)?;

        if ttl != 0 {
            let write_ttl = if payload.is_nil() { self.null_ttl_secs } else { ttl };
            let opts = WriteOptions {
                sub_key_field,
                shape,
                group,
                ttl: write_ttl,
            };
            if let Err(e) = self.put(key, payload, opts, ctx).await {
                // The loaded value is still good; a failed write-back only
                // costs the next call a reload.
                warn!("Failed to cache key '{}': {}", key, e);
            }
        }

        Ok(result)
    }

    /// Write-through: run the caller's source-of-truth mutation, then keep
    /// the cache consistent.
    ///
    /// On success the merge-on-update path runs (a failed merge degrades
    /// to a destroy). On mutation failure the cached key is destroyed —
    /// its state relative to the source is unknown — and the error is
    /// propagated.
    pub async fn update_through<F, Fut, T>(
        &self,
        key: &str,
        payload: Payload,
        increment: Option<&Increment>,
        fillable: &Record,
        opts: WriteOptions<'_>,
        mut ctx: Option<&mut RequestContext>,
        mutate: F,
    ) -> RowCacheResult<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = RowCacheResult<T>>,
    {
        match mutate().await {
            Ok(value) => {
                if opts.ttl != 0 {
                    if let Err(e) = self
                        .update(key, payload, increment, fillable, opts, ctx.as_deref_mut())
                        .await
                    {
                        warn!("Merge failed for key '{}', destroying: {}", key, e);
                        let _ = self.destroy(key, opts.group, ctx).await;
                    }
                }
                Ok(value)
            }
            Err(e) => {
                let _ = self.destroy(key, opts.group, ctx).await;
                Err(e)
            }
        }
    }

    /// Renders a write payload the way a subsequent read would see it.
    fn payload_as_cached(
        payload: &Payload,
        shape: Shape,
        sub_key_field: &str,
    ) -> RowCacheResult<Cached> {
        match (payload, shape) {
            (Payload::Nil, _) => Ok(Cached::Nil),
            (Payload::One(record), Shape::Single) => Ok(Cached::Single(record.clone())),
            (Payload::Many(records), Shape::Single) if records.len() == 1 => {
                Ok(Cached::Single(records[0].clone()))
            }
            (Payload::Many(_), Shape::Single) => Err(RowCacheError::validation(
                "single-shape write requires exactly one record",
            )),
            (payload, Shape::List) => {
                let records = payload.clone().into_records().unwrap_or_default();
                if records.is_empty() {
                    return Ok(Cached::Miss);
                }
                let mut set = RecordSet::new();
                for record in records {
                    let sub = sub_key_of(&record, sub_key_field)?;
                    set.insert(sub, record);
                }
                Ok(Cached::List(set))
            }
        }
    }

    /// Indexes loaded rows into a write payload and the caller-facing
    /// result.
    fn shape_rows(
        rows: Vec<Record>,
        shape: Shape,
        sub_key_field: &str,
    ) -> RowCacheResult<(Payload, Cached)> {
        if rows.is_empty() {
            return Ok((Payload::Nil, Cached::Miss));
        }

        match shape {
            Shape::Single => {
                let record = rows.into_iter().next().unwrap_or_default();
                Ok((Payload::One(record.clone()), Cached::Single(record)))
            }
            Shape::List => {
                let mut set = RecordSet::new();
                for record in &rows {
                    let sub = sub_key_of(record, sub_key_field)?;
                    set.insert(sub, record.clone());
                }
                Ok((Payload::Many(rows), Cached::List(set)))
            }
        }
    }
}
