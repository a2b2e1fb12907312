//! Redis-based backend implementation.

use super::CacheBackend;
use async_trait::async_trait;
use deadpool_redis::{redis::AsyncCommands, Pool, PoolConfig, Runtime};
use rowcache_core::{RowCacheError, RowCacheResult};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// Redis backend over a deadpool connection pool.
pub struct RedisBackend {
    /// Redis connection pool. `None` means the backend is disabled and
    /// every operation is a no-op.
    pool: Option<Arc<Pool>>,
}

impl RedisBackend {
    /// Creates a backend from an existing pool.
    #[must_use]
    pub fn new(pool: Arc<Pool>) -> Self {
        Self { pool: Some(pool) }
    }

    /// Creates a backend by building a pool from a Redis URL.
    pub fn connect(url: &str, pool_size: u32) -> RowCacheResult<Self> {
        let mut cfg = deadpool_redis::Config::from_url(url);
        cfg.pool = Some(PoolConfig::new(pool_size as usize));
        let pool = cfg
            .create_pool(Some(Runtime::Tokio1))
            .map_err(|e| RowCacheError::cache(format!("Failed to create Redis pool: {}", e)))?;

        Ok(Self::new(Arc::new(pool)))
    }

    /// Creates a no-op backend (for when the group is disabled).
    #[must_use]
    pub fn disabled() -> Self {
        Self { pool: None }
    }

    /// Check if this backend is enabled.
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.pool.is_some()
    }

    /// Get a connection from the pool.
    async fn get_conn(&self) -> RowCacheResult<deadpool_redis::Connection> {
        match &self.pool {
            Some(pool) => pool.get().await.map_err(|e| {
                RowCacheError::cache(format!("Failed to get Redis connection: {}", e))
            }),
            None => Err(RowCacheError::cache("Cache is disabled".to_string())),
        }
    }
}

#[async_trait]
impl CacheBackend for RedisBackend {
    async fn get(&self, key: &str) -> RowCacheResult<Option<String>> {
        if !self.is_enabled() {
            return Ok(None);
        }

        let mut conn = self.get_conn().await?;
        let value: Option<String> = conn
            .get(key)
            .await
            .map_err(|e| RowCacheError::cache(format!("Failed to get key '{}': {}", key, e)))?;

        match &value {
            Some(_) => debug!("Cache hit for key '{}'", key),
            None => debug!("Cache miss for key '{}'", key),
        }

        Ok(value)
    }

    async fn set(&self, key: &str, value: &str, ttl_secs: u64) -> RowCacheResult<()> {
        if !self.is_enabled() {
            return Ok(());
        }

        let mut conn = self.get_conn().await?;
        let ttl_secs = ttl_secs.max(1);

        conn.set_ex::<_, _, ()>(key, value, ttl_secs)
            .await
            .map_err(|e| RowCacheError::cache(format!("Failed to set key '{}': {}", key, e)))?;

        debug!("Cached key '{}' with TTL {}s", key, ttl_secs);
        Ok(())
    }

    async fn del(&self, key: &str) -> RowCacheResult<bool> {
        if !self.is_enabled() {
            return Ok(false);
        }

        let mut conn = self.get_conn().await?;
        let deleted: i64 = conn
            .del(key)
            .await
            .map_err(|e| RowCacheError::cache(format!("Failed to delete key '{}': {}", key, e)))?;

        debug!("Deleted key '{}': {}", key, deleted > 0);
        Ok(deleted > 0)
    }

    async fn hgetall(&self, key: &str) -> RowCacheResult<HashMap<String, String>> {
        if !self.is_enabled() {
            return Ok(HashMap::new());
        }

        let mut conn = self.get_conn().await?;
        let fields: HashMap<String, String> = conn.hgetall(key).await.map_err(|e| {
            RowCacheError::cache(format!("Failed to read hash '{}': {}", key, e))
        })?;

        Ok(fields)
    }

    async fn hset_multiple(&self, key: &str, fields: &[(String, String)]) -> RowCacheResult<()> {
        if !self.is_enabled() || fields.is_empty() {
            return Ok(());
        }

        let mut conn = self.get_conn().await?;
        conn.hset_multiple::<_, _, _, ()>(key, fields)
            .await
            .map_err(|e| RowCacheError::cache(format!("Failed to write hash '{}': {}", key, e)))?;

        debug!("Wrote {} fields to hash '{}'", fields.len(), key);
        Ok(())
    }

    async fn hdel(&self, key: &str, fields: &[String]) -> RowCacheResult<u64> {
        if !self.is_enabled() || fields.is_empty() {
            return Ok(0);
        }

        let mut conn = self.get_conn().await?;
        let removed: i64 = conn.hdel(key, fields.to_vec()).await.map_err(|e| {
            RowCacheError::cache(format!("Failed to delete hash fields of '{}': {}", key, e))
        })?;

        Ok(removed.max(0) as u64)
    }

    async fn expire(&self, key: &str, ttl_secs: u64) -> RowCacheResult<bool> {
        if !self.is_enabled() {
            return Ok(false);
        }

        let mut conn = self.get_conn().await?;
        let applied: bool = conn.expire(key, ttl_secs as i64).await.map_err(|e| {
            RowCacheError::cache(format!("Failed to set TTL on key '{}': {}", key, e))
        })?;

        Ok(applied)
    }

    async fn ttl(&self, key: &str) -> RowCacheResult<i64> {
        if !self.is_enabled() {
            return Ok(-2);
        }

        let mut conn = self.get_conn().await?;
        let remaining: i64 = conn.ttl(key).await.map_err(|e| {
            RowCacheError::cache(format!("Failed to read TTL of key '{}': {}", key, e))
        })?;

        Ok(remaining)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_disabled_backend_is_a_no_op() {
        let backend = RedisBackend::disabled();
        assert!(!backend.is_enabled());

        assert_eq!(backend.get("k").await.unwrap(), None);
        backend.set("k", "v", 60).await.unwrap();
        assert!(!backend.del("k").await.unwrap());
        assert!(backend.hgetall("k").await.unwrap().is_empty());
        assert_eq!(backend.ttl("k").await.unwrap(), -2);
    }
}
