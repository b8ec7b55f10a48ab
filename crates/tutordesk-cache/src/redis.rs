//! Redis cache client.

use crate::config::CacheConfig;
use redis::{AsyncCommands, Client, aio::ConnectionManager};
use tracing::{debug, instrument};

/// Redis cache client with connection pooling.
#[derive(Clone)]
pub struct RedisCache {
    conn: ConnectionManager,
    config: CacheConfig,
}

impl std::fmt::Debug for RedisCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisCache")
            .field("key_prefix", &self.config.key_prefix)
            .finish_non_exhaustive()
    }
}

/// Error type for cache operations.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("Redis connection error: {0}")]
    Connection(#[from] redis::RedisError),

    #[error("REDIS_URL is not configured")]
    NotConfigured,
}

impl RedisCache {
    /// Connects to the Redis server named by `config.redis_url`.
    ///
    /// # Errors
    ///
    /// Returns `CacheError::NotConfigured` when no URL is set and
    /// `CacheError::Connection` if the connection fails.
    pub async fn connect(config: &CacheConfig) -> Result<Self, CacheError> {
        let url = config.redis_url.as_deref().ok_or(CacheError::NotConfigured)?;
        let client = Client::open(url)?;
        let conn = ConnectionManager::new(client).await?;

        Ok(Self {
            conn,
            config: config.clone(),
        })
    }

    /// Invalidates (deletes) a cached key.
    #[instrument(skip(self), fields(cache.operation = "DEL"))]
    pub async fn invalidate_key(&self, key: &str) -> Result<(), CacheError> {
        let mut conn = self.conn.clone();
        let key = self.config.prefixed_key(key);

        conn.del::<_, ()>(&key).await?;

        debug!(cache.key = %key, "Cache invalidated");

        Ok(())
    }

    /// Invalidates all keys matching a pattern.
    ///
    /// Uses SCAN, which does not block the server but may be slow with many
    /// keys.
    #[instrument(skip(self), fields(cache.operation = "SCAN_DEL"))]
    pub async fn invalidate_pattern(&self, pattern: &str) -> Result<u64, CacheError> {
        let mut conn = self.conn.clone();
        let pattern = self.config.prefixed_key(pattern);
        let mut cursor: u64 = 0;
        let mut deleted: u64 = 0;

        loop {
            let (next_cursor, keys): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(&pattern)
                .arg("COUNT")
                .arg(100)
                .query_async(&mut conn)
                .await?;

            if !keys.is_empty() {
                let count: u64 = conn.del(&keys).await?;
                deleted += count;
            }

            cursor = next_cursor;
            if cursor == 0 {
                break;
            }
        }

        debug!(cache.pattern = %pattern, cache.deleted = %deleted, "Pattern invalidation complete");

        Ok(deleted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_connect_requires_url() {
        let err = RedisCache::connect(&CacheConfig::default())
            .await
            .unwrap_err();
        assert!(matches!(err, CacheError::NotConfigured));
    }

    // Requires a running Redis instance
    #[tokio::test]
    #[ignore = "requires Redis"]
    async fn test_invalidate_pattern() {
        let config = CacheConfig {
            redis_url: Some("redis://localhost:6379".into()),
            ..CacheConfig::default()
        };
        let cache = RedisCache::connect(&config).await.unwrap();

        let mut conn = cache.conn.clone();
        conn.set::<_, _, ()>(config.prefixed_key("user:1:account"), "{}")
            .await
            .unwrap();

        let deleted = cache.invalidate_pattern("user:1:*").await.unwrap();
        assert_eq!(deleted, 1);
    }
}
