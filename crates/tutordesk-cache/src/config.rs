//! Redis cache configuration.

use std::env;

/// Redis cache configuration loaded from environment variables.
///
/// # Environment Variables
///
/// - `REDIS_URL`: Redis connection URL. Caching is disabled when unset.
/// - `CACHE_PREFIX`: Prefix for all cache keys (default: `tutordesk`)
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CacheConfig {
    pub redis_url: Option<String>,
    /// Prefix for all cache keys to avoid collisions with other Redis users.
    pub key_prefix: String,
}

impl CacheConfig {
    pub fn from_env() -> Self {
        Self {
            redis_url: env::var("REDIS_URL").ok().filter(|v| !v.is_empty()),
            key_prefix: env::var("CACHE_PREFIX").unwrap_or_else(|_| "tutordesk".into()),
        }
    }

    /// Build a prefixed cache key.
    ///
    /// ```ignore
    /// let key = CacheConfig::default().prefixed_key("user:123");
    /// assert_eq!(key, "tutordesk:user:123");
    /// ```
    pub fn prefixed_key(&self, key: &str) -> String {
        format!("{}:{}", self.key_prefix, key)
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            redis_url: None,
            key_prefix: "tutordesk".into(),
        }
    }
}
