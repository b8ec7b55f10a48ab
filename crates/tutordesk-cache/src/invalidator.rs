//! The seam services use to drop stale cache entries after a commit.

use crate::keys::CacheTarget;
use crate::redis::RedisCache;
use async_trait::async_trait;
use tracing::{debug, warn};

/// Drops cached read models. Failures are logged, never returned: a stale
/// entry expires on its own and must not fail a committed write.
#[async_trait]
pub trait CacheInvalidator: Send + Sync {
    async fn invalidate(&self, target: &CacheTarget);
}

#[async_trait]
impl CacheInvalidator for RedisCache {
    async fn invalidate(&self, target: &CacheTarget) {
        for key in target.keys() {
            if let Err(e) = self.invalidate_key(&key).await {
                warn!(error = %e, cache.key = %key, "Failed to invalidate cache key");
            }
        }
        for pattern in target.patterns() {
            if let Err(e) = self.invalidate_pattern(&pattern).await {
                warn!(error = %e, cache.pattern = %pattern, "Failed to invalidate cache pattern");
            }
        }
    }
}

/// Invalidator for deployments without Redis.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopCache;

#[async_trait]
impl CacheInvalidator for NoopCache {
    async fn invalidate(&self, target: &CacheTarget) {
        debug!(?target, "Cache disabled, nothing to invalidate");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tutordesk_models::UserId;

    #[tokio::test]
    async fn test_noop_cache_accepts_any_target() {
        let cache: &dyn CacheInvalidator = &NoopCache;
        cache.invalidate(&CacheTarget::TutorRoster(UserId::new())).await;
    }
}
