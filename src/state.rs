use std::sync::Arc;

use tracing::{info, warn};
use tutordesk_cache::{CacheConfig, CacheInvalidator, NoopCache, RedisCache};
use tutordesk_config::{AccountsConfig, DatabaseConfig, TaskConfig};
use tutordesk_db::{MemoryStore, PgStore, Store, init_db_pool, run_migrations};

use crate::effects::Hooks;
use crate::notifications::{DeliveryNotifier, TracingChannel};
use crate::tasks::{RetryPolicy, TaskQueue};

/// Everything a service call needs, passed explicitly.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub accounts: AccountsConfig,
    pub hooks: Hooks,
}

impl AppState {
    pub fn new(store: Arc<dyn Store>, accounts: AccountsConfig, hooks: Hooks) -> Self {
        Self {
            store,
            accounts,
            hooks,
        }
    }

    /// In-process store, no cache, notifications logged only.
    pub fn in_memory() -> Self {
        Self::new(
            Arc::new(MemoryStore::new()),
            AccountsConfig::default(),
            Hooks::disabled(),
        )
    }

    /// PostgreSQL store with migrations applied, Redis invalidation when
    /// `REDIS_URL` is set, and notifications delivered through the task
    /// queue. Must be called from within a tokio runtime.
    pub async fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let pool = init_db_pool(&DatabaseConfig::from_env()).await?;
        run_migrations(&pool).await?;
        let store = PgStore::new(pool);

        let cache_config = CacheConfig::from_env();
        let cache: Arc<dyn CacheInvalidator> = if cache_config.redis_url.is_some() {
            match RedisCache::connect(&cache_config).await {
                Ok(cache) => {
                    info!("Redis cache invalidation enabled");
                    Arc::new(cache)
                }
                Err(e) => {
                    warn!(error = %e, "Redis unavailable, cache invalidation disabled");
                    Arc::new(NoopCache)
                }
            }
        } else {
            Arc::new(NoopCache)
        };

        let queue = TaskQueue::new(
            RetryPolicy::from_config(&TaskConfig::from_env()),
            Arc::new(store.clone()),
        );
        let notifier = DeliveryNotifier::new(queue, Arc::new(TracingChannel));

        Ok(Self::new(
            Arc::new(store),
            AccountsConfig::from_env(),
            Hooks::new(cache, Arc::new(notifier)),
        ))
    }
}
