//! # Tutordesk DB
//!
//! The persistence interface used by the services, with two implementations:
//!
//! - [`PgStore`]: PostgreSQL via SQLx, with the relational rules enforced by
//!   the schema in `migrations/`
//! - [`MemoryStore`]: an in-process store enforcing the same rules, used by
//!   the test suite and for running without a database
//!
//! # Example
//!
//! ```ignore
//! use tutordesk_config::DatabaseConfig;
//! use tutordesk_db::{init_db_pool, run_migrations, PgStore};
//!
//! let pool = init_db_pool(&DatabaseConfig::from_env()).await?;
//! run_migrations(&pool).await?;
//! let store = PgStore::new(pool);
//! ```

pub mod error;
pub mod memory;
pub mod postgres;
pub mod store;

pub use error::{ACTIVE_ENROLLMENT_UNIQUE, StoreError, USERNAME_UNIQUE};
#[cfg(feature = "test-utils")]
pub use memory::RowCounts;
pub use memory::MemoryStore;
pub use postgres::PgStore;
pub use store::{Store, StoreTx};

// Re-export PgPool for convenience
pub use sqlx::PgPool;

use sqlx::postgres::PgPoolOptions;
use tutordesk_config::DatabaseConfig;

/// Opens a PostgreSQL connection pool.
///
/// Fails with [`StoreError::Database`] when `DATABASE_URL` is not configured
/// and with a transient error when the server cannot be reached.
pub async fn init_db_pool(config: &DatabaseConfig) -> Result<PgPool, StoreError> {
    let url = config
        .url
        .as_deref()
        .ok_or_else(|| StoreError::Database("DATABASE_URL must be set".into()))?;

    PgPoolOptions::new()
        .max_connections(config.max_connections)
        .connect(url)
        .await
        .map_err(StoreError::from_sqlx)
}

/// Applies the embedded migrations.
pub async fn run_migrations(pool: &PgPool) -> Result<(), StoreError> {
    sqlx::migrate!("../../migrations")
        .run(pool)
        .await
        .map_err(|e| StoreError::Database(Box::new(e)))?;
    tracing::info!("Database migrations applied");
    Ok(())
}
