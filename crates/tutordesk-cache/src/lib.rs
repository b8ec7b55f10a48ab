//! # Tutordesk Cache
//!
//! Cache invalidation for Tutordesk read models.
//!
//! This crate provides:
//! - The cache key scheme and [`CacheTarget`], which maps a changed entity to
//!   the keys it invalidates
//! - The [`CacheInvalidator`] seam, implemented by [`RedisCache`] and
//!   [`NoopCache`]
//! - Cache configuration from environment variables
//!
//! # Example
//!
//! ```ignore
//! use tutordesk_cache::{CacheConfig, CacheInvalidator, CacheTarget, RedisCache};
//!
//! let cache = RedisCache::connect(&CacheConfig::from_env()).await?;
//! cache.invalidate(&CacheTarget::TutorRoster(tutor_id)).await;
//! ```

pub mod config;
pub mod invalidator;
pub mod keys;
pub mod redis;

pub use config::CacheConfig;
pub use invalidator::{CacheInvalidator, NoopCache};
pub use keys::CacheTarget;
pub use crate::redis::{CacheError, RedisCache};
