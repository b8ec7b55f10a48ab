//! # Tutordesk Config
//!
//! Configuration types for Tutordesk, loaded from environment variables.
//!
//! - [`accounts`]: Credential generation and password hashing settings
//! - [`database`]: PostgreSQL connection settings
//! - [`logging`]: Log level, format and file output
//! - [`tasks`]: Background task retry policy
//!
//! # Example
//!
//! ```ignore
//! use tutordesk_config::{AccountsConfig, DatabaseConfig, TaskConfig};
//!
//! let accounts = AccountsConfig::from_env();
//! let database = DatabaseConfig::from_env();
//! let tasks = TaskConfig::from_env();
//! ```

pub mod accounts;
pub mod database;
pub mod logging;
pub mod tasks;

pub use accounts::AccountsConfig;
pub use database::DatabaseConfig;
pub use logging::{LogFormat, LoggingConfig};
pub use tasks::TaskConfig;

/// Read and parse an environment variable, falling back to `default` when it
/// is missing or malformed.
pub(crate) fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}
