//! Tutordesk Observability
//!
//! - [`init_tracing`]: tracing-subscriber setup driven by [`LoggingConfig`](tutordesk_config::LoggingConfig)
//! - [`metrics`]: business counters through the `metrics` facade
//!
//! # Examples
//!
//! ```no_run
//! use tutordesk_config::LoggingConfig;
//! use tutordesk_observability::init_tracing;
//!
//! let _guard = init_tracing(&LoggingConfig::from_env()).expect("tracing");
//! ```

pub mod logging;
pub mod metrics;

pub use crate::logging::init_tracing;
pub use crate::metrics::{
    track_account_created, track_enrollment_change, track_task_failure, track_validation_failure,
};
