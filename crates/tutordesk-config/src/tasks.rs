//! Background task retry settings.
//!
//! # Environment Variables
//!
//! - `TASK_MAX_RETRIES`: retries after the first attempt (default: 3, never fewer than 3)
//! - `TASK_BASE_DELAY_MS`: first backoff delay in milliseconds (default: 500)
//! - `TASK_MAX_DELAY_MS`: backoff cap in milliseconds (default: 30000)
//! - `TASK_JITTER`: randomise each delay between zero and the computed backoff (default: true)

use std::time::Duration;

use crate::env_or;

pub const MIN_RETRIES: u32 = 3;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TaskConfig {
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub jitter: bool,
}

impl TaskConfig {
    pub fn from_env() -> Self {
        let base_ms: u64 = env_or("TASK_BASE_DELAY_MS", 500);
        let max_ms: u64 = env_or("TASK_MAX_DELAY_MS", 30_000);

        Self {
            max_retries: env_or("TASK_MAX_RETRIES", MIN_RETRIES).max(MIN_RETRIES),
            base_delay: Duration::from_millis(base_ms),
            max_delay: Duration::from_millis(max_ms.max(base_ms)),
            jitter: env_or("TASK_JITTER", true),
        }
    }
}

impl Default for TaskConfig {
    fn default() -> Self {
        Self {
            max_retries: MIN_RETRIES,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(30),
            jitter: true,
        }
    }
}
