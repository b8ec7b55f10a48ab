//! Background task execution with retries.
//!
//! Work is submitted as a closure producing a future. Transient failures are
//! retried with exponential backoff, capped and jittered; permanent failures
//! and exhausted retries are written to a [`FailureLog`] for operators.

use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rand::Rng;
use tokio::task::JoinHandle;
use tracing::{error, instrument, warn};
use tutordesk_config::TaskConfig;
use tutordesk_config::tasks::MIN_RETRIES;
use tutordesk_db::{PgStore, StoreError};
use tutordesk_observability::track_task_failure;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TaskError {
    /// Worth another attempt: timeouts, connection loss.
    #[error("transient failure: {0}")]
    Transient(String),

    #[error("permanent failure: {0}")]
    Permanent(String),
}

impl From<StoreError> for TaskError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Transient(_) => TaskError::Transient(err.to_string()),
            _ => TaskError::Permanent(err.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub jitter: bool,
}

impl RetryPolicy {
    pub fn from_config(config: &TaskConfig) -> Self {
        Self {
            max_retries: config.max_retries.max(MIN_RETRIES),
            base_delay: config.base_delay,
            max_delay: config.max_delay.max(config.base_delay),
            jitter: config.jitter,
        }
    }

    /// `base * 2^retry`, capped at `max_delay`. `retry` counts from zero.
    pub fn backoff(&self, retry: u32) -> Duration {
        let factor = 2u32.checked_pow(retry).unwrap_or(u32::MAX);
        self.base_delay
            .checked_mul(factor)
            .map_or(self.max_delay, |delay| delay.min(self.max_delay))
    }

    /// Delay before `retry`: the backoff, or a uniform draw below it when
    /// jitter is on.
    pub fn delay(&self, retry: u32) -> Duration {
        let backoff = self.backoff(retry);
        if !self.jitter || backoff.is_zero() {
            return backoff;
        }
        let millis = backoff.as_millis().min(u64::MAX as u128) as u64;
        Duration::from_millis(rand::thread_rng().gen_range(0..=millis))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&TaskConfig::default())
    }
}

/// Terminal failure of a task, kept for operators.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailureRecord {
    pub id: Uuid,
    pub task_name: String,
    pub attempts: u32,
    pub last_error: String,
    pub failed_at: DateTime<Utc>,
}

#[async_trait]
pub trait FailureLog: Send + Sync {
    async fn record(&self, record: &FailureRecord) -> Result<(), StoreError>;
}

/// Durable log in the `task_failures` table.
#[async_trait]
impl FailureLog for PgStore {
    async fn record(&self, record: &FailureRecord) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO task_failures (id, task_name, attempts, last_error, failed_at) \
             VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(record.id)
        .bind(&record.task_name)
        .bind(i32::try_from(record.attempts).unwrap_or(i32::MAX))
        .bind(&record.last_error)
        .bind(record.failed_at)
        .execute(self.pool())
        .await
        .map_err(StoreError::from_sqlx)?;
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct MemoryFailureLog {
    records: Mutex<Vec<FailureRecord>>,
}

impl MemoryFailureLog {
    pub fn records(&self) -> Vec<FailureRecord> {
        self.records
            .lock()
            .map(|records| records.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl FailureLog for MemoryFailureLog {
    async fn record(&self, record: &FailureRecord) -> Result<(), StoreError> {
        if let Ok(mut records) = self.records.lock() {
            records.push(record.clone());
        }
        Ok(())
    }
}

/// Result of a submitted task.
#[derive(Debug)]
pub struct TaskHandle<T> {
    inner: JoinHandle<Result<T, TaskError>>,
}

impl<T> TaskHandle<T> {
    /// Waits for the task to succeed or give up.
    pub async fn join(self) -> Result<T, TaskError> {
        match self.inner.await {
            Ok(result) => result,
            Err(e) => Err(TaskError::Permanent(format!("task did not complete: {e}"))),
        }
    }
}

#[derive(Clone)]
pub struct TaskQueue {
    policy: RetryPolicy,
    failures: Arc<dyn FailureLog>,
}

impl std::fmt::Debug for TaskQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskQueue")
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

impl TaskQueue {
    pub fn new(policy: RetryPolicy, failures: Arc<dyn FailureLog>) -> Self {
        Self { policy, failures }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Runs `job` on the tokio runtime until it succeeds, fails permanently,
    /// or has been retried `max_retries` times. Must be called from within a
    /// runtime.
    pub fn submit<T, F, Fut>(&self, name: &'static str, job: F) -> TaskHandle<T>
    where
        T: Send + 'static,
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, TaskError>> + Send + 'static,
    {
        let queue = self.clone();
        TaskHandle {
            inner: tokio::spawn(async move { queue.run(name, job).await }),
        }
    }

    #[instrument(skip(self, job), fields(task = name))]
    async fn run<T, F, Fut>(&self, name: &'static str, mut job: F) -> Result<T, TaskError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, TaskError>>,
    {
        let mut retry = 0;
        loop {
            let err = match job().await {
                Ok(value) => return Ok(value),
                Err(err) => err,
            };

            if matches!(err, TaskError::Transient(_)) && retry < self.policy.max_retries {
                let delay = self.policy.delay(retry);
                warn!(
                    error = %err,
                    attempt = retry + 1,
                    delay_ms = delay.as_millis() as u64,
                    "Task failed, retrying"
                );
                tokio::time::sleep(delay).await;
                retry += 1;
                continue;
            }

            self.give_up(name, retry + 1, &err).await;
            return Err(err);
        }
    }

    async fn give_up(&self, name: &'static str, attempts: u32, err: &TaskError) {
        error!(error = %err, attempts, "Task failed permanently");
        track_task_failure(name);

        let record = FailureRecord {
            id: Uuid::new_v4(),
            task_name: name.to_string(),
            attempts,
            last_error: err.to_string(),
            failed_at: Utc::now(),
        };
        if let Err(e) = self.failures.record(&record).await {
            error!(error = %e, "Failed to record task failure");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy(jitter: bool) -> RetryPolicy {
        RetryPolicy {
            max_retries: 3,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_millis(350),
            jitter,
        }
    }

    #[test]
    fn test_backoff_doubles_and_caps() {
        let policy = policy(false);
        assert_eq!(policy.backoff(0), Duration::from_millis(100));
        assert_eq!(policy.backoff(1), Duration::from_millis(200));
        assert_eq!(policy.backoff(2), Duration::from_millis(350));
        assert_eq!(policy.backoff(40), Duration::from_millis(350));
    }

    #[test]
    fn test_jitter_stays_below_backoff() {
        let policy = policy(true);
        for retry in 0..5 {
            assert!(policy.delay(retry) <= policy.backoff(retry));
        }
    }

    #[test]
    fn test_config_cannot_lower_retries() {
        let config = TaskConfig {
            max_retries: 1,
            ..TaskConfig::default()
        };
        assert_eq!(RetryPolicy::from_config(&config).max_retries, MIN_RETRIES);
    }

    #[test]
    fn test_store_errors_classify() {
        assert!(matches!(
            TaskError::from(StoreError::transient("reset")),
            TaskError::Transient(_)
        ));
        assert!(matches!(
            TaskError::from(StoreError::NotFound("user")),
            TaskError::Permanent(_)
        ));
    }
}
