//! Business counters.
//!
//! Recorded through the `metrics` facade; without an installed recorder they
//! are no-ops, so the host process decides whether and how to export them.

use metrics::counter;

/// An account was created, by tutor-driven creation or self-registration.
pub fn track_account_created(role: &str) {
    counter!("tutordesk_accounts_created_total", "role" => role.to_string()).increment(1);
}

/// An enrollment was inserted, reactivated or deactivated.
pub fn track_enrollment_change(action: &'static str) {
    counter!("tutordesk_enrollment_changes_total", "action" => action).increment(1);
}

/// A write was rejected by a consistency rule.
pub fn track_validation_failure(rule: &'static str) {
    counter!("tutordesk_validation_failures_total", "rule" => rule).increment(1);
}

/// A background task gave up after its last attempt.
pub fn track_task_failure(task: &str) {
    counter!("tutordesk_task_failures_total", "task" => task.to_string()).increment(1);
}
