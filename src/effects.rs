//! Work that follows a committed write.
//!
//! Services return an [`Outcome`]: the committed value plus the cache
//! invalidations and notifications it implies. Nothing in an outcome runs
//! until [`Outcome::apply`] is called, so a rolled-back call never leaves
//! side effects behind.

use std::sync::Arc;

use tutordesk_cache::{CacheInvalidator, CacheTarget, NoopCache};

use crate::notifications::{Notification, Notifier, TracingNotifier};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    Invalidate(CacheTarget),
    Notify(Notification),
}

#[derive(Debug, Clone)]
#[must_use = "effects only run when the outcome is applied"]
pub struct Outcome<T> {
    pub value: T,
    pub effects: Vec<Effect>,
}

impl<T> Outcome<T> {
    pub fn new(value: T) -> Self {
        Self {
            value,
            effects: Vec::new(),
        }
    }

    pub fn with(mut self, effect: Effect) -> Self {
        self.effects.push(effect);
        self
    }

    pub fn invalidate(self, target: CacheTarget) -> Self {
        self.with(Effect::Invalidate(target))
    }

    pub fn notify(self, notification: Notification) -> Self {
        self.with(Effect::Notify(notification))
    }

    /// Runs the effects in order and returns the value.
    pub async fn apply(self, hooks: &Hooks) -> T {
        for effect in self.effects {
            match effect {
                Effect::Invalidate(target) => hooks.cache.invalidate(&target).await,
                Effect::Notify(notification) => hooks.notifier.notify(notification),
            }
        }
        self.value
    }

    /// Drops the effects.
    pub fn into_value(self) -> T {
        self.value
    }

    pub fn notifications(&self) -> impl Iterator<Item = &Notification> {
        self.effects.iter().filter_map(|effect| match effect {
            Effect::Notify(notification) => Some(notification),
            Effect::Invalidate(_) => None,
        })
    }
}

/// Where effects go.
#[derive(Clone)]
pub struct Hooks {
    pub cache: Arc<dyn CacheInvalidator>,
    pub notifier: Arc<dyn Notifier>,
}

impl Hooks {
    pub fn new(cache: Arc<dyn CacheInvalidator>, notifier: Arc<dyn Notifier>) -> Self {
        Self { cache, notifier }
    }

    /// No cache, notifications only logged.
    pub fn disabled() -> Self {
        Self::new(Arc::new(NoopCache), Arc::new(TracingNotifier))
    }
}

impl std::fmt::Debug for Hooks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Hooks").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notifications::NotificationEvent;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use tutordesk_models::UserId;

    #[derive(Default)]
    struct Recorder {
        log: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl CacheInvalidator for Recorder {
        async fn invalidate(&self, target: &CacheTarget) {
            self.log.lock().unwrap().push(format!("cache {target:?}"));
        }
    }

    impl Notifier for Recorder {
        fn notify(&self, notification: Notification) {
            self.log
                .lock()
                .unwrap()
                .push(format!("notify {}", notification.event.name()));
        }
    }

    #[tokio::test]
    async fn test_apply_runs_effects_in_order() {
        let recorder = Arc::new(Recorder::default());
        let hooks = Hooks::new(recorder.clone(), recorder.clone());
        let student = UserId::new();

        let value = Outcome::new(7)
            .invalidate(CacheTarget::Enrollments(student))
            .notify(Notification::new(
                UserId::new(),
                NotificationEvent::TutorAssigned { student_id: student },
            ))
            .apply(&hooks)
            .await;

        assert_eq!(value, 7);
        let log = recorder.log.lock().unwrap();
        assert_eq!(log.len(), 2);
        assert!(log[0].starts_with("cache Enrollments"));
        assert_eq!(log[1], "notify tutor_assigned");
    }

    #[test]
    fn test_into_value_skips_effects() {
        let outcome = Outcome::new("x").invalidate(CacheTarget::TutorRoster(UserId::new()));
        assert_eq!(outcome.effects.len(), 1);
        assert_eq!(outcome.into_value(), "x");
    }
}
