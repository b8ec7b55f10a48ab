//! Messages to users about changes that concern them.
//!
//! Services emit [`Notification`]s only after their transaction commits.
//! Delivery is best-effort: a [`Notifier`] never reports failure back to the
//! caller, and [`DeliveryNotifier`] hands each message to the retrying
//! [`TaskQueue`].

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use tracing::{debug, info};
use tutordesk_models::{Role, SubjectId, UserId, Username};

use crate::tasks::{TaskError, TaskQueue};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum NotificationEvent {
    AccountCreated {
        user_id: UserId,
        username: Username,
        role: Role,
    },
    SubjectAssigned {
        student_id: UserId,
        subject_id: SubjectId,
    },
    SubjectUnassigned {
        student_id: UserId,
        subject_id: SubjectId,
    },
    TutorAssigned {
        student_id: UserId,
    },
    ParentLinked {
        student_id: UserId,
    },
}

impl NotificationEvent {
    pub fn name(&self) -> &'static str {
        match self {
            NotificationEvent::AccountCreated { .. } => "account_created",
            NotificationEvent::SubjectAssigned { .. } => "subject_assigned",
            NotificationEvent::SubjectUnassigned { .. } => "subject_unassigned",
            NotificationEvent::TutorAssigned { .. } => "tutor_assigned",
            NotificationEvent::ParentLinked { .. } => "parent_linked",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notification {
    pub recipient: UserId,
    #[serde(flatten)]
    pub event: NotificationEvent,
}

impl Notification {
    pub fn new(recipient: UserId, event: NotificationEvent) -> Self {
        Self { recipient, event }
    }
}

/// Accepts notifications for delivery. Must not block.
pub trait Notifier: Send + Sync {
    fn notify(&self, notification: Notification);
}

/// Writes notifications to the log and nothing else.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify(&self, notification: Notification) {
        info!(
            recipient = %notification.recipient,
            event = notification.event.name(),
            "Notification"
        );
    }
}

/// Where a notification finally goes: a messenger bot, email, a webhook.
#[async_trait]
pub trait DeliveryChannel: Send + Sync {
    async fn deliver(&self, notification: &Notification) -> Result<(), TaskError>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TracingChannel;

#[async_trait]
impl DeliveryChannel for TracingChannel {
    async fn deliver(&self, notification: &Notification) -> Result<(), TaskError> {
        let payload = serde_json::to_string(notification)
            .map_err(|e| TaskError::Permanent(e.to_string()))?;
        info!(recipient = %notification.recipient, %payload, "Delivered notification");
        Ok(())
    }
}

/// Delivers each notification through `channel` as a background task.
#[derive(Clone)]
pub struct DeliveryNotifier {
    queue: TaskQueue,
    channel: Arc<dyn DeliveryChannel>,
}

impl DeliveryNotifier {
    pub fn new(queue: TaskQueue, channel: Arc<dyn DeliveryChannel>) -> Self {
        Self { queue, channel }
    }
}

impl Notifier for DeliveryNotifier {
    fn notify(&self, notification: Notification) {
        debug!(
            recipient = %notification.recipient,
            event = notification.event.name(),
            "Queueing notification"
        );
        let channel = self.channel.clone();
        // The handle is dropped; failures end up in the failure log.
        let _ = self.queue.submit("notify", move || {
            let channel = channel.clone();
            let notification = notification.clone();
            async move { channel.deliver(&notification).await }
        });
    }
}
