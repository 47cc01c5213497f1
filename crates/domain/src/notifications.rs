use serde::{Deserialize, Serialize};

use crate::ports::notifications::NotificationSender;

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum NotificationRecipient {
    DraftingCenter(String),
    User(String),
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum NotificationEvent {
    AssignmentCreated,
    AssignmentAccepted,
    AssignmentRejected,
    AssignmentUpdated,
}

impl NotificationEvent {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AssignmentCreated => "assignment_created",
            Self::AssignmentAccepted => "assignment_accepted",
            Self::AssignmentRejected => "assignment_rejected",
            Self::AssignmentUpdated => "assignment_updated",
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Notification {
    pub recipient: NotificationRecipient,
    pub event: NotificationEvent,
    pub assignment_id: String,
    pub sketch_request_id: String,
    pub message: String,
    pub created_at_ms: i64,
}

/// Delivery is best effort: failures are logged and never reach the caller.
pub async fn dispatch(sender: &dyn NotificationSender, notification: Notification) {
    if let Err(err) = sender.send(&notification).await {
        tracing::warn!(
            error = %err,
            event = notification.event.as_str(),
            assignment_id = %notification.assignment_id,
            "notification dropped"
        );
    }
}
