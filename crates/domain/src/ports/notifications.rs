use thiserror::Error;

use crate::notifications::Notification;
use crate::ports::BoxFuture;

#[derive(Debug, Error)]
pub enum NotificationError {
    #[error("notification delivery failed: {0}")]
    Delivery(String),
}

pub trait NotificationSender: Send + Sync {
    fn send(&self, notification: &Notification) -> BoxFuture<'_, Result<(), NotificationError>>;
}
