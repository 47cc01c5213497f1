use sketchdesk_domain::notifications::{Notification, NotificationRecipient};
use sketchdesk_domain::ports::BoxFuture;
use sketchdesk_domain::ports::notifications::{NotificationError, NotificationSender};

/// Delivers notifications into the structured log stream. Stands in until a
/// push or e-mail channel is wired.
#[derive(Debug, Default, Clone)]
pub struct TracingNotificationSender;

impl NotificationSender for TracingNotificationSender {
    fn send(&self, notification: &Notification) -> BoxFuture<'_, Result<(), NotificationError>> {
        let notification = notification.clone();
        Box::pin(async move {
            let (recipient_kind, recipient_id) = match &notification.recipient {
                NotificationRecipient::DraftingCenter(id) => ("drafting_center", id.as_str()),
                NotificationRecipient::User(id) => ("user", id.as_str()),
            };
            tracing::info!(
                recipient_kind,
                recipient_id,
                event = notification.event.as_str(),
                assignment_id = %notification.assignment_id,
                sketch_request_id = %notification.sketch_request_id,
                message = %notification.message,
                "notification delivered"
            );
            Ok(())
        })
    }
}
