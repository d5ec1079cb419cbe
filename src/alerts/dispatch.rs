use std::future::Future;

use tracing::{error, warn};

use crate::alerts::evaluator::TriggeredAlert;
use crate::alerts::rules::NotificationChannel;
use crate::error::Result;

/// Outbound notification boundary. In-app messages are stored for the user;
/// email messages are queued for an external sender.
pub trait NotificationDispatcher: Send + Sync {
    fn notify(
        &self,
        user_id: &str,
        channel: NotificationChannel,
        title: &str,
        message: &str,
    ) -> impl Future<Output = Result<()>> + Send;
}

/// Send every notification attached to a fired alert. A failed channel is
/// logged and does not stop the others. Returns the number delivered.
pub async fn dispatch<D: NotificationDispatcher>(dispatcher: &D, triggered: &TriggeredAlert) -> usize {
    let mut delivered = 0;
    for n in triggered.notifications() {
        match dispatcher
            .notify(&n.user_id, n.channel, &n.title, &n.message)
            .await
        {
            Ok(()) => delivered += 1,
            Err(e) => error!(alert_id = %n.alert_id, channel = %n.channel, "notification failed: {e}"),
        }
    }
    if delivered == 0 && triggered.notifications().next().is_some() {
        warn!(alert_id = %triggered.alert.id, "alert fired but no notification was delivered");
    }
    delivered
}
