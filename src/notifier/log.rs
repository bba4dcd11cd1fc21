use futures::future::BoxFuture;
use tracing::info;

use super::{ChatNotification, Notifier, NotifyResult, UserNotification};

/// Notifier that only logs. Installed when no bot token is configured so the
/// lifecycle stays exercisable in local runs.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify_chat(&self, chat_id: i64, note: ChatNotification) -> BoxFuture<'static, NotifyResult> {
        info!(chat_id, note = ?note, "chat notification (log only)");
        Box::pin(async { Ok(()) })
    }

    fn notify_user(&self, user_id: i64, note: UserNotification) -> BoxFuture<'static, NotifyResult> {
        info!(user_id, note = ?note, "user notification (log only)");
        Box::pin(async { Ok(()) })
    }
}
