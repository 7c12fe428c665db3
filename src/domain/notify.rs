//! Notification transport interface

use async_trait::async_trait;

use crate::shared::errors::NotifyError;

/// Delivers one text message to a recipient. The transport may fail; the
/// dispatcher logs and drops, it never retries or queues.
#[async_trait]
pub trait NotificationSender: Send + Sync {
    async fn send(&self, recipient: i64, text: &str) -> Result<(), NotifyError>;
}
