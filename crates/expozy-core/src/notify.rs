//! The outbound notifier channel: Ingest and the Worker never spawn a
//! detached task to talk to the chat transport. Instead they push onto a bounded
//! [`tokio::sync::mpsc`] channel; a single notifier task owned by the
//! server binary drains it and calls a [`ChatClient`], so backpressure on
//! outbound sends is observable instead of silently dropped.

use crate::{OrchestratorError, OrchestratorResult};
use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::warn;

/// One outbound chat message, queued by Ingest (canned replies, "working
/// on it") or the Worker (terminal outcome).
#[derive(Debug, Clone)]
pub struct Notification {
    pub chat_id: i64,
    pub text: String,
}

impl Notification {
    #[must_use]
    pub fn new(chat_id: i64, text: impl Into<String>) -> Self {
        Self {
            chat_id,
            text: text.into(),
        }
    }
}

/// Cloneable handle onto the bounded notifier channel. Cheap to clone and
/// hand to every request/job task; the channel itself is owned by the
/// server binary's notifier task.
#[derive(Clone)]
pub struct NotificationSender(mpsc::Sender<Notification>);

impl NotificationSender {
    /// Queues a notification, waiting for channel capacity if the
    /// notifier is backed up. This is the explicit backpressure point
    /// in place of a detached `tokio::spawn`.
    pub async fn notify(&self, chat_id: i64, text: impl Into<String>) -> OrchestratorResult<()> {
        self.0
            .send(Notification::new(chat_id, text))
            .await
            .map_err(|_| OrchestratorError::internal("notifier channel closed"))
    }
}

/// Creates the bounded channel, sized from `WebhookConfig::notifier_channel_capacity`.
#[must_use]
pub fn notification_channel(capacity: usize) -> (NotificationSender, mpsc::Receiver<Notification>) {
    let (tx, rx) = mpsc::channel(capacity);
    (NotificationSender(tx), rx)
}

/// The chat transport's send side: given a chat id and text, deliver the
/// message. Implementations are swapped per deployment; this crate only
/// depends on the trait.
#[async_trait]
pub trait ChatClient: Send + Sync {
    async fn send_message(&self, chat_id: i64, text: &str) -> OrchestratorResult<()>;
}

/// A [`ChatClient`] that logs and drops every message, for local/dev runs
/// and unit tests that don't care about outbound delivery.
#[derive(Debug, Default)]
pub struct NoopChatClient;

#[async_trait]
impl ChatClient for NoopChatClient {
    async fn send_message(&self, chat_id: i64, text: &str) -> OrchestratorResult<()> {
        tracing::debug!(chat_id, text, "noop chat client dropped notification");
        Ok(())
    }
}

/// Drains `receiver` until every [`NotificationSender`] clone is dropped,
/// forwarding each notification to `client`. Send failures are logged,
/// not propagated — a chat-transport outage should never take down the
/// worker or ingest paths that queued the notification.
pub async fn run_notifier(
    mut receiver: mpsc::Receiver<Notification>,
    client: std::sync::Arc<dyn ChatClient>,
) {
    while let Some(notification) = receiver.recv().await {
        if let Err(err) = client
            .send_message(notification.chat_id, &notification.text)
            .await
        {
            warn!(
                chat_id = notification.chat_id,
                error = %err,
                "failed to deliver outbound notification"
            );
        }
    }
}
