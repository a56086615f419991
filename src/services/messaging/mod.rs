pub mod twilio;

use async_trait::async_trait;

#[async_trait]
pub trait MessagingProvider: Send + Sync {
    async fn send_message(&self, to: &str, body: &str) -> anyhow::Result<()>;
}

/// Fallback when no SMS gateway is configured: the message only goes to the log.
pub struct LogMessaging;

#[async_trait]
impl MessagingProvider for LogMessaging {
    async fn send_message(&self, to: &str, body: &str) -> anyhow::Result<()> {
        tracing::info!(to = %to, body = %body, "notification (log only)");
        Ok(())
    }
}
