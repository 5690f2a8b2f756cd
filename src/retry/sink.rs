use crate::domain::payment::PaymentRequest;
use crate::domain::retry::RetryMessage;
use crate::repo::outbox_repo::OutboxStore;
use anyhow::Result;
use std::sync::Arc;

/// Where a failed payment goes to be retried later.
#[async_trait::async_trait]
pub trait RetrySink: Send + Sync {
    fn kind(&self) -> &'static str;

    async fn enqueue(&self, request: &PaymentRequest) -> Result<()>;
}

/// Writes the retry message to Postgres; `OutboxRelay` moves it onto the stream.
#[derive(Clone)]
pub struct OutboxRetrySink {
    pub outbox: Arc<dyn OutboxStore>,
}

#[async_trait::async_trait]
impl RetrySink for OutboxRetrySink {
    fn kind(&self) -> &'static str {
        "outbox"
    }

    async fn enqueue(&self, request: &PaymentRequest) -> Result<()> {
        let message = RetryMessage::new(request, chrono::Utc::now());
        let id = self
            .outbox
            .insert(&message.order_id, serde_json::to_value(&message)?)
            .await?;
        tracing::info!("stored payment retry for order {} in outbox row {}", message.order_id, id);
        Ok(())
    }
}
