use crate::domain::payment::PaymentRequest;
use crate::domain::retry::RetryMessage;
use crate::retry::sink::RetrySink;
use crate::store::LogStore;
use anyhow::Result;
use std::sync::Arc;

#[derive(Clone)]
pub struct RetryProducer {
    pub log: Arc<dyn LogStore>,
    pub stream_key: String,
}

impl RetryProducer {
    pub fn new(log: Arc<dyn LogStore>, stream_key: impl Into<String>) -> Self {
        Self {
            log,
            stream_key: stream_key.into(),
        }
    }

    /// Appends one retry message for a failed payment. Append failures go back to the caller.
    pub async fn enqueue_retry(&self, request: &PaymentRequest) -> Result<String> {
        let message = RetryMessage::new(request, chrono::Utc::now());
        let payload = serde_json::to_string(&message)?;
        let id = self.append_raw(&payload).await?;
        tracing::info!("queued payment retry for order {} as {}", message.order_id, id);
        Ok(id)
    }

    pub async fn append_raw(&self, payload: &str) -> Result<String> {
        self.log.append(&self.stream_key, payload).await
    }
}

#[async_trait::async_trait]
impl RetrySink for RetryProducer {
    fn kind(&self) -> &'static str {
        "stream"
    }

    async fn enqueue(&self, request: &PaymentRequest) -> Result<()> {
        self.enqueue_retry(request).await.map(|_| ())
    }
}
