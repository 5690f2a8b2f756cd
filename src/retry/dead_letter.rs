use crate::domain::retry::DeadLetterRecord;
use crate::store::LogStore;
use std::sync::Arc;

/// Terminal outcomes that will not be retried again. Always logged; also appended to a
/// dead-letter stream when one is configured. Never fails the caller.
#[derive(Clone)]
pub struct DeadLetter {
    pub log: Arc<dyn LogStore>,
    pub stream_key: Option<String>,
}

impl DeadLetter {
    pub async fn record(&self, record: DeadLetterRecord) {
        tracing::error!(
            order_id = record.order_id.as_deref().unwrap_or("-"),
            message_id = %record.message_id,
            reason = ?record.reason,
            attempts = record.attempts,
            "payment retry dead-lettered: {}",
            record.detail
        );

        let Some(stream_key) = &self.stream_key else {
            return;
        };

        let payload = match serde_json::to_string(&record) {
            Ok(p) => p,
            Err(e) => {
                tracing::error!("dead letter encode failed for {}: {}", record.message_id, e);
                return;
            }
        };

        if let Err(e) = self.log.append(stream_key, &payload).await {
            tracing::error!("dead letter append to {} failed for {}: {}", stream_key, record.message_id, e);
        }
    }
}
