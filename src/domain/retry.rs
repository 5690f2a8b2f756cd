use crate::domain::payment::PaymentRequest;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Stream entry field holding the serialized message.
pub const MESSAGE_FIELD: &str = "message";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryMessage {
    pub order_id: String,
    pub payload: PaymentRequest,
    pub enqueued_at: DateTime<Utc>,
}

impl RetryMessage {
    pub fn new(request: &PaymentRequest, enqueued_at: DateTime<Utc>) -> Self {
        Self {
            order_id: request.order_id.clone(),
            payload: request.clone(),
            enqueued_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DelayEntry {
    pub message: String,
    pub due_at: DateTime<Utc>,
}

impl DelayEntry {
    pub fn score(&self) -> f64 {
        self.due_at.timestamp_millis() as f64
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DeadLetterReason {
    CeilingExceeded,
    Poison,
    ProcessingError,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeadLetterRecord {
    pub order_id: Option<String>,
    pub message_id: String,
    pub reason: DeadLetterReason,
    pub attempts: u32,
    pub detail: String,
    pub raw: Option<String>,
    pub failed_at: DateTime<Utc>,
}
