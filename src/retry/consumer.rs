//! Consumer-group reader for the payment retry stream.
//!
//! Every delivered entry ends acknowledged: paid, rescheduled through the delay
//! queue, abandoned at the attempt ceiling, or dropped as poison / processing
//! error. The acknowledgement always happens before the delay-queue insert, so
//! the group's pending list never holds an entry that already has a successor.
//! A paid order is always `Succeeded`, even when its ack fails and the entry
//! stays in the pending list.

use crate::config::RetryConfig;
use crate::domain::retry::{DeadLetterReason, DeadLetterRecord, DelayEntry, RetryMessage};
use crate::gateways::PaymentGateway;
use crate::retry::attempts::AttemptCounter;
use crate::retry::dead_letter::DeadLetter;
use crate::store::{is_missing_group, DelayQueue, LogStore, StreamEntry};
use anyhow::Result;
use chrono::{DateTime, Utc};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Disposition {
    Succeeded {
        order_id: String,
    },
    Rescheduled {
        order_id: String,
        attempt: u32,
        delay: Duration,
        due_at: DateTime<Utc>,
    },
    Abandoned {
        order_id: String,
        attempts: u32,
    },
    Poisoned {
        message_id: String,
    },
    Failed {
        order_id: String,
    },
}

/// Linear backoff: attempt `n` waits `n * base`.
pub fn backoff_delay(attempt: u32, base: Duration) -> Duration {
    base.saturating_mul(attempt)
}

#[derive(Clone)]
pub struct RetryConsumer {
    pub log: Arc<dyn LogStore>,
    pub queue: Arc<dyn DelayQueue>,
    pub counter: AttemptCounter,
    pub gateway: Arc<dyn PaymentGateway>,
    pub dead_letter: DeadLetter,
    pub config: RetryConfig,
}

impl RetryConsumer {
    pub async fn run(self) {
        loop {
            match self.log.ensure_group(&self.config.stream_key, &self.config.group).await {
                Ok(()) => break,
                Err(err) => {
                    tracing::error!("retry consumer could not create group {}: {:#}", self.config.group, err);
                    tokio::time::sleep(self.config.poll_timeout).await;
                }
            }
        }

        loop {
            match self.drain_pending().await {
                Ok(n) => {
                    if n > 0 {
                        tracing::info!("consumer {} recovered {} pending retry messages", self.config.consumer_name, n);
                    }
                    break;
                }
                Err(err) => {
                    tracing::error!("retry consumer pending drain failed: {:#}", err);
                    tokio::time::sleep(self.config.poll_timeout).await;
                }
            }
        }

        tracing::info!(
            "retry consumer {} reading {} as group {}",
            self.config.consumer_name,
            self.config.stream_key,
            self.config.group
        );

        loop {
            if let Err(err) = self.poll_once().await {
                tracing::error!("retry consumer read failed: {:#}", err);
                if is_missing_group(&err) {
                    if let Err(e) = self.log.ensure_group(&self.config.stream_key, &self.config.group).await {
                        tracing::error!("retry consumer group recreate failed: {:#}", e);
                    }
                }
                tokio::time::sleep(self.config.poll_timeout).await;
            }
        }
    }

    /// Processes entries this consumer received before a restart but never acknowledged.
    pub async fn drain_pending(&self) -> Result<usize> {
        let mut seen = HashSet::new();
        loop {
            let batch = self
                .log
                .read_pending(
                    &self.config.stream_key,
                    &self.config.group,
                    &self.config.consumer_name,
                    self.config.read_count,
                )
                .await?;

            let fresh: Vec<StreamEntry> = batch.into_iter().filter(|e| seen.insert(e.id.clone())).collect();
            if fresh.is_empty() {
                return Ok(seen.len());
            }
            for entry in fresh {
                self.handle(entry).await;
            }
        }
    }

    /// One bounded read of new entries; each is handled to completion before the next.
    pub async fn poll_once(&self) -> Result<Vec<Disposition>> {
        let batch = self
            .log
            .read_group(
                &self.config.stream_key,
                &self.config.group,
                &self.config.consumer_name,
                self.config.read_count,
                self.config.poll_timeout,
            )
            .await?;

        let mut out = Vec::with_capacity(batch.len());
        for entry in batch {
            out.push(self.handle(entry).await);
        }
        Ok(out)
    }

    pub async fn handle(&self, entry: StreamEntry) -> Disposition {
        let Some(raw) = entry.value.as_deref() else {
            return self.drop_poison(&entry.id, None, "entry has no message field").await;
        };

        let message = match serde_json::from_str::<RetryMessage>(raw) {
            Ok(m) => m,
            Err(e) => {
                return self
                    .drop_poison(&entry.id, Some(raw), &format!("undecodable retry message: {}", e))
                    .await;
            }
        };

        match self.process(&entry.id, &message).await {
            Ok(disposition) => disposition,
            Err(err) => {
                self.ack_best_effort(&entry.id).await;
                self.dead_letter
                    .record(DeadLetterRecord {
                        order_id: Some(message.order_id.clone()),
                        message_id: entry.id.clone(),
                        reason: DeadLetterReason::ProcessingError,
                        attempts: 0,
                        detail: format!("{:#}", err),
                        raw: Some(raw.to_string()),
                        failed_at: Utc::now(),
                    })
                    .await;
                Disposition::Failed {
                    order_id: message.order_id,
                }
            }
        }
    }

    async fn process(&self, message_id: &str, message: &RetryMessage) -> Result<Disposition> {
        let order_id = message.order_id.as_str();
        let attempts = self.counter.get(order_id).await?;

        let response = self.gateway.attempt(&message.payload).await?;

        // Paid from here on: store failures are logged, never turned into a dead letter.
        if response.is_success() {
            self.ack_best_effort(message_id).await;
            if let Err(e) = self.counter.clear(order_id).await {
                tracing::error!("attempt counter for paid order {} not cleared: {:#}", order_id, e);
            }
            tracing::info!(
                "payment retry succeeded for order {} after {} failed attempts (txn {})",
                order_id,
                attempts,
                response.transaction_id.as_deref().unwrap_or("-")
            );
            return Ok(Disposition::Succeeded {
                order_id: order_id.to_string(),
            });
        }

        if attempts < self.config.max_attempts {
            let attempt = self.counter.increment(order_id).await?;
            self.ack(message_id).await?;

            let now = Utc::now();
            let delay = backoff_delay(attempt, self.config.base_delay);
            let due_at = now + chrono::Duration::from_std(delay)?;
            let next = RetryMessage {
                enqueued_at: now,
                ..message.clone()
            };
            let entry = DelayEntry {
                message: serde_json::to_string(&next)?,
                due_at,
            };
            self.queue
                .insert(&self.config.delay_queue_key, &entry.message, entry.score())
                .await?;

            tracing::warn!(
                "payment retry failed for order {} ({}), attempt {}/{} rescheduled in {:?}",
                order_id,
                response.error_code.as_deref().unwrap_or("no code"),
                attempt,
                self.config.max_attempts,
                delay
            );
            return Ok(Disposition::Rescheduled {
                order_id: order_id.to_string(),
                attempt,
                delay,
                due_at,
            });
        }

        self.ack(message_id).await?;
        self.counter.clear(order_id).await?;
        self.dead_letter
            .record(DeadLetterRecord {
                order_id: Some(order_id.to_string()),
                message_id: message_id.to_string(),
                reason: DeadLetterReason::CeilingExceeded,
                attempts,
                detail: format!("payment still failing after {} retries", attempts),
                raw: serde_json::to_string(message).ok(),
                failed_at: Utc::now(),
            })
            .await;

        Ok(Disposition::Abandoned {
            order_id: order_id.to_string(),
            attempts,
        })
    }

    async fn drop_poison(&self, message_id: &str, raw: Option<&str>, detail: &str) -> Disposition {
        tracing::warn!("dropping poison retry message {}: {}", message_id, detail);
        self.ack_best_effort(message_id).await;
        self.dead_letter
            .record(DeadLetterRecord {
                order_id: None,
                message_id: message_id.to_string(),
                reason: DeadLetterReason::Poison,
                attempts: 0,
                detail: detail.to_string(),
                raw: raw.map(str::to_string),
                failed_at: Utc::now(),
            })
            .await;
        Disposition::Poisoned {
            message_id: message_id.to_string(),
        }
    }

    async fn ack(&self, message_id: &str) -> Result<()> {
        self.log
            .acknowledge(&self.config.stream_key, &self.config.group, message_id)
            .await
    }

    async fn ack_best_effort(&self, message_id: &str) {
        if let Err(e) = self.ack(message_id).await {
            tracing::error!("ack failed for retry message {}: {:#}", message_id, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_is_linear_in_attempt_number() {
        let base = Duration::from_secs(10);
        assert_eq!(backoff_delay(1, base), Duration::from_secs(10));
        assert_eq!(backoff_delay(2, base), Duration::from_secs(20));
        assert_eq!(backoff_delay(3, base), Duration::from_secs(30));
        assert_eq!(backoff_delay(0, base), Duration::ZERO);
    }
}
