use crate::repo::outbox_repo::OutboxStore;
use crate::retry::producer::RetryProducer;
use anyhow::Result;
use chrono::{Duration, Utc};
use std::sync::Arc;
use std::time::Instant;

const BATCH_SIZE: i64 = 100;
const STUCK_AFTER_SECS: i64 = 60;
const RELEASE_EVERY: std::time::Duration = std::time::Duration::from_secs(30);

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RelayReport {
    pub published: usize,
    pub retried: usize,
    pub failed: usize,
}

#[derive(Clone)]
pub struct OutboxRelay {
    pub outbox: Arc<dyn OutboxStore>,
    pub producer: RetryProducer,
}

pub fn relay_backoff_secs(attempts: i32) -> i64 {
    i64::min(300, 2_i64.pow(attempts.clamp(0, 9) as u32))
}

impl OutboxRelay {
    pub async fn run(self) {
        let mut last_release: Option<Instant> = None;

        loop {
            if last_release.map_or(true, |at| at.elapsed() >= RELEASE_EVERY) {
                self.release_stuck().await;
                last_release = Some(Instant::now());
            }

            match self.tick().await {
                Ok(report) if report.failed > 0 => tracing::warn!(
                    "outbox relay published {}, rescheduled {}, {} rows left for release",
                    report.published,
                    report.retried,
                    report.failed
                ),
                Ok(_) => {}
                Err(err) => tracing::error!("outbox relay error: {}", err),
            }
            tokio::time::sleep(std::time::Duration::from_millis(200)).await;
        }
    }

    pub async fn release_stuck(&self) {
        match self.outbox.release_stuck(STUCK_AFTER_SECS).await {
            Ok(0) => {}
            Ok(n) => tracing::warn!("released {} stuck outbox rows", n),
            Err(err) => tracing::error!("outbox release failed: {}", err),
        }
    }

    /// One claimed batch. Rows are independent: a row whose bookkeeping fails stays
    /// PROCESSING until `release_stuck` hands it back.
    pub async fn tick(&self) -> Result<RelayReport> {
        let batch = self.outbox.lock_pending(BATCH_SIZE).await?;
        let mut report = RelayReport::default();

        for item in batch {
            let appended = match serde_json::to_string(&item.payload_json) {
                Ok(payload) => self.producer.append_raw(&payload).await,
                Err(e) => Err(e.into()),
            };

            match appended {
                Ok(message_id) => match self.outbox.mark_published(item.id, &message_id).await {
                    Ok(()) => report.published += 1,
                    Err(e) => {
                        report.failed += 1;
                        tracing::error!(
                            "outbox row {} appended as {} but not marked published: {}",
                            item.id,
                            message_id,
                            e
                        );
                    }
                },
                Err(e) => {
                    tracing::warn!("append failed for outbox row {} (order {}): {}", item.id, item.order_id, e);
                    let attempts = item.attempts + 1;
                    let next_attempt_at = Utc::now() + Duration::seconds(relay_backoff_secs(attempts));
                    match self.outbox.mark_retry(item.id, attempts, next_attempt_at).await {
                        Ok(()) => report.retried += 1,
                        Err(e) => {
                            report.failed += 1;
                            tracing::error!("outbox row {} could not be rescheduled: {}", item.id, e);
                        }
                    }
                }
            }
        }

        Ok(report)
    }
}
