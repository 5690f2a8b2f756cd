use crate::retry::producer::RetryProducer;
use crate::store::DelayQueue;
use anyhow::Result;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickReport {
    pub due: usize,
    pub promoted: usize,
    pub failed: usize,
}

/// Moves due delay-queue members back onto the retry stream as new entries.
#[derive(Clone)]
pub struct DelayScheduler {
    pub producer: RetryProducer,
    pub queue: Arc<dyn DelayQueue>,
    pub queue_key: String,
    pub interval: Duration,
}

impl DelayScheduler {
    pub async fn run(self) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        tracing::info!("delay scheduler polling {} every {:?}", self.queue_key, self.interval);

        loop {
            ticker.tick().await;
            match self.tick().await {
                Ok(report) if report.failed > 0 => {
                    tracing::warn!(
                        "delay scheduler promoted {}/{} due retries, {} failed",
                        report.promoted,
                        report.due,
                        report.failed
                    );
                }
                Ok(report) if report.promoted > 0 => {
                    tracing::debug!("delay scheduler promoted {} due retries", report.promoted);
                }
                Ok(_) => {}
                Err(err) => tracing::error!("delay scheduler tick failed: {:#}", err),
            }
        }
    }

    pub async fn tick(&self) -> Result<TickReport> {
        self.tick_at(Utc::now()).await
    }

    /// Append first, remove second: a crash in between re-delivers rather than loses.
    pub async fn tick_at(&self, now: DateTime<Utc>) -> Result<TickReport> {
        let due = self
            .queue
            .range_by_score(&self.queue_key, 0.0, now.timestamp_millis() as f64)
            .await?;

        let mut report = TickReport {
            due: due.len(),
            ..TickReport::default()
        };

        for member in due {
            match self.producer.append_raw(&member).await {
                Ok(id) => {
                    report.promoted += 1;
                    tracing::info!("promoted delayed retry as {}", id);
                    if let Err(e) = self.queue.remove(&self.queue_key, &member).await {
                        tracing::error!("delayed retry re-appended as {} but not removed from queue: {:#}", id, e);
                    }
                }
                Err(e) => {
                    report.failed += 1;
                    tracing::error!("failed to promote delayed retry, keeping it queued: {:#}", e);
                }
            }
        }

        Ok(report)
    }
}
