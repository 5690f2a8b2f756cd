mod common;

use anyhow::{anyhow, Result};
use chrono::{DateTime, Utc};
use common::{request, retry_config, FlakyLog};
use payments_retry::domain::retry::RetryMessage;
use payments_retry::repo::outbox_repo::{OutboxItem, OutboxStore};
use payments_retry::retry::producer::RetryProducer;
use payments_retry::retry::sink::{OutboxRetrySink, RetrySink};
use payments_retry::service::outbox_relay::{OutboxRelay, RelayReport};
use payments_retry::store::store_memory::MemoryStore;
use std::collections::{BTreeMap, HashSet};
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone, PartialEq)]
enum RowStatus {
    Pending,
    Processing,
    Published(String),
}

#[derive(Debug, Clone)]
struct Row {
    order_id: String,
    payload: serde_json::Value,
    attempts: i32,
    status: RowStatus,
}

/// Outbox table kept in memory; `broken_marks` lists rows whose publish bookkeeping fails.
#[derive(Default)]
struct TableOutbox {
    rows: Mutex<BTreeMap<i64, Row>>,
    broken_marks: Mutex<HashSet<i64>>,
}

impl TableOutbox {
    fn status(&self, id: i64) -> RowStatus {
        self.rows.lock().unwrap()[&id].status.clone()
    }
}

#[async_trait::async_trait]
impl OutboxStore for TableOutbox {
    async fn insert(&self, order_id: &str, payload_json: serde_json::Value) -> Result<i64> {
        let mut rows = self.rows.lock().unwrap();
        let id = rows.len() as i64 + 1;
        rows.insert(
            id,
            Row {
                order_id: order_id.to_string(),
                payload: payload_json,
                attempts: 0,
                status: RowStatus::Pending,
            },
        );
        Ok(id)
    }

    async fn lock_pending(&self, batch_size: i64) -> Result<Vec<OutboxItem>> {
        let mut rows = self.rows.lock().unwrap();
        let mut out = Vec::new();
        for (id, row) in rows.iter_mut() {
            if out.len() as i64 >= batch_size {
                break;
            }
            if row.status == RowStatus::Pending {
                row.status = RowStatus::Processing;
                out.push(OutboxItem {
                    id: *id,
                    order_id: row.order_id.clone(),
                    payload_json: row.payload.clone(),
                    attempts: row.attempts,
                });
            }
        }
        Ok(out)
    }

    async fn mark_published(&self, id: i64, message_id: &str) -> Result<()> {
        if self.broken_marks.lock().unwrap().contains(&id) {
            return Err(anyhow!("connection reset"));
        }
        if let Some(row) = self.rows.lock().unwrap().get_mut(&id) {
            row.status = RowStatus::Published(message_id.to_string());
        }
        Ok(())
    }

    async fn mark_retry(&self, id: i64, attempts: i32, _next_attempt_at: DateTime<Utc>) -> Result<()> {
        if let Some(row) = self.rows.lock().unwrap().get_mut(&id) {
            row.status = RowStatus::Pending;
            row.attempts = attempts;
        }
        Ok(())
    }

    async fn release_stuck(&self, _older_than_secs: i64) -> Result<u64> {
        let mut released = 0;
        for row in self.rows.lock().unwrap().values_mut() {
            if row.status == RowStatus::Processing {
                row.status = RowStatus::Pending;
                released += 1;
            }
        }
        Ok(released)
    }
}

#[tokio::test]
async fn outbox_sink_stores_a_decodable_retry_message() {
    let outbox = Arc::new(TableOutbox::default());
    let sink = OutboxRetrySink { outbox: outbox.clone() };

    sink.enqueue(&request("O1")).await.unwrap();

    assert_eq!(sink.kind(), "outbox");
    let rows = outbox.rows.lock().unwrap();
    let msg: RetryMessage = serde_json::from_value(rows[&1].payload.clone()).unwrap();
    assert_eq!(msg.payload, request("O1"));
    assert_eq!(rows[&1].status, RowStatus::Pending);
}

#[tokio::test]
async fn failed_bookkeeping_on_one_row_does_not_abort_the_batch() {
    let store = MemoryStore::new();
    let outbox = Arc::new(TableOutbox::default());
    let sink = OutboxRetrySink { outbox: outbox.clone() };
    for order in ["A", "B", "C"] {
        sink.enqueue(&request(order)).await.unwrap();
    }
    outbox.broken_marks.lock().unwrap().insert(1);

    let relay = OutboxRelay {
        outbox: outbox.clone(),
        producer: RetryProducer::new(Arc::new(store.clone()), retry_config().stream_key),
    };

    let report = relay.tick().await.unwrap();
    assert_eq!(report, RelayReport { published: 2, retried: 0, failed: 1 });
    assert_eq!(store.stream_len(&retry_config().stream_key).await, 3);
    assert_eq!(outbox.status(1), RowStatus::Processing);
    assert!(matches!(outbox.status(2), RowStatus::Published(_)));
    assert!(matches!(outbox.status(3), RowStatus::Published(_)));

    relay.release_stuck().await;
    assert_eq!(outbox.status(1), RowStatus::Pending);

    outbox.broken_marks.lock().unwrap().clear();
    let report = relay.tick().await.unwrap();
    assert_eq!(report, RelayReport { published: 1, retried: 0, failed: 0 });
}

#[tokio::test]
async fn append_failure_reschedules_the_row_with_backoff() {
    let outbox = Arc::new(TableOutbox::default());
    let sink = OutboxRetrySink { outbox: outbox.clone() };
    sink.enqueue(&request("DOWN")).await.unwrap();
    sink.enqueue(&request("UP")).await.unwrap();

    let flaky = FlakyLog {
        inner: MemoryStore::new(),
        needle: "DOWN".to_string(),
    };
    let relay = OutboxRelay {
        outbox: outbox.clone(),
        producer: RetryProducer::new(Arc::new(flaky), retry_config().stream_key),
    };

    let report = relay.tick().await.unwrap();
    assert_eq!(report, RelayReport { published: 1, retried: 1, failed: 0 });
    assert_eq!(outbox.status(1), RowStatus::Pending);
    assert_eq!(outbox.rows.lock().unwrap()[&1].attempts, 1);
}
