use anyhow::Result;
use std::time::Duration;

pub mod store_memory;
pub mod store_redis;

/// The consumer group (or its stream) does not exist, e.g. after the key was deleted.
#[derive(Debug, thiserror::Error)]
#[error("NOGROUP no consumer group '{group}' on stream '{stream}'")]
pub struct MissingGroup {
    pub stream: String,
    pub group: String,
}

impl MissingGroup {
    pub fn new(stream: &str, group: &str) -> Self {
        Self {
            stream: stream.to_string(),
            group: group.to_string(),
        }
    }
}

pub fn is_missing_group(err: &anyhow::Error) -> bool {
    err.chain().any(|cause| cause.downcast_ref::<MissingGroup>().is_some())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamEntry {
    pub id: String,
    /// `None` when the entry carries no `message` field (trimmed or foreign entry).
    pub value: Option<String>,
}

/// Append-only stream with consumer groups.
#[async_trait::async_trait]
pub trait LogStore: Send + Sync {
    /// Creates the group at the start of the stream; existing groups are left alone.
    async fn ensure_group(&self, stream: &str, group: &str) -> Result<()>;

    async fn append(&self, stream: &str, value: &str) -> Result<String>;

    /// Reads entries never delivered to the group, waiting up to `block` when none are ready.
    async fn read_group(
        &self,
        stream: &str,
        group: &str,
        consumer: &str,
        count: usize,
        block: Duration,
    ) -> Result<Vec<StreamEntry>>;

    /// Entries already delivered to `consumer` and not yet acknowledged.
    async fn read_pending(
        &self,
        stream: &str,
        group: &str,
        consumer: &str,
        count: usize,
    ) -> Result<Vec<StreamEntry>>;

    async fn acknowledge(&self, stream: &str, group: &str, id: &str) -> Result<()>;

    async fn ping(&self) -> Result<()>;
}

/// Score-ordered set used as the delay queue.
#[async_trait::async_trait]
pub trait DelayQueue: Send + Sync {
    async fn insert(&self, key: &str, member: &str, score: f64) -> Result<()>;

    /// Members with `min <= score <= max`, lowest score first.
    async fn range_by_score(&self, key: &str, min: f64, max: f64) -> Result<Vec<String>>;

    async fn remove(&self, key: &str, member: &str) -> Result<bool>;
}

/// Plain keys with per-key expiry.
#[async_trait::async_trait]
pub trait CounterStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>>;

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<()>;

    async fn delete(&self, key: &str) -> Result<()>;
}
