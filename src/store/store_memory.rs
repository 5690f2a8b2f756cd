use crate::store::{CounterStore, DelayQueue, LogStore, MissingGroup, StreamEntry};
use anyhow::Result;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, Notify};

/// In-process stand-in for Redis: streams with consumer groups, sorted sets and expiring keys.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<Inner>>,
    appended: Arc<Notify>,
}

#[derive(Default)]
struct Inner {
    seq: u64,
    streams: HashMap<String, MemoryStream>,
    sorted_sets: HashMap<String, HashMap<String, f64>>,
    values: HashMap<String, (String, DateTime<Utc>)>,
}

#[derive(Default)]
struct MemoryStream {
    entries: Vec<(String, String)>,
    groups: HashMap<String, Group>,
}

#[derive(Default)]
struct Group {
    next_index: usize,
    // id -> consumer
    pending: BTreeMap<String, String>,
}

impl MemoryStream {
    fn value_of(&self, id: &str) -> Option<String> {
        self.entries.iter().find(|(eid, _)| eid == id).map(|(_, v)| v.clone())
    }
}

impl Inner {
    fn next_id(&mut self) -> String {
        self.seq += 1;
        format!("{}-{}", Utc::now().timestamp_millis(), self.seq)
    }

    fn deliver_new(&mut self, stream: &str, group: &str, consumer: &str, count: usize) -> Result<Vec<StreamEntry>> {
        let s = self
            .streams
            .get_mut(stream)
            .ok_or_else(|| MissingGroup::new(stream, group))?;
        let g = s
            .groups
            .get_mut(group)
            .ok_or_else(|| MissingGroup::new(stream, group))?;

        let end = (g.next_index + count).min(s.entries.len());
        let mut out = Vec::new();
        for (id, value) in &s.entries[g.next_index..end] {
            g.pending.insert(id.clone(), consumer.to_string());
            out.push(StreamEntry {
                id: id.clone(),
                value: Some(value.clone()),
            });
        }
        g.next_index = end;
        Ok(out)
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn stream_len(&self, stream: &str) -> usize {
        let inner = self.inner.lock().await;
        inner.streams.get(stream).map_or(0, |s| s.entries.len())
    }

    pub async fn stream_values(&self, stream: &str) -> Vec<String> {
        let inner = self.inner.lock().await;
        inner
            .streams
            .get(stream)
            .map(|s| s.entries.iter().map(|(_, v)| v.clone()).collect())
            .unwrap_or_default()
    }

    pub async fn pending_count(&self, stream: &str, group: &str) -> usize {
        let inner = self.inner.lock().await;
        inner
            .streams
            .get(stream)
            .and_then(|s| s.groups.get(group))
            .map_or(0, |g| g.pending.len())
    }

    /// Drops a consumer group and its pending list, like `XGROUP DESTROY`.
    pub async fn destroy_group(&self, stream: &str, group: &str) -> bool {
        let mut inner = self.inner.lock().await;
        inner
            .streams
            .get_mut(stream)
            .and_then(|s| s.groups.remove(group))
            .is_some()
    }

    /// Members with their scores, lowest score first.
    pub async fn sorted_set(&self, key: &str) -> Vec<(String, f64)> {
        let inner = self.inner.lock().await;
        let mut members: Vec<(String, f64)> = inner
            .sorted_sets
            .get(key)
            .map(|set| set.iter().map(|(m, s)| (m.clone(), *s)).collect())
            .unwrap_or_default();
        members.sort_by(|a, b| a.1.total_cmp(&b.1).then_with(|| a.0.cmp(&b.0)));
        members
    }
}

#[async_trait::async_trait]
impl LogStore for MemoryStore {
    async fn ensure_group(&self, stream: &str, group: &str) -> Result<()> {
        let mut inner = self.inner.lock().await;
        let s = inner.streams.entry(stream.to_string()).or_default();
        s.groups.entry(group.to_string()).or_default();
        Ok(())
    }

    async fn append(&self, stream: &str, value: &str) -> Result<String> {
        let id = {
            let mut inner = self.inner.lock().await;
            let id = inner.next_id();
            inner
                .streams
                .entry(stream.to_string())
                .or_default()
                .entries
                .push((id.clone(), value.to_string()));
            id
        };
        self.appended.notify_waiters();
        Ok(id)
    }

    async fn read_group(
        &self,
        stream: &str,
        group: &str,
        consumer: &str,
        count: usize,
        block: Duration,
    ) -> Result<Vec<StreamEntry>> {
        let notified = self.appended.notified();
        tokio::pin!(notified);
        notified.as_mut().enable();

        let first = self.inner.lock().await.deliver_new(stream, group, consumer, count)?;
        if !first.is_empty() || block.is_zero() {
            return Ok(first);
        }

        if tokio::time::timeout(block, notified).await.is_err() {
            return Ok(Vec::new());
        }
        self.inner.lock().await.deliver_new(stream, group, consumer, count)
    }

    async fn read_pending(
        &self,
        stream: &str,
        group: &str,
        consumer: &str,
        count: usize,
    ) -> Result<Vec<StreamEntry>> {
        let inner = self.inner.lock().await;
        let s = inner
            .streams
            .get(stream)
            .ok_or_else(|| MissingGroup::new(stream, group))?;
        let g = s
            .groups
            .get(group)
            .ok_or_else(|| MissingGroup::new(stream, group))?;

        Ok(g.pending
            .iter()
            .filter(|(_, owner)| owner.as_str() == consumer)
            .take(count)
            .map(|(id, _)| StreamEntry {
                id: id.clone(),
                value: s.value_of(id),
            })
            .collect())
    }

    async fn acknowledge(&self, stream: &str, group: &str, id: &str) -> Result<()> {
        let mut inner = self.inner.lock().await;
        if let Some(g) = inner.streams.get_mut(stream).and_then(|s| s.groups.get_mut(group)) {
            g.pending.remove(id);
        }
        Ok(())
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }
}

#[async_trait::async_trait]
impl DelayQueue for MemoryStore {
    async fn insert(&self, key: &str, member: &str, score: f64) -> Result<()> {
        let mut inner = self.inner.lock().await;
        inner
            .sorted_sets
            .entry(key.to_string())
            .or_default()
            .insert(member.to_string(), score);
        Ok(())
    }

    async fn range_by_score(&self, key: &str, min: f64, max: f64) -> Result<Vec<String>> {
        let mut members: Vec<(String, f64)> = self
            .sorted_set(key)
            .await
            .into_iter()
            .filter(|(_, score)| *score >= min && *score <= max)
            .collect();
        members.sort_by(|a, b| a.1.total_cmp(&b.1));
        Ok(members.into_iter().map(|(m, _)| m).collect())
    }

    async fn remove(&self, key: &str, member: &str) -> Result<bool> {
        let mut inner = self.inner.lock().await;
        Ok(inner
            .sorted_sets
            .get_mut(key)
            .and_then(|set| set.remove(member))
            .is_some())
    }
}

#[async_trait::async_trait]
impl CounterStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let mut inner = self.inner.lock().await;
        let expired = match inner.values.get(key) {
            Some((_, expires_at)) => *expires_at <= Utc::now(),
            None => return Ok(None),
        };
        if expired {
            inner.values.remove(key);
            return Ok(None);
        }
        Ok(inner.values.get(key).map(|(v, _)| v.clone()))
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<()> {
        let ttl = chrono::Duration::from_std(ttl)?;
        let now = Utc::now();
        let mut inner = self.inner.lock().await;
        inner.values.retain(|_, (_, expires_at)| *expires_at > now);
        inner
            .values
            .insert(key.to_string(), (value.to_string(), now + ttl));
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let mut inner = self.inner.lock().await;
        inner.values.remove(key);
        Ok(())
    }
}
