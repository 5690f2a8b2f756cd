use crate::store::CounterStore;
use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;

/// Failed-attempt count per order, kept with an expiry so abandoned keys age out.
///
/// `increment` is a read-modify-write against the store. Two consumers handling
/// duplicates of the same order at the same moment can lose an increment; the
/// pipeline accepts that approximation.
#[derive(Clone)]
pub struct AttemptCounter {
    pub store: Arc<dyn CounterStore>,
    pub prefix: String,
    pub ttl: Duration,
}

impl AttemptCounter {
    pub fn new(store: Arc<dyn CounterStore>, prefix: impl Into<String>, ttl: Duration) -> Self {
        Self {
            store,
            prefix: prefix.into(),
            ttl,
        }
    }

    pub fn key(&self, order_id: &str) -> String {
        format!("{}{}", self.prefix, order_id)
    }

    pub async fn get(&self, order_id: &str) -> Result<u32> {
        let key = self.key(order_id);
        match self.store.get(&key).await? {
            Some(raw) => raw
                .trim()
                .parse::<u32>()
                .with_context(|| format!("attempt counter {} holds non-numeric value {:?}", key, raw)),
            None => Ok(0),
        }
    }

    pub async fn increment(&self, order_id: &str) -> Result<u32> {
        let next = self.get(order_id).await? + 1;
        self.store
            .set(&self.key(order_id), &next.to_string(), self.ttl)
            .await?;
        Ok(next)
    }

    pub async fn clear(&self, order_id: &str) -> Result<()> {
        self.store.delete(&self.key(order_id)).await
    }
}
