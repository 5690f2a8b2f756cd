use crate::domain::retry::MESSAGE_FIELD;
use crate::store::{CounterStore, DelayQueue, LogStore, MissingGroup, StreamEntry};
use anyhow::{Context, Result};
use redis::streams::StreamReadReply;
use redis::AsyncCommands;
use std::time::Duration;

#[derive(Clone)]
pub struct RedisStore {
    pub client: redis::Client,
    pub stream_max_len: u64,
}

impl RedisStore {
    pub fn new(redis_url: &str, stream_max_len: u64) -> Result<Self> {
        Ok(Self {
            client: redis::Client::open(redis_url)?,
            stream_max_len,
        })
    }

    async fn conn(&self) -> Result<redis::aio::MultiplexedConnection> {
        self.client
            .get_multiplexed_async_connection()
            .await
            .context("redis connection failed")
    }
}

fn read_reply(
    res: redis::RedisResult<Option<StreamReadReply>>,
    stream: &str,
    group: &str,
) -> Result<Vec<StreamEntry>> {
    match res {
        Ok(reply) => Ok(entries_from_reply(reply)),
        Err(e) if e.code() == Some("NOGROUP") => Err(MissingGroup::new(stream, group).into()),
        Err(e) => Err(e).context("XREADGROUP failed"),
    }
}

fn entries_from_reply(reply: Option<StreamReadReply>) -> Vec<StreamEntry> {
    let Some(reply) = reply else {
        return Vec::new();
    };

    reply
        .keys
        .into_iter()
        .flat_map(|key| key.ids)
        .map(|id| {
            let value = id
                .map
                .get(MESSAGE_FIELD)
                .and_then(|v| redis::from_redis_value::<String>(v).ok());
            StreamEntry { id: id.id, value }
        })
        .collect()
}

#[async_trait::async_trait]
impl LogStore for RedisStore {
    async fn ensure_group(&self, stream: &str, group: &str) -> Result<()> {
        let mut conn = self.conn().await?;
        let res: redis::RedisResult<String> = redis::cmd("XGROUP")
            .arg("CREATE")
            .arg(stream)
            .arg(group)
            .arg("0")
            .arg("MKSTREAM")
            .query_async(&mut conn)
            .await;

        match res {
            Ok(_) => {
                tracing::info!("created consumer group {} on {}", group, stream);
                Ok(())
            }
            Err(e) if e.code() == Some("BUSYGROUP") => Ok(()),
            Err(e) => Err(e).context("XGROUP CREATE failed"),
        }
    }

    async fn append(&self, stream: &str, value: &str) -> Result<String> {
        let mut conn = self.conn().await?;
        let id: String = redis::cmd("XADD")
            .arg(stream)
            .arg("MAXLEN")
            .arg("~")
            .arg(self.stream_max_len)
            .arg("*")
            .arg(MESSAGE_FIELD)
            .arg(value)
            .query_async(&mut conn)
            .await
            .context("XADD failed")?;
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
        let mut conn = self.conn().await?;
        let res = redis::cmd("XREADGROUP")
            .arg("GROUP")
            .arg(group)
            .arg(consumer)
            .arg("COUNT")
            .arg(count)
            .arg("BLOCK")
            .arg(block.as_millis() as u64)
            .arg("STREAMS")
            .arg(stream)
            .arg(">")
            .query_async(&mut conn)
            .await;
        read_reply(res, stream, group)
    }

    async fn read_pending(
        &self,
        stream: &str,
        group: &str,
        consumer: &str,
        count: usize,
    ) -> Result<Vec<StreamEntry>> {
        let mut conn = self.conn().await?;
        let res = redis::cmd("XREADGROUP")
            .arg("GROUP")
            .arg(group)
            .arg(consumer)
            .arg("COUNT")
            .arg(count)
            .arg("STREAMS")
            .arg(stream)
            .arg("0")
            .query_async(&mut conn)
            .await;
        read_reply(res, stream, group).context("pending read failed")
    }

    async fn acknowledge(&self, stream: &str, group: &str, id: &str) -> Result<()> {
        let mut conn = self.conn().await?;
        let _: i64 = redis::cmd("XACK")
            .arg(stream)
            .arg(group)
            .arg(id)
            .query_async(&mut conn)
            .await
            .context("XACK failed")?;
        Ok(())
    }

    async fn ping(&self) -> Result<()> {
        let mut conn = self.conn().await?;
        let _: String = redis::cmd("PING").query_async(&mut conn).await?;
        Ok(())
    }
}

#[async_trait::async_trait]
impl DelayQueue for RedisStore {
    async fn insert(&self, key: &str, member: &str, score: f64) -> Result<()> {
        let mut conn = self.conn().await?;
        let _: i64 = conn.zadd(key, member, score).await.context("ZADD failed")?;
        Ok(())
    }

    async fn range_by_score(&self, key: &str, min: f64, max: f64) -> Result<Vec<String>> {
        let mut conn = self.conn().await?;
        let members: Vec<String> = conn
            .zrangebyscore(key, min, max)
            .await
            .context("ZRANGEBYSCORE failed")?;
        Ok(members)
    }

    async fn remove(&self, key: &str, member: &str) -> Result<bool> {
        let mut conn = self.conn().await?;
        let removed: i64 = conn.zrem(key, member).await.context("ZREM failed")?;
        Ok(removed > 0)
    }
}

#[async_trait::async_trait]
impl CounterStore for RedisStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let mut conn = self.conn().await?;
        let val: Option<String> = conn.get(key).await?;
        Ok(val)
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<()> {
        let mut conn = self.conn().await?;
        let _: () = conn.set_ex(key, value, ttl.as_secs().max(1)).await?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let mut conn = self.conn().await?;
        let _: usize = conn.del(key).await?;
        Ok(())
    }
}
