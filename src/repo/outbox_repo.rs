use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgPool, Row};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutboxItem {
    pub id: i64,
    pub order_id: String,
    pub payload_json: serde_json::Value,
    pub attempts: i32,
}

/// Durable retry rows waiting to be relayed onto the stream.
#[async_trait::async_trait]
pub trait OutboxStore: Send + Sync {
    async fn insert(&self, order_id: &str, payload_json: serde_json::Value) -> Result<i64>;

    /// Claims up to `batch_size` due rows by moving them to PROCESSING.
    async fn lock_pending(&self, batch_size: i64) -> Result<Vec<OutboxItem>>;

    async fn mark_published(&self, id: i64, message_id: &str) -> Result<()>;

    async fn mark_retry(&self, id: i64, attempts: i32, next_attempt_at: DateTime<Utc>) -> Result<()>;

    /// Rows left in PROCESSING longer than `older_than_secs` go back to PENDING.
    async fn release_stuck(&self, older_than_secs: i64) -> Result<u64>;
}

#[derive(Clone)]
pub struct OutboxRepo {
    pub pool: PgPool,
}

#[async_trait::async_trait]
impl OutboxStore for OutboxRepo {
    async fn insert(&self, order_id: &str, payload_json: serde_json::Value) -> Result<i64> {
        let row = sqlx::query(
            r#"
            INSERT INTO payment_retry_outbox (order_id, payload_json, status, attempts, next_attempt_at)
            VALUES ($1, $2, 'PENDING', 0, now())
            RETURNING id
            "#,
        )
        .bind(order_id)
        .bind(payload_json)
        .fetch_one(&self.pool)
        .await?;

        Ok(row.get("id"))
    }

    async fn lock_pending(&self, batch_size: i64) -> Result<Vec<OutboxItem>> {
        let mut tx = self.pool.begin().await?;
        let rows = sqlx::query(
            r#"
            SELECT id, order_id, payload_json, attempts
            FROM payment_retry_outbox
            WHERE status = 'PENDING' AND next_attempt_at <= now()
            ORDER BY id ASC
            LIMIT $1
            FOR UPDATE SKIP LOCKED
            "#,
        )
        .bind(batch_size)
        .fetch_all(tx.as_mut())
        .await?;

        if rows.is_empty() {
            tx.rollback().await?;
            return Ok(Vec::new());
        }

        let ids: Vec<i64> = rows.iter().map(|r| r.get("id")).collect();
        sqlx::query("UPDATE payment_retry_outbox SET status = 'PROCESSING', updated_at = now() WHERE id = ANY($1)")
            .bind(&ids)
            .execute(tx.as_mut())
            .await?;

        tx.commit().await?;

        Ok(rows
            .into_iter()
            .map(|r| OutboxItem {
                id: r.get("id"),
                order_id: r.get("order_id"),
                payload_json: r.get("payload_json"),
                attempts: r.get("attempts"),
            })
            .collect())
    }

    async fn mark_published(&self, id: i64, message_id: &str) -> Result<()> {
        sqlx::query(
            "UPDATE payment_retry_outbox SET status='PUBLISHED', message_id=$2, published_at=now(), updated_at=now() WHERE id=$1",
        )
        .bind(id)
        .bind(message_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn mark_retry(&self, id: i64, attempts: i32, next_attempt_at: DateTime<Utc>) -> Result<()> {
        sqlx::query(
            "UPDATE payment_retry_outbox SET status='PENDING', attempts=$2, next_attempt_at=$3, updated_at=now() WHERE id=$1",
        )
        .bind(id)
        .bind(attempts)
        .bind(next_attempt_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn release_stuck(&self, older_than_secs: i64) -> Result<u64> {
        let res = sqlx::query(
            r#"
            UPDATE payment_retry_outbox
            SET status='PENDING', updated_at=now()
            WHERE status='PROCESSING' AND updated_at < now() - make_interval(secs => $1)
            "#,
        )
        .bind(older_than_secs as f64)
        .execute(&self.pool)
        .await?;
        Ok(res.rows_affected())
    }
}
