//! Redis-backed [`Queue`] implementation: a per-delay sorted set swept
//! opportunistically on every poll, a priority-less list for the main
//! queue, an active hash for in-flight visibility, and a dead-letter
//! sorted set.

use crate::error::{QueueError, QueueResult};
use crate::item::QueueItem;
use crate::keys::QueueKeys;
use crate::traits::Queue;
use async_trait::async_trait;
use chrono::Utc;
use deadpool_redis::Pool;
use expozy_core::JobId;
use redis::AsyncCommands;
use std::time::Duration;
use tracing::{debug, warn};

pub struct RedisQueue {
    pool: Pool,
    keys: QueueKeys,
}

impl RedisQueue {
    #[must_use]
    pub fn new(pool: Pool, prefix: &str, queue_name: &str) -> Self {
        Self {
            pool,
            keys: QueueKeys::new(prefix, queue_name),
        }
    }

    async fn conn(&self) -> QueueResult<deadpool_redis::Connection> {
        Ok(self.pool.get().await?)
    }

    /// Moves items whose due time has elapsed from the delayed sorted set
    /// into the main queue list. Called opportunistically from
    /// `consume_one`.
    async fn sweep_delayed(&self) -> QueueResult<u64> {
        let mut conn = self.conn().await?;
        let now = Utc::now().timestamp_millis();

        let due: Vec<String> = conn.zrangebyscore(self.keys.delayed(), 0i64, now).await?;
        let mut moved = 0u64;
        for item_json in due {
            let removed: i64 = conn.zrem(self.keys.delayed(), &item_json).await?;
            if removed == 0 {
                // another poller already swept this entry
                continue;
            }
            let _: () = conn.lpush(self.keys.main(), &item_json).await?;
            moved += 1;
        }
        if moved > 0 {
            debug!(count = moved, "swept delayed items into main queue");
        }
        Ok(moved)
    }
}

#[async_trait]
impl Queue for RedisQueue {
    async fn publish(&self, job_id: JobId, attempt_no: i32) -> QueueResult<()> {
        let mut conn = self.conn().await?;
        let item = QueueItem::new(job_id, attempt_no);
        let json = item.to_json()?;
        let _: () = conn.lpush(self.keys.main(), json).await?;
        debug!(%job_id, attempt_no, "published queue item");
        Ok(())
    }

    async fn publish_delayed(
        &self,
        job_id: JobId,
        attempt_no: i32,
        delay: Duration,
    ) -> QueueResult<()> {
        let mut conn = self.conn().await?;
        let item = QueueItem::new(job_id, attempt_no);
        let json = item.to_json()?;
        let due_ms = Utc::now().timestamp_millis() + i64::try_from(delay.as_millis()).unwrap_or(i64::MAX);
        let _: () = conn.zadd(self.keys.delayed(), json, due_ms as f64).await?;
        debug!(%job_id, attempt_no, delay_ms = delay.as_millis(), "published delayed queue item");
        Ok(())
    }

    async fn consume_one(&self, poller_id: &str) -> QueueResult<Option<QueueItem>> {
        if let Err(e) = self.sweep_delayed().await {
            warn!(error = %e, "failed to sweep delayed queue items");
        }

        let mut conn = self.conn().await?;
        let popped: Option<String> = conn.rpop(self.keys.main(), None).await?;
        let Some(json) = popped else {
            return Ok(None);
        };

        let item = match QueueItem::from_json(&json) {
            Ok(item) => item,
            Err(e) => {
                // Poison message: malformed payload. Dead-letter it
                // directly; it will never parse on redelivery either.
                warn!(error = %e, "dropping unparseable queue item to DLQ");
                let _: Result<(), QueueError> = async {
                    let now = Utc::now().timestamp_millis();
                    let _: () = conn.zadd(self.keys.dlq(), &json, now as f64).await?;
                    Ok(())
                }
                .await;
                return Err(QueueError::Serialization(e));
            }
        };

        let active_key = format!("{}:{}", item.job_id, item.attempt_no);
        let _: () = conn.hset(self.keys.active(), &active_key, poller_id).await?;
        Ok(Some(item))
    }

    async fn ack(&self, _poller_id: &str, item: &QueueItem) -> QueueResult<()> {
        let mut conn = self.conn().await?;
        let active_key = format!("{}:{}", item.job_id, item.attempt_no);
        let _: () = conn.hdel(self.keys.active(), active_key).await?;
        Ok(())
    }

    async fn nack(&self, _poller_id: &str, item: &QueueItem, reason: &str) -> QueueResult<()> {
        let mut conn = self.conn().await?;
        let active_key = format!("{}:{}", item.job_id, item.attempt_no);
        let _: () = conn.hdel(self.keys.active(), &active_key).await?;

        let now = Utc::now().timestamp_millis();
        let entry = serde_json::json!({
            "item": item,
            "reason": reason,
            "dead_lettered_at": now,
        });
        let _: () = conn.zadd(self.keys.dlq(), entry.to_string(), now as f64).await?;
        warn!(job_id = %item.job_id, attempt_no = item.attempt_no, reason, "routed item to dead-letter sink");
        Ok(())
    }

    async fn health_check(&self) -> QueueResult<()> {
        let mut conn = self.conn().await?;
        let _: String = redis::cmd("PING").query_async(&mut conn).await?;
        Ok(())
    }
}
