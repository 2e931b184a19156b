//! In-memory `Queue` fake used by Ingest/Worker unit tests.

use crate::error::QueueResult;
use crate::item::QueueItem;
use crate::traits::Queue;
use async_trait::async_trait;
use chrono::Utc;
use expozy_core::JobId;
use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

struct DelayedEntry {
    item: QueueItem,
    due_at_ms: i64,
}

#[derive(Default)]
struct Inner {
    main: VecDeque<QueueItem>,
    delayed: Vec<DelayedEntry>,
    dlq: Vec<(QueueItem, String)>,
    publish_should_fail: bool,
}

/// An in-memory [`Queue`] for tests. Optionally configured to fail every
/// `publish` call, exercising Ingest's "mark FAILED on publish error"
/// compensation path.
#[derive(Default)]
pub struct InMemoryQueue {
    inner: Mutex<Inner>,
}

impl InMemoryQueue {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn failing() -> Self {
        let queue = Self::new();
        queue.inner.lock().unwrap().publish_should_fail = true;
        queue
    }

    #[must_use]
    pub fn dead_lettered(&self) -> Vec<(QueueItem, String)> {
        self.inner.lock().unwrap().dlq.clone()
    }

    #[must_use]
    pub fn pending_len(&self) -> usize {
        self.inner.lock().unwrap().main.len()
    }
}

#[async_trait]
impl Queue for InMemoryQueue {
    async fn publish(&self, job_id: JobId, attempt_no: i32) -> QueueResult<()> {
        let mut inner = self.inner.lock().unwrap();
        if inner.publish_should_fail {
            return Err(crate::error::QueueError::Redis(
                redis::RedisError::from((redis::ErrorKind::IoError, "simulated publish failure")),
            ));
        }
        inner.main.push_back(QueueItem::new(job_id, attempt_no));
        Ok(())
    }

    async fn publish_delayed(
        &self,
        job_id: JobId,
        attempt_no: i32,
        delay: Duration,
    ) -> QueueResult<()> {
        let mut inner = self.inner.lock().unwrap();
        let due_at_ms = Utc::now().timestamp_millis() + delay.as_millis() as i64;
        inner.delayed.push(DelayedEntry {
            item: QueueItem::new(job_id, attempt_no),
            due_at_ms,
        });
        Ok(())
    }

    async fn consume_one(&self, _poller_id: &str) -> QueueResult<Option<QueueItem>> {
        let mut inner = self.inner.lock().unwrap();
        let now = Utc::now().timestamp_millis();
        let ready: Vec<usize> = inner
            .delayed
            .iter()
            .enumerate()
            .filter(|(_, e)| e.due_at_ms <= now)
            .map(|(i, _)| i)
            .collect();
        for idx in ready.into_iter().rev() {
            let entry = inner.delayed.remove(idx);
            inner.main.push_back(entry.item);
        }
        Ok(inner.main.pop_front())
    }

    async fn ack(&self, _poller_id: &str, _item: &QueueItem) -> QueueResult<()> {
        Ok(())
    }

    async fn nack(&self, _poller_id: &str, item: &QueueItem, reason: &str) -> QueueResult<()> {
        self.inner
            .lock()
            .unwrap()
            .dlq
            .push((item.clone(), reason.to_string()));
        Ok(())
    }

    async fn health_check(&self) -> QueueResult<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn publish_then_consume_roundtrips() {
        let queue = InMemoryQueue::new();
        let job_id = JobId::new();
        queue.publish(job_id, 1).await.unwrap();

        let item = queue.consume_one("poller-1").await.unwrap().unwrap();
        assert_eq!(item.job_id, job_id);
        assert_eq!(item.attempt_no, 1);
        assert!(queue.consume_one("poller-1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn delayed_item_is_invisible_until_due() {
        let queue = InMemoryQueue::new();
        let job_id = JobId::new();
        queue
            .publish_delayed(job_id, 2, Duration::from_secs(3600))
            .await
            .unwrap();

        assert!(queue.consume_one("poller-1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn failing_queue_rejects_publish() {
        let queue = InMemoryQueue::failing();
        let result = queue.publish(JobId::new(), 1).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn nack_routes_to_dead_letter_sink() {
        let queue = InMemoryQueue::new();
        let job_id = JobId::new();
        queue.publish(job_id, 1).await.unwrap();
        let item = queue.consume_one("poller-1").await.unwrap().unwrap();
        queue.nack("poller-1", &item, "handler panicked").await.unwrap();

        let dlq = queue.dead_lettered();
        assert_eq!(dlq.len(), 1);
        assert_eq!(dlq[0].1, "handler panicked");
    }
}
