//! The `Queue` contract: durable work queue with delayed redelivery and
//! dead-lettering.
//!
//! Consumption is a prefetch-1 poll/ack/nack triple (`consume_one` /
//! `ack` / `nack`) rather than a `consume(handler)` callback, so the
//! retry/concurrency loop can live in `expozy-worker::WorkerPool` as an
//! explicit `Semaphore`-bounded set of pollers: one unacknowledged item
//! per poller, NACK routes to the dead-letter sink, ACK on success.

use crate::error::QueueResult;
use crate::item::QueueItem;
use async_trait::async_trait;
use expozy_core::JobId;
use std::time::Duration;

#[async_trait]
pub trait Queue: Send + Sync {
    /// Enqueues a work item with at-least-once delivery.
    async fn publish(&self, job_id: JobId, attempt_no: i32) -> QueueResult<()>;

    /// Enqueues a work item that becomes visible only after `delay` has
    /// elapsed. Ordering relative to non-delayed items is not guaranteed.
    async fn publish_delayed(
        &self,
        job_id: JobId,
        attempt_no: i32,
        delay: Duration,
    ) -> QueueResult<()>;

    /// Pops at most one item for `poller_id`, sweeping any delayed items
    /// whose due time has elapsed into the main queue first. Returns
    /// `None` when nothing is ready.
    async fn consume_one(&self, poller_id: &str) -> QueueResult<Option<QueueItem>>;

    /// Acknowledges successful processing of `item`.
    async fn ack(&self, poller_id: &str, item: &QueueItem) -> QueueResult<()>;

    /// Routes `item` to the dead-letter sink; the sink does not retry —
    /// the Worker's own Store-backed bookkeeping is what republishes.
    async fn nack(&self, poller_id: &str, item: &QueueItem, reason: &str) -> QueueResult<()>;

    async fn health_check(&self) -> QueueResult<()>;
}
