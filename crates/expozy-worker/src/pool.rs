//! Semaphore-bounded poller pool: each poller holds at
//! most one unacknowledged queue item at a time (prefetch = 1), and the
//! pool runs `concurrency` pollers concurrently. A `Semaphore` gates
//! concurrent task spawns, a `broadcast` channel carries the shutdown
//! signal, and shutdown waits out in-flight work up to a bounded timeout
//! rather than aborting it mid-episode.

use crate::engine::{Engine, Outcome};
use expozy_queue::Queue;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, Semaphore};
use tokio::time::timeout;
use tracing::{debug, error, info, warn, Instrument};
use uuid::Uuid;

pub struct WorkerPool {
    id: String,
    engine: Arc<Engine>,
    queue: Arc<dyn Queue>,
    concurrency: usize,
    poll_interval: Duration,
    job_timeout: Duration,
    shutdown_timeout: Duration,
    shutdown_tx: broadcast::Sender<()>,
    running: Arc<AtomicBool>,
    jobs_completed: Arc<AtomicU64>,
    jobs_failed: Arc<AtomicU64>,
}

impl WorkerPool {
    #[must_use]
    pub fn new(engine: Engine, queue: Arc<dyn Queue>) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);
        let concurrency = engine.worker.concurrency;
        let poll_interval = engine.worker.poll_interval();
        let job_timeout = engine.worker.job_timeout();
        let shutdown_timeout = engine.worker.shutdown_timeout();
        Self {
            id: format!("worker-pool-{}", Uuid::new_v4()),
            engine: Arc::new(engine),
            queue,
            concurrency,
            poll_interval,
            job_timeout,
            shutdown_timeout,
            shutdown_tx,
            running: Arc::new(AtomicBool::new(false)),
            jobs_completed: Arc::new(AtomicU64::new(0)),
            jobs_failed: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Returns a handle whose `shutdown()` triggers graceful stop.
    #[must_use]
    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle(self.shutdown_tx.clone())
    }

    /// Runs the poll loop until a shutdown signal is received, then
    /// waits (bounded by `shutdown_timeout`) for in-flight items to
    /// finish before returning.
    pub async fn run(&self) {
        self.running.store(true, Ordering::SeqCst);
        info!(pool_id = %self.id, concurrency = self.concurrency, "worker pool starting");

        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let mut shutdown_rx = self.shutdown_tx.subscribe();

        loop {
            tokio::select! {
                _ = shutdown_rx.recv() => {
                    info!(pool_id = %self.id, "shutdown signal received, no longer polling for new items");
                    break;
                }
                permit = semaphore.clone().acquire_owned() => {
                    let Ok(permit) = permit else { break };
                    let poller_id = format!("{}-{}", self.id, Uuid::new_v4());
                    let queue = self.queue.clone();
                    let engine = self.engine.clone();
                    let job_timeout = self.job_timeout;
                    let jobs_completed = self.jobs_completed.clone();
                    let jobs_failed = self.jobs_failed.clone();

                    tokio::spawn(
                        async move {
                            match queue.consume_one(&poller_id).await {
                                Ok(Some(item)) => {
                                    run_one(&queue, &engine, &poller_id, &item, job_timeout, &jobs_completed, &jobs_failed)
                                        .await;
                                }
                                Ok(None) => {}
                                Err(err) => error!(error = %err, "queue poll failed"),
                            }
                            drop(permit);
                        }
                        .instrument(tracing::info_span!("worker_poll")),
                    );
                }
            }
            tokio::time::sleep(self.poll_interval).await;
        }

        info!(pool_id = %self.id, "waiting for in-flight items to finish");
        let _ = timeout(self.shutdown_timeout, async {
            while semaphore.available_permits() < self.concurrency {
                tokio::time::sleep(Duration::from_millis(50)).await;
            }
        })
        .await;

        self.running.store(false, Ordering::SeqCst);
        info!(
            pool_id = %self.id,
            completed = self.jobs_completed.load(Ordering::Relaxed),
            failed = self.jobs_failed.load(Ordering::Relaxed),
            "worker pool stopped"
        );
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}

async fn run_one(
    queue: &Arc<dyn Queue>,
    engine: &Arc<Engine>,
    poller_id: &str,
    item: &expozy_queue::QueueItem,
    job_timeout: Duration,
    jobs_completed: &Arc<AtomicU64>,
    jobs_failed: &Arc<AtomicU64>,
) {
    debug!(job_id = %item.job_id, attempt_no = item.attempt_no, "dequeued item");

    // Any unexpected panic/error is
    // treated as a retryable failure via the persisted Job state, not
    // queue redelivery — so the item is ACKed here regardless of what
    // `process_item` decided, and the outcome is purely informational.
    let result = timeout(job_timeout, engine.process_item(item)).await;

    match result {
        Ok(Ok(outcome)) => {
            match outcome {
                Outcome::Completed => {
                    jobs_completed.fetch_add(1, Ordering::Relaxed);
                }
                Outcome::TerminallyFailed => {
                    jobs_failed.fetch_add(1, Ordering::Relaxed);
                }
                Outcome::Requeued | Outcome::Skipped(_) | Outcome::LostRace => {}
            }
            if let Err(err) = queue.ack(poller_id, item).await {
                warn!(job_id = %item.job_id, error = %err, "failed to ack processed item");
            }
        }
        Ok(Err(err)) => {
            warn!(job_id = %item.job_id, error = %err, "worker episode failed with an infrastructure error");
            jobs_failed.fetch_add(1, Ordering::Relaxed);
            if let Err(nack_err) = queue.nack(poller_id, item, &err.to_string()).await {
                warn!(job_id = %item.job_id, error = %nack_err, "failed to nack item after infrastructure error");
            }
        }
        Err(_) => {
            warn!(job_id = %item.job_id, timeout_ms = job_timeout.as_millis(), "worker episode timed out");
            jobs_failed.fetch_add(1, Ordering::Relaxed);
            if let Err(err) = queue.nack(poller_id, item, "job timeout").await {
                warn!(job_id = %item.job_id, error = %err, "failed to nack item after timeout");
            }
        }
    }
}

/// Cloneable handle for triggering graceful shutdown from outside the
/// pool's `run` loop (e.g. a signal handler in the server binary).
#[derive(Clone)]
pub struct ShutdownHandle(broadcast::Sender<()>);

impl ShutdownHandle {
    pub fn shutdown(&self) {
        let _ = self.0.send(());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use expozy_config::{PreviewConfig, WorkerConfig};
    use expozy_core::notification_channel;
    use expozy_model::EchoAdapter;
    use expozy_queue::InMemoryQueue;
    use expozy_store::InMemoryStore;

    #[tokio::test]
    async fn pool_processes_a_published_job_and_shuts_down_gracefully() {
        let store: Arc<dyn expozy_store::Store> = Arc::new(InMemoryStore::new());
        let queue: Arc<dyn Queue> = Arc::new(InMemoryQueue::new());
        let dir = tempfile::tempdir().unwrap();
        let (notifier, mut rx) = notification_channel(64);
        tokio::spawn(async move { while rx.recv().await.is_some() {} });

        let job_id = store.create_job(None, 1, 1, "build a page").await.unwrap();
        queue.publish(job_id, 1).await.unwrap();

        let engine = Engine {
            store: store.clone(),
            queue: queue.clone(),
            model: Arc::new(EchoAdapter::new()),
            worker: WorkerConfig {
                concurrency: 2,
                poll_interval_ms: 5,
                ..WorkerConfig::default()
            },
            preview: PreviewConfig {
                bundle_root: dir.path().to_string_lossy().to_string(),
                ..PreviewConfig::default()
            },
            notifier,
            provider_name: "echo".to_string(),
        };

        let pool = WorkerPool::new(engine, queue.clone());
        let shutdown = pool.shutdown_handle();

        let run_handle = tokio::spawn(async move { pool.run().await });
        tokio::time::sleep(Duration::from_millis(100)).await;
        shutdown.shutdown();
        run_handle.await.unwrap();

        let job = store.find_job(job_id).await.unwrap().unwrap();
        assert_eq!(job.status, expozy_core::JobStatus::Completed);
    }
}
