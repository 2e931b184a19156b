//! One RUNNING episode of one job.
//!
//! `process_item` is the pure-ish heart of the Worker: given a queue item,
//! it fetches the job, enforces the idempotency fence against redelivery,
//! opens an attempt, invokes the model, validates, and either completes
//! the job or decides a retry/terminal failure. Every decision it makes is
//! driven by what the Store and the model adapter return — no hidden
//! state, so a redelivered item converges to the same outcome it would
//! have reached the first time (modulo attempt count).

use expozy_core::{JobStatus, NotificationSender, OrchestratorError};
use expozy_config::{PreviewConfig, WorkerConfig};
use expozy_model::{GenerationResult, ModelAdapter};
use expozy_queue::{Queue, QueueItem};
use expozy_render::render_page;
use expozy_store::{FailureTransition, Store};
use expozy_validator::{validate, TemplatePackage};
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};
use uuid::Uuid;

use crate::bundle::write_bundle;

/// What `process_item` actually did, for the caller (the poller loop) to
/// decide ack/nack and log a one-line outcome. Every successful run of
/// this function — including a decision to requeue the job for a later
/// attempt — is an ACK of the queue item: recovery after that point lives
/// entirely in the persisted Job state, never in the queue.
#[derive(Debug, PartialEq, Eq)]
pub enum Outcome {
    /// Job row absent or already terminal; nothing to do.
    Skipped(&'static str),
    /// Another worker already owns this job's RUNNING episode.
    LostRace,
    /// Bundle written, job COMPLETED.
    Completed,
    /// Attempt failed, job moved back to QUEUED with a delayed republish.
    Requeued,
    /// Attempt failed, job moved to FAILED; no further attempts.
    TerminallyFailed,
}

pub struct Engine {
    pub store: Arc<dyn Store>,
    pub queue: Arc<dyn Queue>,
    pub model: Arc<dyn ModelAdapter>,
    pub worker: WorkerConfig,
    pub preview: PreviewConfig,
    pub notifier: NotificationSender,
    pub provider_name: String,
}

impl Engine {
    /// Drives one episode for `item`. Returns the outcome; errors are
    /// reserved for failures this function could not itself recover from
    /// (a Store round-trip failing outright) — these are the cases the
    /// caller NACKs so the item dead-letters for operator inspection,
    /// since the job's persisted state is otherwise unknown.
    pub async fn process_item(&self, item: &QueueItem) -> Result<Outcome, OrchestratorError> {
        let job_id = item.job_id;

        // 1. Fetch the job.
        let Some(job) = self.store.find_job(job_id).await? else {
            info!(%job_id, "job row absent, dropping queue item");
            return Ok(Outcome::Skipped("job not found"));
        };

        // 2. Terminal short-circuit: the idempotency fence against
        // redelivery of an already-finished job.
        if job.status.is_terminal() {
            info!(%job_id, status = %job.status, "job already terminal, dropping redelivered item");
            return Ok(Outcome::Skipped("already terminal"));
        }

        if job.status != JobStatus::Queued {
            // A RUNNING job observed here means either a concurrent
            // worker owns it, or a crash left it stranded; either way
            // this poller does not touch it.
            info!(%job_id, status = %job.status, "job not queued, dropping item");
            return Ok(Outcome::Skipped("not queued"));
        }

        // 3 & 4. Transition to RUNNING and open the attempt in one Store
        // call — a single atomic transition, so a crash between the two
        // steps can never leave a job RUNNING with no attempt row.
        let attempt_no = job.attempt_count + 1;
        let attempt_id = match self
            .store
            .open_attempt(job_id, attempt_no, &self.provider_name)
            .await
        {
            Ok(id) => id,
            Err(expozy_store::StoreError::Conflict(_)) => {
                info!(%job_id, "lost the race to open this attempt");
                return Ok(Outcome::LostRace);
            }
            Err(err) => return Err(err.into()),
        };

        let started_at = Instant::now();

        // 5. Invoke the model.
        let generation = self.model.generate(&job.prompt).await;

        let outcome = self
            .handle_generation(&job, job_id, attempt_id, attempt_no, generation, started_at)
            .await?;

        Ok(outcome)
    }

    async fn handle_generation(
        &self,
        job: &expozy_store::Job,
        job_id: expozy_core::JobId,
        attempt_id: expozy_core::AttemptId,
        attempt_no: i32,
        generation: GenerationResult,
        started_at: Instant,
    ) -> Result<Outcome, OrchestratorError> {
        if !generation.success {
            let error = generation.error.unwrap_or_else(|| "model adapter error".to_string());
            if generation.retryable {
                return self
                    .close_and_retry(job_id, attempt_id, attempt_no, &error, generation.status_code, None)
                    .await;
            }
            self.close_terminal(job_id, attempt_id, &error, generation.status_code, None)
                .await?;
            return Ok(Outcome::TerminallyFailed);
        }

        let Some(template) = generation.template else {
            return self
                .close_and_retry(
                    job_id,
                    attempt_id,
                    attempt_no,
                    "model reported success with no template",
                    generation.status_code,
                    None,
                )
                .await;
        };

        let validation = validate(&template);
        if !validation.valid {
            let report = serde_json::to_value(&validation).ok();
            let error = validation.error_summary();
            warn!(%job_id, attempt_no, error = %error, "model output rejected by validator");
            return self
                .close_and_retry(job_id, attempt_id, attempt_no, &error, generation.status_code, report)
                .await;
        }

        // 6. Sanitize + render + store.
        let package = TemplatePackage::parse(&template);
        let html = render_page(&package);
        let bundle_id = Uuid::new_v4();

        if let Err(err) = write_bundle(std::path::Path::new(&self.preview.bundle_root), bundle_id, &html).await
        {
            let error = format!("failed to write bundle: {err}");
            warn!(%job_id, error = %error, "bundle write failed");
            return self
                .close_and_retry(job_id, attempt_id, attempt_no, &error, generation.status_code, None)
                .await;
        }

        // `PreviewConfig::preview_url` already returns the absolute URL
        // (base_url + bundle id + index.html); that's what's persisted
        // on the job and what goes in the outbound notification — there
        // is no separate relative-path form to join.
        let preview_url = self.preview.preview_url(&bundle_id.to_string());
        self.store
            .close_attempt_success(
                attempt_id,
                job_id,
                bundle_id,
                &preview_url,
                generation.raw_response.as_deref(),
            )
            .await?;

        let duration_ms = started_at.elapsed().as_millis();
        info!(%job_id, attempt_no, %bundle_id, duration_ms, "job completed");

        let _ = self
            .notifier
            .notify(job.chat_id, format!("Your page is ready: {preview_url}"))
            .await;

        Ok(Outcome::Completed)
    }

    async fn close_and_retry(
        &self,
        job_id: expozy_core::JobId,
        attempt_id: expozy_core::AttemptId,
        attempt_no: i32,
        error: &str,
        status_code: Option<i32>,
        validation_report: Option<serde_json::Value>,
    ) -> Result<Outcome, OrchestratorError> {
        // 7. Retry decision.
        if attempt_no < self.worker.max_retries {
            self.store
                .close_attempt_failure(
                    attempt_id,
                    job_id,
                    error,
                    status_code,
                    None,
                    validation_report,
                    FailureTransition::Requeue,
                )
                .await?;

            let delay = self.worker.backoff_for_attempt(attempt_no);
            self.queue.publish_delayed(job_id, attempt_no + 1, delay).await?;
            info!(%job_id, attempt_no, delay_ms = delay.as_millis(), "requeued for retry");
            return Ok(Outcome::Requeued);
        }

        self.close_terminal(job_id, attempt_id, error, status_code, validation_report)
            .await?;
        Ok(Outcome::TerminallyFailed)
    }

    async fn close_terminal(
        &self,
        job_id: expozy_core::JobId,
        attempt_id: expozy_core::AttemptId,
        error: &str,
        status_code: Option<i32>,
        validation_report: Option<serde_json::Value>,
    ) -> Result<(), OrchestratorError> {
        self.store
            .close_attempt_failure(
                attempt_id,
                job_id,
                error,
                status_code,
                None,
                validation_report,
                FailureTransition::Terminal,
            )
            .await?;
        warn!(%job_id, error, "job permanently failed");

        if let Some(job) = self.store.find_job(job_id).await? {
            let _ = self
                .notifier
                .notify(job.chat_id, "Sorry, I couldn't generate that page. Please try again.")
                .await;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use expozy_core::notification_channel;
    use expozy_model::EchoAdapter;
    use expozy_queue::InMemoryQueue;
    use expozy_store::InMemoryStore;

    fn test_engine(model: Arc<dyn ModelAdapter>) -> (Engine, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let (notifier, mut rx) = notification_channel(64);
        tokio::spawn(async move { while rx.recv().await.is_some() {} });
        let engine = Engine {
            store: Arc::new(InMemoryStore::new()),
            queue: Arc::new(InMemoryQueue::new()),
            model,
            worker: WorkerConfig {
                max_retries: 3,
                retry_base_delay_ms: 1,
                retry_max_delay_ms: 5,
                ..WorkerConfig::default()
            },
            preview: PreviewConfig {
                bundle_root: dir.path().to_string_lossy().to_string(),
                base_url: "https://preview.example".to_string(),
            },
            notifier,
            provider_name: "echo".to_string(),
        };
        (engine, dir)
    }

    #[tokio::test]
    async fn happy_path_completes_job_and_writes_bundle() {
        let (engine, dir) = test_engine(Arc::new(EchoAdapter::new()));
        let job_id = engine
            .store
            .create_job(None, 1, 1, "build a landing page")
            .await
            .unwrap();

        let outcome = engine
            .process_item(&QueueItem::new(job_id, 1))
            .await
            .unwrap();
        assert_eq!(outcome, Outcome::Completed);

        let job = engine.store.find_job(job_id).await.unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Completed);
        let bundle_id = job.bundle_id.unwrap();
        let index = dir.path().join(bundle_id.to_string()).join("index.html");
        assert!(tokio::fs::metadata(&index).await.is_ok());
    }

    #[tokio::test]
    async fn terminal_job_is_skipped_on_redelivery() {
        let (engine, _dir) = test_engine(Arc::new(EchoAdapter::new()));
        let job_id = engine.store.create_job(None, 1, 1, "hi").await.unwrap();
        engine.process_item(&QueueItem::new(job_id, 1)).await.unwrap();

        let outcome = engine.process_item(&QueueItem::new(job_id, 1)).await.unwrap();
        assert_eq!(outcome, Outcome::Skipped("already terminal"));
    }

    #[tokio::test]
    async fn retryable_model_failure_requeues_until_max_retries() {
        let (engine, _dir) = test_engine(Arc::new(EchoAdapter::always_retryable("rate limited")));
        let job_id = engine.store.create_job(None, 1, 1, "hi").await.unwrap();

        for expected_attempt in 1..3 {
            let outcome = engine.process_item(&QueueItem::new(job_id, expected_attempt)).await.unwrap();
            assert_eq!(outcome, Outcome::Requeued);
        }
        let outcome = engine.process_item(&QueueItem::new(job_id, 3)).await.unwrap();
        assert_eq!(outcome, Outcome::TerminallyFailed);

        let job = engine.store.find_job(job_id).await.unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Failed);
        assert_eq!(job.attempt_count, 3);
    }

    #[tokio::test]
    async fn permanent_model_failure_fails_immediately() {
        let (engine, _dir) = test_engine(Arc::new(EchoAdapter::always_permanent("bad request")));
        let job_id = engine.store.create_job(None, 1, 1, "hi").await.unwrap();

        let outcome = engine.process_item(&QueueItem::new(job_id, 1)).await.unwrap();
        assert_eq!(outcome, Outcome::TerminallyFailed);

        let job = engine.store.find_job(job_id).await.unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Failed);
        assert_eq!(job.attempt_count, 1);
    }

    #[tokio::test]
    async fn malicious_template_is_rejected_and_retried_then_failed() {
        struct MaliciousAdapter;
        #[async_trait::async_trait]
        impl ModelAdapter for MaliciousAdapter {
            async fn generate(&self, _prompt: &str) -> GenerationResult {
                GenerationResult::success(
                    serde_json::json!({
                        "sections": [{"type": "hero", "title": "<script>alert(1)</script>"}],
                    }),
                    "raw",
                )
            }
        }

        let (engine, _dir) = test_engine(Arc::new(MaliciousAdapter));
        let job_id = engine.store.create_job(None, 1, 1, "hi").await.unwrap();

        for attempt_no in 1..3 {
            let outcome = engine.process_item(&QueueItem::new(job_id, attempt_no)).await.unwrap();
            assert_eq!(outcome, Outcome::Requeued);
        }
        let outcome = engine.process_item(&QueueItem::new(job_id, 3)).await.unwrap();
        assert_eq!(outcome, Outcome::TerminallyFailed);

        let job = engine.store.find_job(job_id).await.unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Failed);
        assert!(job.bundle_id.is_none());
        assert!(job.validation_report.is_some());
    }
}
