//! End-to-end scenarios wiring the ingest router and the worker engine
//! together over the in-memory Store/Queue fakes. Each test drives a request through the real
//! Axum router, then drains the queue through the real `Engine`, rather
//! than exercising either side in isolation.

use axum::body::Body;
use axum::http::{Request, StatusCode};
use expozy_config::{PreviewConfig, WorkerConfig};
use expozy_core::{notification_channel, JobId, JobStatus};
use expozy_ingest::IngestState;
use expozy_model::EchoAdapter;
use expozy_queue::{InMemoryQueue, Queue, QueueItem};
use expozy_store::{InMemoryStore, Store};
use expozy_worker::Engine;
use http_body_util::BodyExt;
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;

const SECRET: &str = "shh";
const WEBHOOK_PATH: &str = "/telegram/webhook";

fn telegram_body(update_id: i64, text: &str) -> serde_json::Value {
    serde_json::json!({
        "update_id": update_id,
        "message": {
            "chat": {"id": 42},
            "from": {"id": 7},
            "text": text,
        }
    })
}

struct Harness {
    state: IngestState,
    engine: Engine,
    _bundle_dir: tempfile::TempDir,
}

impl Harness {
    fn new(model: Arc<dyn expozy_model::ModelAdapter>, worker: WorkerConfig) -> Self {
        let store: Arc<dyn Store> = Arc::new(InMemoryStore::new());
        let queue: Arc<dyn Queue> = Arc::new(InMemoryQueue::new());
        let (notifier, mut rx) = notification_channel(64);
        tokio::spawn(async move { while rx.recv().await.is_some() {} });

        let state = IngestState::new(store.clone(), queue.clone(), SECRET, notifier.clone(), Duration::from_secs(2));

        let bundle_dir = tempfile::tempdir().unwrap();
        let engine = Engine {
            store,
            queue,
            model,
            worker,
            preview: PreviewConfig {
                bundle_root: bundle_dir.path().to_string_lossy().to_string(),
                base_url: "https://preview.example".to_string(),
            },
            notifier,
            provider_name: "echo".to_string(),
        };

        Self { state, engine, _bundle_dir: bundle_dir }
    }

    async fn post(&self, secret: Option<&str>, body: serde_json::Value) -> (StatusCode, serde_json::Value) {
        let router = expozy_ingest::router(WEBHOOK_PATH, self.state.clone());
        let mut request = Request::builder().method("POST").uri(WEBHOOK_PATH);
        if let Some(secret) = secret {
            request = request.header("X-Telegram-Bot-Api-Secret-Token", secret);
        }
        let request = request
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        let response = router.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let json = if bytes.is_empty() {
            serde_json::Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, json)
    }

    /// Drains one queued item through the worker engine, as the pool's
    /// `run_one` would, without the pool's timeout/concurrency machinery.
    /// Polls briefly since a delayed-republish item only becomes visible
    /// once its backoff elapses.
    async fn drain_one(&self) -> expozy_worker::Outcome {
        let item = loop {
            if let Some(item) = self.engine.queue.consume_one("test-poller").await.unwrap() {
                break item;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        };
        let outcome = self.engine.process_item(&item).await.unwrap();
        self.engine.queue.ack("test-poller", &item).await.unwrap();
        outcome
    }
}

fn job_id_from(json: &serde_json::Value) -> JobId {
    JobId::parse(json["job_id"].as_str().unwrap()).unwrap()
}

#[tokio::test]
async fn scenario_1_happy_path() {
    let harness = Harness::new(Arc::new(EchoAdapter::new()), WorkerConfig::default());

    let (status, json) = harness
        .post(Some(SECRET), telegram_body(1001, "/prompt Build a landing page"))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["ok"], serde_json::json!(true));
    let job_id = job_id_from(&json);

    let job = harness.engine.store.find_job(job_id).await.unwrap().unwrap();
    assert_eq!(job.status, JobStatus::Queued);

    let outcome = harness.drain_one().await;
    assert_eq!(outcome, expozy_worker::Outcome::Completed);

    let job = harness.engine.store.find_job(job_id).await.unwrap().unwrap();
    assert_eq!(job.status, JobStatus::Completed);
    let bundle_id = job.bundle_id.expect("completed job has a bundle id");
    let index = std::path::Path::new(&harness.engine.preview.bundle_root)
        .join(bundle_id.to_string())
        .join("index.html");
    assert!(tokio::fs::metadata(&index).await.is_ok());

    let preview_url = job.preview_url.expect("completed job has a preview url");
    assert!(preview_url.contains(&format!("/p/{bundle_id}/index.html")));
}

#[tokio::test]
async fn scenario_2_duplicate_delivery_creates_one_job_and_one_publish() {
    let harness = Harness::new(Arc::new(EchoAdapter::new()), WorkerConfig::default());
    let body = telegram_body(1002, "/prompt Build a shop page");

    let (status1, json1) = harness.post(Some(SECRET), body.clone()).await;
    let (status2, json2) = harness.post(Some(SECRET), body).await;

    assert_eq!(status1, StatusCode::OK);
    assert_eq!(status2, StatusCode::OK);
    assert_eq!(json1["job_id"], json2["job_id"]);

    let job_id = job_id_from(&json1);
    assert!(harness.engine.store.find_job(job_id).await.unwrap().is_some());

    // Exactly one publish reached the queue: draining twice yields one
    // real item then nothing.
    assert!(harness.engine.queue.consume_one("p1").await.unwrap().is_some());
    assert!(harness.engine.queue.consume_one("p2").await.unwrap().is_none());
}

#[tokio::test]
async fn scenario_3_bad_secret_writes_nothing() {
    let harness = Harness::new(Arc::new(EchoAdapter::new()), WorkerConfig::default());

    let (status, _) = harness.post(Some("wrong"), telegram_body(1003, "/prompt hi")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    assert!(harness
        .engine
        .store
        .find_job_by_external_event(1003)
        .await
        .unwrap()
        .is_none());
    assert!(harness.engine.queue.consume_one("p").await.unwrap().is_none());
}

#[tokio::test]
async fn scenario_4_malicious_model_output_is_rejected_then_terminally_failed() {
    struct MaliciousAdapter;
    #[async_trait::async_trait]
    impl expozy_model::ModelAdapter for MaliciousAdapter {
        async fn generate(&self, _prompt: &str) -> expozy_model::GenerationResult {
            expozy_model::GenerationResult::success(
                serde_json::json!({
                    "sections": [{"type": "hero", "title": "<script>alert(1)</script>"}],
                }),
                "raw",
            )
        }
    }

    let worker = WorkerConfig {
        max_retries: 3,
        retry_base_delay_ms: 1,
        retry_max_delay_ms: 2,
        ..WorkerConfig::default()
    };
    let harness = Harness::new(Arc::new(MaliciousAdapter), worker);

    let (status, json) = harness
        .post(Some(SECRET), telegram_body(1004, "/prompt Build something"))
        .await;
    assert_eq!(status, StatusCode::OK);
    let job_id = job_id_from(&json);

    // Publish is re-issued by the engine itself on retry; drain until
    // the job reaches a terminal state.
    loop {
        harness.drain_one().await;
        let job = harness.engine.store.find_job(job_id).await.unwrap().unwrap();
        if job.status.is_terminal() {
            break;
        }
    }

    let job = harness.engine.store.find_job(job_id).await.unwrap().unwrap();
    assert_eq!(job.status, JobStatus::Failed);
    assert!(job.bundle_id.is_none());
    let report = job.validation_report.expect("validation report persisted");
    assert!(report.to_string().to_lowercase().contains("script"));
}

#[tokio::test]
async fn scenario_5_transient_429_then_success() {
    let worker = WorkerConfig {
        max_retries: 3,
        retry_base_delay_ms: 1,
        retry_max_delay_ms: 2,
        ..WorkerConfig::default()
    };
    let harness = Harness::new(Arc::new(FlakyAdapter::new(1)), worker);

    let (status, json) = harness
        .post(Some(SECRET), telegram_body(1005, "/prompt Build a page"))
        .await;
    assert_eq!(status, StatusCode::OK);
    let job_id = job_id_from(&json);

    let first = harness.drain_one().await;
    assert_eq!(first, expozy_worker::Outcome::Requeued);
    let job = harness.engine.store.find_job(job_id).await.unwrap().unwrap();
    assert_eq!(job.status, JobStatus::Queued);

    tokio::time::sleep(Duration::from_millis(10)).await;
    let second = harness.drain_one().await;
    assert_eq!(second, expozy_worker::Outcome::Completed);

    let job = harness.engine.store.find_job(job_id).await.unwrap().unwrap();
    assert_eq!(job.status, JobStatus::Completed);
    assert_eq!(job.attempt_count, 2);

    let attempts = harness.engine.store.list_attempts(job_id).await.unwrap();
    assert_eq!(attempts.len(), 2);
    assert_eq!(attempts[0].attempt_no, 1);
    assert_eq!(attempts[1].attempt_no, 2);
}

/// Fails with a retryable HTTP 429 the first `failures_remaining` calls,
/// then succeeds with the echo fixture.
struct FlakyAdapter {
    failures_remaining: std::sync::atomic::AtomicU32,
}

impl FlakyAdapter {
    fn new(failures: u32) -> Self {
        Self { failures_remaining: std::sync::atomic::AtomicU32::new(failures) }
    }
}

#[async_trait::async_trait]
impl expozy_model::ModelAdapter for FlakyAdapter {
    async fn generate(&self, _prompt: &str) -> expozy_model::GenerationResult {
        if self.failures_remaining.fetch_update(
            std::sync::atomic::Ordering::SeqCst,
            std::sync::atomic::Ordering::SeqCst,
            |n| if n > 0 { Some(n - 1) } else { None },
        ).is_ok()
        {
            return expozy_model::GenerationResult::retryable_failure("rate limited").with_status_code(429);
        }
        expozy_model::GenerationResult::success(EchoAdapter::fixture_template(), "raw")
    }
}

#[tokio::test]
async fn scenario_6_ingest_publish_failure_fails_job_before_responding() {
    let store: Arc<dyn Store> = Arc::new(InMemoryStore::new());
    let queue: Arc<dyn Queue> = Arc::new(InMemoryQueue::failing());
    let (notifier, mut rx) = notification_channel(64);
    tokio::spawn(async move { while rx.recv().await.is_some() {} });

    let state = IngestState::new(store.clone(), queue.clone(), SECRET, notifier, Duration::from_secs(2));
    let router = expozy_ingest::router(WEBHOOK_PATH, state);

    let request = Request::builder()
        .method("POST")
        .uri(WEBHOOK_PATH)
        .header("X-Telegram-Bot-Api-Secret-Token", SECRET)
        .header("content-type", "application/json")
        .body(Body::from(telegram_body(1006, "/prompt Build a page").to_string()))
        .unwrap();

    let response = router.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    assert!(json["message"]
        .as_str()
        .unwrap_or_default()
        .to_lowercase()
        .contains("queue"));

    let job_id = job_id_from(&json);
    let job = store.find_job(job_id).await.unwrap().unwrap();
    assert_eq!(job.status, JobStatus::Failed);

    assert!(queue.consume_one("p").await.unwrap().is_none());
}
