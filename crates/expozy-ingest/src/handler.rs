//! The webhook endpoint's processing algorithm.
//!
//! Every side-effecting step happens in the order the contract demands:
//! authenticate, parse, classify, deduplicate, create the job, let that
//! transaction commit, publish to the queue, and only then respond. The
//! ordering between "create job" and "publish" is the correctness
//! invariant the whole module exists to protect — a worker must never
//! dequeue a job id the store doesn't know about yet.

use crate::auth::secrets_match;
use crate::state::IngestState;
use crate::webhook::{classify, Classification, WebhookBody, WebhookResponse, EMPTY_PROMPT_REPLY, INVALID_COMMAND_REPLY};
use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Json, Response};
use axum::routing::post;
use axum::Router;
use expozy_store::{InsertEventOutcome, Store};
use tracing::{info, warn};

const SECRET_HEADER: &str = "x-telegram-bot-api-secret-token";

/// Mounts the webhook route at the configured path.
pub fn router(path: &str, state: IngestState) -> Router {
    Router::new().route(path, post(webhook_handler)).with_state(state)
}

fn json_response(status: StatusCode, body: WebhookResponse) -> Response {
    (status, Json(body)).into_response()
}

async fn webhook_handler(State(state): State<IngestState>, headers: HeaderMap, body: Bytes) -> Response {
    match tokio::time::timeout(state.ingress_deadline, process(&state, &headers, &body)).await {
        Ok(response) => response,
        Err(_) => {
            warn!("ingress deadline exceeded while processing webhook");
            json_response(
                StatusCode::SERVICE_UNAVAILABLE,
                WebhookResponse::ok_with_message("request took too long, try again"),
            )
        }
    }
}

async fn process(state: &IngestState, headers: &HeaderMap, body: &Bytes) -> Response {
    // 1. Authentication. Mismatch -> 401, no side effects.
    let provided = headers
        .get(SECRET_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    if !secrets_match(provided, &state.secret_token) {
        return StatusCode::UNAUTHORIZED.into_response();
    }

    // 2. Parse. Malformed body or missing minimal shape -> 400, no side effects.
    let raw: serde_json::Value = match serde_json::from_slice(body) {
        Ok(value) => value,
        Err(_) => return StatusCode::BAD_REQUEST.into_response(),
    };
    let parsed: WebhookBody = match serde_json::from_value(raw.clone()) {
        Ok(value) => value,
        Err(_) => return StatusCode::BAD_REQUEST.into_response(),
    };

    let Some(message) = parsed.message else {
        return json_response(StatusCode::OK, WebhookResponse::ok());
    };

    // 3. Classify.
    match classify(message.text.as_deref()) {
        Classification::NoContent => json_response(StatusCode::OK, WebhookResponse::ok()),
        Classification::Control(reply) => {
            notify_best_effort(state, message.chat.id, reply).await;
            json_response(StatusCode::OK, WebhookResponse::ok())
        }
        Classification::EmptyPrompt => {
            notify_best_effort(state, message.chat.id, EMPTY_PROMPT_REPLY).await;
            json_response(StatusCode::OK, WebhookResponse::ok_with_message("empty prompt"))
        }
        Classification::Invalid => {
            notify_best_effort(state, message.chat.id, INVALID_COMMAND_REPLY).await;
            json_response(StatusCode::OK, WebhookResponse::ok_with_message("invalid command"))
        }
        Classification::Prompt(prompt) => {
            handle_prompt(state, parsed.update_id, message.chat.id, message.from.id, &prompt, raw).await
        }
    }
}

async fn handle_prompt(
    state: &IngestState,
    update_id: i64,
    chat_id: i64,
    user_id: i64,
    prompt: &str,
    raw: serde_json::Value,
) -> Response {
    // 4. Deduplicate.
    let event_id = match state.store.insert_event_once(update_id, raw).await {
        Ok(InsertEventOutcome::Inserted(id)) => id,
        Ok(InsertEventOutcome::Duplicate) => {
            return match state.store.find_job_by_external_event(update_id).await {
                Ok(Some(job)) => json_response(
                    StatusCode::OK,
                    WebhookResponse::ok_with_job_and_message(job.id, "already processing"),
                ),
                Ok(None) => json_response(StatusCode::OK, WebhookResponse::ok_with_message("already received")),
                Err(err) => {
                    warn!(error = %err, "store error looking up duplicate event's job");
                    json_response(StatusCode::OK, WebhookResponse::ok_with_message("already received"))
                }
            };
        }
        Err(err) => {
            warn!(error = %err, "store error inserting inbound event");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    // 5. Create job (status = QUEUED). This commits before we touch the
    // queue, so a worker can never observe a published id with no row.
    let job_id = match state.store.create_job(Some(event_id), chat_id, user_id, prompt).await {
        Ok(id) => id,
        Err(err) => {
            warn!(error = %err, "store error creating job");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    info!(%job_id, chat_id, "job created, publishing first attempt");

    // 7. Publish. On failure, compensate by marking the job FAILED rather
    // than leaving it QUEUED-but-unpublished.
    if let Err(err) = state.queue.publish(job_id, 1).await {
        warn!(%job_id, error = %err, "queue publish failed after job commit, marking job failed");
        if let Err(fail_err) = state.store.fail_unstarted_job(job_id, &err.to_string()).await {
            warn!(%job_id, error = %fail_err, "failed to mark job failed after publish error");
        }
        return json_response(
            StatusCode::OK,
            WebhookResponse::ok_with_job_and_message(job_id, "queue error, please try again"),
        );
    }

    // 8. Respond immediately; the "working on it" notification goes
    // through the bounded notifier channel instead of a detached task.
    notify_best_effort(state, chat_id, "Working on it...").await;
    json_response(StatusCode::OK, WebhookResponse::ok_with_job(job_id))
}

async fn notify_best_effort(state: &IngestState, chat_id: i64, text: impl Into<String>) {
    if let Err(err) = state.notifier.notify(chat_id, text).await {
        warn!(chat_id, error = %err, "failed to queue outbound notification");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use expozy_core::{notification_channel, JobId};
    use expozy_queue::InMemoryQueue;
    use expozy_store::InMemoryStore;
    use http_body_util::BodyExt;
    use std::sync::Arc;
    use std::time::Duration;
    use tower::ServiceExt;

    fn test_state() -> IngestState {
        let (notifier, mut rx) = notification_channel(64);
        tokio::spawn(async move { while rx.recv().await.is_some() {} });
        IngestState::new(
            Arc::new(InMemoryStore::new()),
            Arc::new(InMemoryQueue::new()),
            "shh",
            notifier,
            Duration::from_secs(2),
        )
    }

    async fn send(app: Router, secret: Option<&str>, body: serde_json::Value) -> (StatusCode, serde_json::Value) {
        let mut request = Request::builder().method("POST").uri("/telegram/webhook");
        if let Some(secret) = secret {
            request = request.header("X-Telegram-Bot-Api-Secret-Token", secret);
        }
        let request = request
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let json = if bytes.is_empty() {
            serde_json::Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, json)
    }

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

    #[tokio::test]
    async fn bad_secret_is_rejected_with_no_side_effects() {
        let state = test_state();
        let app = router("/telegram/webhook", state.clone());
        let (status, _) = send(app, Some("wrong"), telegram_body(1, "/prompt hi")).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert!(state.store.find_job_by_external_event(1).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn malformed_body_is_bad_request() {
        let state = test_state();
        let app = router("/telegram/webhook", state);
        let mut request = Request::builder().method("POST").uri("/telegram/webhook");
        request = request.header("X-Telegram-Bot-Api-Secret-Token", "shh");
        let request = request.body(Body::from("not json")).unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn happy_path_creates_exactly_one_job() {
        let state = test_state();
        let app = router("/telegram/webhook", state.clone());
        let (status, json) = send(app, Some("shh"), telegram_body(100, "/prompt Build a landing page")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["ok"], serde_json::json!(true));
        assert!(json["job_id"].is_string());

        let job_id: JobId = JobId::parse(json["job_id"].as_str().unwrap()).unwrap();
        let job = state.store.find_job(job_id).await.unwrap().unwrap();
        assert_eq!(job.prompt, "Build a landing page");
    }

    #[tokio::test]
    async fn duplicate_delivery_creates_only_one_job() {
        let state = test_state();
        let app = router("/telegram/webhook", state.clone());
        let body = telegram_body(200, "/prompt Build a shop page");

        let (status1, json1) = send(app.clone(), Some("shh"), body.clone()).await;
        let (status2, json2) = send(app, Some("shh"), body).await;

        assert_eq!(status1, StatusCode::OK);
        assert_eq!(status2, StatusCode::OK);
        assert_eq!(json1["job_id"], json2["job_id"]);
    }

    #[tokio::test]
    async fn empty_prompt_does_not_create_a_job() {
        let state = test_state();
        let app = router("/telegram/webhook", state.clone());
        let (status, json) = send(app, Some("shh"), telegram_body(300, "/prompt   ")).await;
        assert_eq!(status, StatusCode::OK);
        assert!(json["job_id"].is_null());
        assert!(state.store.find_job_by_external_event(300).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn control_command_does_not_create_a_job() {
        let state = test_state();
        let app = router("/telegram/webhook", state.clone());
        let (status, _) = send(app, Some("shh"), telegram_body(400, "/start")).await;
        assert_eq!(status, StatusCode::OK);
        assert!(state.store.find_job_by_external_event(400).await.unwrap().is_none());
    }
}
