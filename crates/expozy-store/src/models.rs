//! Row types for the three durable entities the Store owns.

use chrono::{DateTime, Utc};
use expozy_core::{AttemptId, AttemptOutcome, EventId, JobId, JobStatus};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// One row per delivery from the chat transport. Never mutated after
/// insert; the UNIQUE constraint on `external_update_id` is what makes
/// webhook redelivery idempotent.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct InboundEvent {
    pub id: EventId,
    pub external_update_id: i64,
    pub received_at: DateTime<Utc>,
    pub raw: serde_json::Value,
}

/// One row per distinct accepted prompt. Mutated only by the Worker
/// until it reaches a terminal status.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Job {
    pub id: JobId,
    pub inbound_event_id: Option<EventId>,
    pub chat_id: i64,
    pub user_id: i64,
    pub prompt: String,
    pub status: JobStatus,
    pub attempt_count: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub bundle_id: Option<uuid::Uuid>,
    pub preview_url: Option<String>,
    pub error_message: Option<String>,
    pub raw_model_response: Option<serde_json::Value>,
    pub validation_report: Option<serde_json::Value>,
}

impl Job {
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}

/// One row per Worker execution of a Job.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Attempt {
    pub id: AttemptId,
    pub job_id: JobId,
    pub attempt_no: i32,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub outcome: Option<AttemptOutcome>,
    pub error_detail: Option<String>,
    pub provider_status_code: Option<i32>,
    pub duration_ms: Option<i64>,
    pub provider: String,
}

/// Result of [`crate::Store::insert_event_once`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertEventOutcome {
    Inserted(EventId),
    Duplicate,
}

/// Terminal direction requested by [`crate::Store::close_attempt_failure`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureTransition {
    /// Seal the attempt FAIL and move the job to FAILED.
    Terminal,
    /// Seal the attempt FAIL and move the job back to QUEUED for retry.
    Requeue,
}
