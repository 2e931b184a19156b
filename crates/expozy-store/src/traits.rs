//! The `Store` contract: durable state for updates, jobs, and attempts.

use crate::error::StoreResult;
use crate::models::{Attempt, FailureTransition, InsertEventOutcome, Job};
use async_trait::async_trait;
use expozy_core::{AttemptId, EventId, JobId};
use serde_json::Value;

/// Durable state for `InboundEvent`, `Job`, and `Attempt` rows.
///
/// Every mutating operation below is atomic within a single transaction.
/// Compare-and-set on the `Job.status` column (enforced by implementations,
/// not by callers) is what makes retries and queue redelivery safe: two
/// concurrent callers racing to open the same attempt can only ever have
/// one of them succeed, the other observes [`crate::error::StoreError::Conflict`].
#[async_trait]
pub trait Store: Send + Sync {
    /// Inserts an `InboundEvent` keyed by `external_id`. A second insert
    /// with the same `external_id` returns `Duplicate` rather than
    /// raising — the UNIQUE constraint is the single source of truth for
    /// webhook idempotency.
    async fn insert_event_once(
        &self,
        external_id: i64,
        raw: Value,
    ) -> StoreResult<InsertEventOutcome>;

    /// Looks up the Job created for a given inbound event, if any.
    async fn find_job_by_external_event(&self, external_id: i64) -> StoreResult<Option<Job>>;

    /// Inserts a new Job row with `status = QUEUED`, `attempt_count = 0`.
    async fn create_job(
        &self,
        event_id: Option<EventId>,
        chat_id: i64,
        user_id: i64,
        prompt: &str,
    ) -> StoreResult<JobId>;

    /// Fetches a Job by id.
    async fn find_job(&self, job_id: JobId) -> StoreResult<Option<Job>>;

    /// Opens a new attempt for `job_id` at `attempt_no`, atomically
    /// transitioning the job `QUEUED -> RUNNING` and incrementing
    /// `attempt_count`. Fails with `Conflict` if the job is not `QUEUED`.
    async fn open_attempt(
        &self,
        job_id: JobId,
        attempt_no: i32,
        provider: &str,
    ) -> StoreResult<AttemptId>;

    /// Seals `attempt_id` as `SUCCESS` and transitions the job to
    /// `COMPLETED` with the given bundle/preview metadata. Fails with
    /// `Conflict` if the job is not `RUNNING`.
    async fn close_attempt_success(
        &self,
        attempt_id: AttemptId,
        job_id: JobId,
        bundle_id: uuid::Uuid,
        preview_url: &str,
        raw_response: Option<&str>,
    ) -> StoreResult<()>;

    /// Seals `attempt_id` as `FAIL` and, depending on `next`, transitions
    /// the job to `FAILED` (terminal) or back to `QUEUED` (retry). Fails
    /// with `Conflict` if the job is not `RUNNING`.
    #[allow(clippy::too_many_arguments)]
    async fn close_attempt_failure(
        &self,
        attempt_id: AttemptId,
        job_id: JobId,
        error: &str,
        status_code: Option<i32>,
        raw_response: Option<&str>,
        validation_report: Option<Value>,
        next: FailureTransition,
    ) -> StoreResult<()>;

    /// Lists the attempts recorded for a job, ordered by `attempt_no`.
    /// Needed by tests asserting the "contiguous prefix of attempt
    /// numbers" invariant.
    async fn list_attempts(&self, job_id: JobId) -> StoreResult<Vec<Attempt>>;

    /// Transitions a job directly `QUEUED -> FAILED` without an attempt,
    /// for Ingest's compensating "mark job FAILED" step when
    /// `Queue::publish` fails after the create-job commit. Returns
    /// `Conflict` (a no-op) if the job is no longer `QUEUED` (a worker may have already picked it
    /// up through some other path).
    async fn fail_unstarted_job(&self, job_id: JobId, error: &str) -> StoreResult<()>;
}
