//! In-memory `Store` used by Ingest/Worker unit tests so they don't need a
//! live Postgres: a `Mutex`-guarded map plus linear scans, good enough
//! for test scale.

use crate::error::{StoreError, StoreResult};
use crate::models::{Attempt, FailureTransition, InsertEventOutcome, Job};
use crate::traits::Store;
use async_trait::async_trait;
use chrono::Utc;
use expozy_core::{AttemptId, EventId, JobId, JobStatus};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Mutex;
use uuid::Uuid;

#[derive(Default)]
struct Inner {
    events_by_external_id: HashMap<i64, EventId>,
    jobs: HashMap<JobId, Job>,
    job_by_event: HashMap<EventId, JobId>,
    attempts: HashMap<JobId, Vec<Attempt>>,
}

/// An in-memory [`Store`] for tests, backed by a single `Mutex<Inner>`.
#[derive(Default)]
pub struct InMemoryStore {
    inner: Mutex<Inner>,
}

impl InMemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Store for InMemoryStore {
    async fn insert_event_once(
        &self,
        external_id: i64,
        _raw: Value,
    ) -> StoreResult<InsertEventOutcome> {
        let mut inner = self.inner.lock().unwrap();
        if inner.events_by_external_id.contains_key(&external_id) {
            return Ok(InsertEventOutcome::Duplicate);
        }
        let id = EventId::new();
        inner.events_by_external_id.insert(external_id, id);
        Ok(InsertEventOutcome::Inserted(id))
    }

    async fn find_job_by_external_event(&self, external_id: i64) -> StoreResult<Option<Job>> {
        let inner = self.inner.lock().unwrap();
        let Some(event_id) = inner.events_by_external_id.get(&external_id) else {
            return Ok(None);
        };
        let Some(job_id) = inner.job_by_event.get(event_id) else {
            return Ok(None);
        };
        Ok(inner.jobs.get(job_id).cloned())
    }

    async fn create_job(
        &self,
        event_id: Option<EventId>,
        chat_id: i64,
        user_id: i64,
        prompt: &str,
    ) -> StoreResult<JobId> {
        let mut inner = self.inner.lock().unwrap();
        let id = JobId::new();
        let now = Utc::now();
        let job = Job {
            id,
            inbound_event_id: event_id,
            chat_id,
            user_id,
            prompt: prompt.to_string(),
            status: JobStatus::Queued,
            attempt_count: 0,
            created_at: now,
            updated_at: now,
            bundle_id: None,
            preview_url: None,
            error_message: None,
            raw_model_response: None,
            validation_report: None,
        };
        inner.jobs.insert(id, job);
        if let Some(event_id) = event_id {
            inner.job_by_event.insert(event_id, id);
        }
        Ok(id)
    }

    async fn find_job(&self, job_id: JobId) -> StoreResult<Option<Job>> {
        Ok(self.inner.lock().unwrap().jobs.get(&job_id).cloned())
    }

    async fn open_attempt(
        &self,
        job_id: JobId,
        attempt_no: i32,
        provider: &str,
    ) -> StoreResult<AttemptId> {
        let mut inner = self.inner.lock().unwrap();
        let now = Utc::now();
        {
            let job = inner
                .jobs
                .get_mut(&job_id)
                .ok_or_else(|| StoreError::NotFound(job_id.to_string()))?;
            if job.status != JobStatus::Queued {
                return Err(StoreError::Conflict(format!("job {job_id} is not QUEUED")));
            }
            job.status = JobStatus::Running;
            job.attempt_count = attempt_no;
            job.updated_at = now;
        }

        let attempt_id = AttemptId::new();
        let attempt = Attempt {
            id: attempt_id,
            job_id,
            attempt_no,
            started_at: now,
            finished_at: None,
            outcome: None,
            error_detail: None,
            provider_status_code: None,
            duration_ms: None,
            provider: provider.to_string(),
        };
        inner.attempts.entry(job_id).or_default().push(attempt);
        Ok(attempt_id)
    }

    async fn close_attempt_success(
        &self,
        attempt_id: AttemptId,
        job_id: JobId,
        bundle_id: Uuid,
        preview_url: &str,
        raw_response: Option<&str>,
    ) -> StoreResult<()> {
        let mut inner = self.inner.lock().unwrap();
        let now = Utc::now();
        {
            let job = inner
                .jobs
                .get_mut(&job_id)
                .ok_or_else(|| StoreError::NotFound(job_id.to_string()))?;
            if job.status != JobStatus::Running {
                return Err(StoreError::Conflict(format!(
                    "job {job_id} is not RUNNING"
                )));
            }
            job.status = JobStatus::Completed;
            job.bundle_id = Some(bundle_id);
            job.preview_url = Some(preview_url.to_string());
            job.raw_model_response = raw_response.map(|r| Value::String(r.to_string()));
            job.updated_at = now;
        }
        Self::seal_attempt_locked(&mut inner, job_id, attempt_id, now, |a| {
            a.outcome = Some(expozy_core::AttemptOutcome::Success);
        })
    }

    async fn close_attempt_failure(
        &self,
        attempt_id: AttemptId,
        job_id: JobId,
        error: &str,
        status_code: Option<i32>,
        raw_response: Option<&str>,
        validation_report: Option<Value>,
        next: FailureTransition,
    ) -> StoreResult<()> {
        let mut inner = self.inner.lock().unwrap();
        let now = Utc::now();
        {
            let job = inner
                .jobs
                .get_mut(&job_id)
                .ok_or_else(|| StoreError::NotFound(job_id.to_string()))?;
            if job.status != JobStatus::Running {
                return Err(StoreError::Conflict(format!(
                    "job {job_id} is not RUNNING"
                )));
            }
            job.status = match next {
                FailureTransition::Terminal => JobStatus::Failed,
                FailureTransition::Requeue => JobStatus::Queued,
            };
            job.error_message = Some(error.to_string());
            job.raw_model_response = raw_response.map(|r| Value::String(r.to_string()));
            job.validation_report = validation_report;
            job.updated_at = now;
        }
        Self::seal_attempt_locked(&mut inner, job_id, attempt_id, now, |a| {
            a.outcome = Some(expozy_core::AttemptOutcome::Fail);
            a.error_detail = Some(error.to_string());
            a.provider_status_code = status_code;
        })
    }

    async fn list_attempts(&self, job_id: JobId) -> StoreResult<Vec<Attempt>> {
        Ok(self
            .inner
            .lock()
            .unwrap()
            .attempts
            .get(&job_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn fail_unstarted_job(&self, job_id: JobId, error: &str) -> StoreResult<()> {
        let mut inner = self.inner.lock().unwrap();
        let job = inner
            .jobs
            .get_mut(&job_id)
            .ok_or_else(|| StoreError::NotFound(job_id.to_string()))?;
        if job.status != JobStatus::Queued {
            return Err(StoreError::Conflict(format!("job {job_id} is not QUEUED")));
        }
        job.status = JobStatus::Failed;
        job.error_message = Some(error.to_string());
        job.updated_at = Utc::now();
        Ok(())
    }
}

impl InMemoryStore {
    fn seal_attempt_locked(
        inner: &mut Inner,
        job_id: JobId,
        attempt_id: AttemptId,
        now: chrono::DateTime<Utc>,
        apply: impl FnOnce(&mut Attempt),
    ) -> StoreResult<()> {
        let attempts = inner
            .attempts
            .get_mut(&job_id)
            .ok_or_else(|| StoreError::NotFound(job_id.to_string()))?;
        let attempt = attempts
            .iter_mut()
            .find(|a| a.id == attempt_id && a.outcome.is_none())
            .ok_or_else(|| StoreError::Conflict(format!("attempt {attempt_id} is not open")))?;
        attempt.finished_at = Some(now);
        attempt.duration_ms = Some((now - attempt.started_at).num_milliseconds());
        apply(attempt);
        Ok(())
    }
}
