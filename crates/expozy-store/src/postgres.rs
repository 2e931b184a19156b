//! Postgres-backed [`Store`] implementation.

use crate::error::{StoreError, StoreResult};
use crate::models::{Attempt, FailureTransition, InsertEventOutcome, Job};
use crate::traits::Store;
use async_trait::async_trait;
use chrono::Utc;
use expozy_core::{AttemptId, EventId, JobId, JobStatus};
use serde_json::Value;
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{PgPool, Row};
use std::time::Duration;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Connection pool + migration runner backing the durable `Store`.
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Connects with pool sizing taken from configuration and runs no
    /// migrations itself — callers invoke [`Self::run_migrations`]
    /// explicitly during startup, before traffic is accepted.
    pub async fn connect(
        url: &str,
        min_connections: u32,
        max_connections: u32,
        connect_timeout: Duration,
        idle_timeout: Duration,
    ) -> StoreResult<Self> {
        info!("connecting to Postgres store");
        let pool = PgPoolOptions::new()
            .min_connections(min_connections)
            .max_connections(max_connections)
            .acquire_timeout(connect_timeout)
            .idle_timeout(Some(idle_timeout))
            .connect(url)
            .await
            .map_err(|e| {
                warn!("failed to connect to Postgres: {e}");
                StoreError::Database(e)
            })?;
        Ok(Self { pool })
    }

    /// Wraps an existing pool, e.g. one shared with other components.
    #[must_use]
    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub async fn health_check(&self) -> StoreResult<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(StoreError::from_sqlx)?;
        Ok(())
    }

    /// Runs the SQL migrations under `migrations/` at the workspace root.
    /// Traffic must never be accepted before the schema exists.
    pub async fn run_migrations(&self) -> StoreResult<()> {
        info!("running store migrations");
        sqlx::migrate!("../../migrations")
            .run(&self.pool)
            .await
            .map_err(|e| StoreError::Database(sqlx::Error::Migrate(Box::new(e))))?;
        Ok(())
    }

    fn row_to_job(row: PgRow) -> StoreResult<Job> {
        Ok(Job {
            id: JobId::from_uuid(row.try_get("id")?),
            inbound_event_id: row
                .try_get::<Option<Uuid>, _>("inbound_event_id")?
                .map(EventId::from_uuid),
            chat_id: row.try_get("chat_id")?,
            user_id: row.try_get("user_id")?,
            prompt: row.try_get("prompt")?,
            status: row.try_get("status")?,
            attempt_count: row.try_get("attempt_count")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
            bundle_id: row.try_get("bundle_id")?,
            preview_url: row.try_get("preview_url")?,
            error_message: row.try_get("error_message")?,
            raw_model_response: row.try_get("raw_model_response")?,
            validation_report: row.try_get("validation_report")?,
        })
    }

    fn row_to_attempt(row: PgRow) -> StoreResult<Attempt> {
        Ok(Attempt {
            id: AttemptId::from_uuid(row.try_get("id")?),
            job_id: JobId::from_uuid(row.try_get("job_id")?),
            attempt_no: row.try_get("attempt_no")?,
            started_at: row.try_get("started_at")?,
            finished_at: row.try_get("finished_at")?,
            outcome: row.try_get("outcome")?,
            error_detail: row.try_get("error_detail")?,
            provider_status_code: row.try_get("provider_status_code")?,
            duration_ms: row.try_get("duration_ms")?,
            provider: row.try_get("provider")?,
        })
    }
}

#[async_trait]
impl Store for PostgresStore {
    async fn insert_event_once(
        &self,
        external_id: i64,
        raw: Value,
    ) -> StoreResult<InsertEventOutcome> {
        let result = sqlx::query(
            r#"
            INSERT INTO inbound_events (id, external_update_id, received_at, raw)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (external_update_id) DO NOTHING
            RETURNING id
            "#,
        )
        .bind(Uuid::now_v7())
        .bind(external_id)
        .bind(Utc::now())
        .bind(raw)
        .fetch_optional(&self.pool)
        .await
        .map_err(StoreError::from_sqlx)?;

        match result {
            Some(row) => {
                let id: Uuid = row.try_get("id").map_err(StoreError::from_sqlx)?;
                debug!(external_id, "inserted inbound event");
                Ok(InsertEventOutcome::Inserted(EventId::from_uuid(id)))
            }
            None => Ok(InsertEventOutcome::Duplicate),
        }
    }

    async fn find_job_by_external_event(&self, external_id: i64) -> StoreResult<Option<Job>> {
        let row = sqlx::query(
            r#"
            SELECT j.* FROM jobs j
            JOIN inbound_events e ON e.id = j.inbound_event_id
            WHERE e.external_update_id = $1
            "#,
        )
        .bind(external_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(StoreError::from_sqlx)?;

        row.map(Self::row_to_job).transpose()
    }

    async fn create_job(
        &self,
        event_id: Option<EventId>,
        chat_id: i64,
        user_id: i64,
        prompt: &str,
    ) -> StoreResult<JobId> {
        let id = Uuid::now_v7();
        let now = Utc::now();
        sqlx::query(
            r#"
            INSERT INTO jobs (
                id, inbound_event_id, chat_id, user_id, prompt,
                status, attempt_count, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, 'QUEUED', 0, $6, $6)
            "#,
        )
        .bind(id)
        .bind(event_id.map(EventId::into_inner))
        .bind(chat_id)
        .bind(user_id)
        .bind(prompt)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(StoreError::from_sqlx)?;

        Ok(JobId::from_uuid(id))
    }

    async fn find_job(&self, job_id: JobId) -> StoreResult<Option<Job>> {
        let row = sqlx::query("SELECT * FROM jobs WHERE id = $1")
            .bind(job_id.into_inner())
            .fetch_optional(&self.pool)
            .await
            .map_err(StoreError::from_sqlx)?;

        row.map(Self::row_to_job).transpose()
    }

    async fn open_attempt(
        &self,
        job_id: JobId,
        attempt_no: i32,
        provider: &str,
    ) -> StoreResult<AttemptId> {
        let mut tx = self.pool.begin().await.map_err(StoreError::from_sqlx)?;
        let now = Utc::now();

        let updated = sqlx::query(
            r#"
            UPDATE jobs
            SET status = 'RUNNING', attempt_count = $2, updated_at = $3
            WHERE id = $1 AND status = 'QUEUED'
            "#,
        )
        .bind(job_id.into_inner())
        .bind(attempt_no)
        .bind(now)
        .execute(&mut *tx)
        .await
        .map_err(StoreError::from_sqlx)?;

        if updated.rows_affected() == 0 {
            tx.rollback().await.ok();
            return Err(StoreError::Conflict(format!(
                "job {job_id} is not QUEUED"
            )));
        }

        let attempt_id = Uuid::now_v7();
        sqlx::query(
            r#"
            INSERT INTO attempts (id, job_id, attempt_no, started_at, provider)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(attempt_id)
        .bind(job_id.into_inner())
        .bind(attempt_no)
        .bind(now)
        .bind(provider)
        .execute(&mut *tx)
        .await
        .map_err(StoreError::from_sqlx)?;

        tx.commit().await.map_err(StoreError::from_sqlx)?;
        Ok(AttemptId::from_uuid(attempt_id))
    }

    async fn close_attempt_success(
        &self,
        attempt_id: AttemptId,
        job_id: JobId,
        bundle_id: Uuid,
        preview_url: &str,
        raw_response: Option<&str>,
    ) -> StoreResult<()> {
        let mut tx = self.pool.begin().await.map_err(StoreError::from_sqlx)?;
        let now = Utc::now();

        let updated = sqlx::query(
            r#"
            UPDATE jobs
            SET status = 'COMPLETED', bundle_id = $2, preview_url = $3,
                raw_model_response = $4, updated_at = $5
            WHERE id = $1 AND status = 'RUNNING'
            "#,
        )
        .bind(job_id.into_inner())
        .bind(bundle_id)
        .bind(preview_url)
        .bind(raw_response.map(Value::from))
        .bind(now)
        .execute(&mut *tx)
        .await
        .map_err(StoreError::from_sqlx)?;

        if updated.rows_affected() == 0 {
            tx.rollback().await.ok();
            return Err(StoreError::Conflict(format!(
                "job {job_id} is not RUNNING"
            )));
        }

        let sealed = sqlx::query(
            r#"
            UPDATE attempts
            SET outcome = 'SUCCESS', finished_at = $2,
                duration_ms = EXTRACT(EPOCH FROM ($2 - started_at)) * 1000
            WHERE id = $1 AND job_id = $3 AND outcome IS NULL
            "#,
        )
        .bind(attempt_id.into_inner())
        .bind(now)
        .bind(job_id.into_inner())
        .execute(&mut *tx)
        .await
        .map_err(StoreError::from_sqlx)?;

        if sealed.rows_affected() == 0 {
            tx.rollback().await.ok();
            return Err(StoreError::Conflict(format!(
                "attempt {attempt_id} is not open"
            )));
        }

        tx.commit().await.map_err(StoreError::from_sqlx)?;
        Ok(())
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
        let mut tx = self.pool.begin().await.map_err(StoreError::from_sqlx)?;
        let now = Utc::now();
        let new_status = match next {
            FailureTransition::Terminal => JobStatus::Failed,
            FailureTransition::Requeue => JobStatus::Queued,
        };

        let updated = sqlx::query(
            r#"
            UPDATE jobs
            SET status = $2, error_message = $3, raw_model_response = $4,
                validation_report = $5, updated_at = $6
            WHERE id = $1 AND status = 'RUNNING'
            "#,
        )
        .bind(job_id.into_inner())
        .bind(new_status)
        .bind(error)
        .bind(raw_response.map(Value::from))
        .bind(validation_report)
        .bind(now)
        .execute(&mut *tx)
        .await
        .map_err(StoreError::from_sqlx)?;

        if updated.rows_affected() == 0 {
            tx.rollback().await.ok();
            return Err(StoreError::Conflict(format!(
                "job {job_id} is not RUNNING"
            )));
        }

        let sealed = sqlx::query(
            r#"
            UPDATE attempts
            SET outcome = 'FAIL', finished_at = $2, error_detail = $3,
                provider_status_code = $4,
                duration_ms = EXTRACT(EPOCH FROM ($2 - started_at)) * 1000
            WHERE id = $1 AND job_id = $5 AND outcome IS NULL
            "#,
        )
        .bind(attempt_id.into_inner())
        .bind(now)
        .bind(error)
        .bind(status_code)
        .bind(job_id.into_inner())
        .execute(&mut *tx)
        .await
        .map_err(StoreError::from_sqlx)?;

        if sealed.rows_affected() == 0 {
            tx.rollback().await.ok();
            return Err(StoreError::Conflict(format!(
                "attempt {attempt_id} is not open"
            )));
        }

        tx.commit().await.map_err(StoreError::from_sqlx)?;
        Ok(())
    }

    async fn list_attempts(&self, job_id: JobId) -> StoreResult<Vec<Attempt>> {
        let rows = sqlx::query("SELECT * FROM attempts WHERE job_id = $1 ORDER BY attempt_no")
            .bind(job_id.into_inner())
            .fetch_all(&self.pool)
            .await
            .map_err(StoreError::from_sqlx)?;

        rows.into_iter().map(Self::row_to_attempt).collect()
    }

    async fn fail_unstarted_job(&self, job_id: JobId, error: &str) -> StoreResult<()> {
        let now = Utc::now();
        let updated = sqlx::query(
            r#"
            UPDATE jobs
            SET status = 'FAILED', error_message = $2, updated_at = $3
            WHERE id = $1 AND status = 'QUEUED'
            "#,
        )
        .bind(job_id.into_inner())
        .bind(error)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(StoreError::from_sqlx)?;

        if updated.rows_affected() == 0 {
            return Err(StoreError::Conflict(format!("job {job_id} is not QUEUED")));
        }
        Ok(())
    }
}
