use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Pool, Postgres, Row};

use super::{JobStore, PayloadMatch};
use crate::error::PersistenceError;
use crate::job::{Job, JobId};
use crate::state::JobState;

/// Postgres-backed job store.
#[derive(Debug, Clone)]
pub struct PostgresStore {
    pool: Pool<Postgres>,
    table_name: String,
}

impl PostgresStore {
    pub fn new(pool: Pool<Postgres>, table_name: &str) -> Self {
        Self {
            pool,
            table_name: table_name.to_string(),
        }
    }

    /// Initialize the database schema.
    pub async fn ensure_schema(&self) -> Result<(), PersistenceError> {
        let query = format!(
            r#"
            CREATE TABLE IF NOT EXISTS {t} (
                id UUID PRIMARY KEY,
                owner_id TEXT NOT NULL,
                kind TEXT NOT NULL,
                payload JSONB NOT NULL,
                status TEXT NOT NULL,
                run_at TIMESTAMPTZ,
                attempts INT NOT NULL DEFAULT 0,
                last_error TEXT,
                created_at TIMESTAMPTZ NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_{t}_due ON {t} (status, run_at, created_at);
            CREATE INDEX IF NOT EXISTS idx_{t}_owner ON {t} (owner_id, created_at);
            "#,
            t = self.table_name
        );

        sqlx::query(&query)
            .execute(&self.pool)
            .await
            .map_err(backend_err)?;

        Ok(())
    }
}

fn backend_err(e: sqlx::Error) -> PersistenceError {
    PersistenceError::Backend(e.to_string())
}

fn row_to_job(row: sqlx::postgres::PgRow) -> Job {
    let status: String = row.get("status");
    let run_at: Option<DateTime<Utc>> = row.get("run_at");
    let last_error: Option<String> = row.get("last_error");
    let state = match status.as_str() {
        "running" => JobState::Running,
        "completed" => JobState::Completed,
        "failed" => JobState::Failed {
            error: last_error.clone().unwrap_or_default(),
        },
        // "queued"; a queued row always carries run_at.
        _ => JobState::Queued {
            run_at: run_at.unwrap_or_else(Utc::now),
        },
    };
    Job {
        id: row.get::<JobId, _>("id"),
        owner_id: row.get("owner_id"),
        kind: row.get("kind"),
        payload: row.get("payload"),
        state,
        attempts: row.get::<i32, _>("attempts") as u32,
        last_error,
        created_at: row.get("created_at"),
    }
}

fn state_columns(state: &JobState) -> (&'static str, Option<DateTime<Utc>>) {
    match state {
        JobState::Queued { run_at } => ("queued", Some(*run_at)),
        JobState::Running => ("running", None),
        JobState::Completed => ("completed", None),
        JobState::Failed { .. } => ("failed", None),
    }
}

#[async_trait]
impl JobStore for PostgresStore {
    async fn create(&self, job: Job) -> Result<Job, PersistenceError> {
        let (status, run_at) = state_columns(&job.state);
        let query = format!(
            r#"
            INSERT INTO {} (id, owner_id, kind, payload, status, run_at, attempts, last_error, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
            self.table_name
        );

        sqlx::query(&query)
            .bind(job.id)
            .bind(&job.owner_id)
            .bind(&job.kind)
            .bind(&job.payload)
            .bind(status)
            .bind(run_at)
            .bind(job.attempts as i32)
            .bind(&job.last_error)
            .bind(job.created_at)
            .execute(&self.pool)
            .await
            .map_err(backend_err)?;

        Ok(job)
    }

    async fn find_next_due(&self, now: DateTime<Utc>) -> Result<Option<Job>, PersistenceError> {
        let query = format!(
            r#"
            SELECT id, owner_id, kind, payload, status, run_at, attempts, last_error, created_at
            FROM {}
            WHERE status = 'queued' AND run_at <= $1
            ORDER BY created_at ASC
            LIMIT 1
            "#,
            self.table_name
        );

        let row = sqlx::query(&query)
            .bind(now)
            .fetch_optional(&self.pool)
            .await
            .map_err(backend_err)?;

        Ok(row.map(row_to_job))
    }

    async fn claim(&self, id: JobId) -> Result<Option<Job>, PersistenceError> {
        // Conditional claim: of two racing triggers, at most one row is
        // affected; the loser gets no row back.
        let query = format!(
            r#"
            UPDATE {} SET status = 'running', run_at = NULL
            WHERE id = $1 AND status = 'queued'
            RETURNING id, owner_id, kind, payload, status, run_at, attempts, last_error, created_at
            "#,
            self.table_name
        );

        let row = sqlx::query(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(backend_err)?;

        Ok(row.map(row_to_job))
    }

    async fn update(&self, job: &Job) -> Result<Job, PersistenceError> {
        let (status, run_at) = state_columns(&job.state);
        let query = format!(
            r#"
            UPDATE {} SET status = $2, run_at = $3, attempts = $4, last_error = $5
            WHERE id = $1
            RETURNING id, owner_id, kind, payload, status, run_at, attempts, last_error, created_at
            "#,
            self.table_name
        );

        let row = sqlx::query(&query)
            .bind(job.id)
            .bind(status)
            .bind(run_at)
            .bind(job.attempts as i32)
            .bind(&job.last_error)
            .fetch_optional(&self.pool)
            .await
            .map_err(backend_err)?;

        row.map(row_to_job).ok_or(PersistenceError::NotFound(job.id))
    }

    async fn list_by_owner(
        &self,
        owner_id: &str,
        filter: Option<&PayloadMatch>,
    ) -> Result<Vec<Job>, PersistenceError> {
        let rows = match filter {
            Some(m) => {
                let query = format!(
                    r#"
                    SELECT id, owner_id, kind, payload, status, run_at, attempts, last_error, created_at
                    FROM {}
                    WHERE owner_id = $1 AND payload -> $2 = $3
                    ORDER BY created_at DESC
                    "#,
                    self.table_name
                );
                sqlx::query(&query)
                    .bind(owner_id)
                    .bind(&m.key)
                    .bind(&m.value)
                    .fetch_all(&self.pool)
                    .await
                    .map_err(backend_err)?
            }
            None => {
                let query = format!(
                    r#"
                    SELECT id, owner_id, kind, payload, status, run_at, attempts, last_error, created_at
                    FROM {}
                    WHERE owner_id = $1
                    ORDER BY created_at DESC
                    "#,
                    self.table_name
                );
                sqlx::query(&query)
                    .bind(owner_id)
                    .fetch_all(&self.pool)
                    .await
                    .map_err(backend_err)?
            }
        };

        Ok(rows.into_iter().map(row_to_job).collect())
    }
}
