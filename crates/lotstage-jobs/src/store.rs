use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::PersistenceError;
use crate::job::{Job, JobId};

pub mod memory;

#[cfg(feature = "postgres")]
pub mod postgres;

/// Narrows an owner listing to jobs whose payload field equals a value.
#[derive(Debug, Clone, PartialEq)]
pub struct PayloadMatch {
    pub key: String,
    pub value: serde_json::Value,
}

impl PayloadMatch {
    pub fn new(key: impl Into<String>, value: serde_json::Value) -> Self {
        Self {
            key: key.into(),
            value,
        }
    }

    /// Jobs referencing a staging project, the filter the status UI uses.
    pub fn project(project_id: &str) -> Self {
        Self::new("projectId", serde_json::Value::String(project_id.to_string()))
    }
}

/// Persistent storage for jobs.
///
/// Single-record reads and updates are assumed atomic; the engine requires
/// no multi-row coordination beyond that.
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Persist a new job. The record arrives `Queued` with zero attempts.
    async fn create(&self, job: Job) -> Result<Job, PersistenceError>;

    /// The oldest `Queued` job with `run_at <= now`, by creation order.
    /// FIFO, no priority field.
    async fn find_next_due(&self, now: DateTime<Utc>) -> Result<Option<Job>, PersistenceError>;

    /// Conditionally move a job from `Queued` to `Running`.
    ///
    /// Must be atomic with respect to concurrent claims: of two callers
    /// racing on the same id, exactly one receives the job. Returns `None`
    /// when the job is no longer `Queued` (already claimed, terminal, or
    /// gone) — the caller treats that as "nothing to do".
    async fn claim(&self, id: JobId) -> Result<Option<Job>, PersistenceError>;

    /// Persist the full mutated record.
    async fn update(&self, job: &Job) -> Result<Job, PersistenceError>;

    /// Jobs for one owner, newest first, optionally filtered by payload.
    async fn list_by_owner(
        &self,
        owner_id: &str,
        filter: Option<&PayloadMatch>,
    ) -> Result<Vec<Job>, PersistenceError>;
}
