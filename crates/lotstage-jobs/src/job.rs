use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::state::JobState;

/// Unique identifier for a job, assigned at creation.
pub type JobId = Uuid;

/// One unit of deferred work.
///
/// Created `Queued` by [`crate::queue::JobQueue::enqueue`]; mutated only by
/// the queue engine through [`JobState`] transitions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    /// The requesting principal. Association only, no ownership semantics.
    pub owner_id: String,
    /// Selects the handler that processes this job.
    pub kind: String,
    /// Passed verbatim to the handler.
    pub payload: serde_json::Value,
    #[serde(flatten)]
    pub state: JobState,
    /// Execution attempts made so far. Increments by one per failure.
    pub attempts: u32,
    pub last_error: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Job {
    /// A fresh `Queued` job, eligible from `run_at`.
    pub fn new(
        owner_id: impl Into<String>,
        kind: impl Into<String>,
        payload: serde_json::Value,
        run_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            owner_id: owner_id.into(),
            kind: kind.into(),
            payload,
            state: JobState::Queued { run_at },
            attempts: 0,
            last_error: None,
            created_at: Utc::now(),
        }
    }
}
