//! The job lifecycle as a tagged state with explicit transition functions.
//!
//! A job is `Queued` (eligible once `run_at` has passed), `Running` (claimed
//! by the engine), or terminal (`Completed` / `Failed`). Every mutation goes
//! through a transition function, so a `Completed -> Running` style edit is
//! a compile-time/`InvalidTransition` impossibility rather than a stray
//! column write.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Lifecycle state of a job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum JobState {
    /// Waiting to be picked up; not eligible before `run_at`.
    Queued { run_at: DateTime<Utc> },
    /// Claimed by the engine; its handler is executing.
    Running,
    /// Handler succeeded. Terminal.
    Completed,
    /// Retries exhausted. Terminal.
    Failed { error: String },
}

/// Attempted state change that the lifecycle does not allow.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid job transition: {from} -> {to}")]
pub struct InvalidTransition {
    pub from: &'static str,
    pub to: &'static str,
}

impl JobState {
    pub fn name(&self) -> &'static str {
        match self {
            JobState::Queued { .. } => "queued",
            JobState::Running => "running",
            JobState::Completed => "completed",
            JobState::Failed { .. } => "failed",
        }
    }

    /// Terminal states are never selected or mutated again.
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobState::Completed | JobState::Failed { .. })
    }

    /// Eligible for selection at `now`.
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        matches!(self, JobState::Queued { run_at } if *run_at <= now)
    }

    /// `Queued -> Running`. The claim step.
    pub fn claim(&self) -> Result<JobState, InvalidTransition> {
        match self {
            JobState::Queued { .. } => Ok(JobState::Running),
            other => Err(InvalidTransition {
                from: other.name(),
                to: "running",
            }),
        }
    }

    /// `Running -> Completed`.
    pub fn complete(&self) -> Result<JobState, InvalidTransition> {
        match self {
            JobState::Running => Ok(JobState::Completed),
            other => Err(InvalidTransition {
                from: other.name(),
                to: "completed",
            }),
        }
    }

    /// `Running -> Queued` (retry with backoff) or `Running -> Failed` once
    /// `attempts` has reached the ceiling. `attempts` must already count the
    /// failure being recorded.
    pub fn reject(
        &self,
        error: &str,
        attempts: u32,
        now: DateTime<Utc>,
        policy: &RetryPolicy,
    ) -> Result<JobState, InvalidTransition> {
        match self {
            JobState::Running => {
                if attempts >= policy.failure_ceiling {
                    Ok(JobState::Failed {
                        error: error.to_string(),
                    })
                } else {
                    Ok(JobState::Queued {
                        run_at: now + policy.backoff(attempts),
                    })
                }
            }
            other => Err(InvalidTransition {
                from: other.name(),
                to: "queued",
            }),
        }
    }
}

/// Retry policy: how many failures a job survives and how long it waits
/// between them.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Attempt count at which a failing job becomes terminally `Failed`.
    pub failure_ceiling: u32,
    /// Delay added per recorded attempt.
    pub backoff_step: Duration,
    /// Upper bound on the delay.
    pub backoff_cap: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            failure_ceiling: 5,
            backoff_step: Duration::seconds(60),
            backoff_cap: Duration::seconds(600),
        }
    }
}

impl RetryPolicy {
    /// Linear backoff: one step per attempt, capped.
    pub fn backoff(&self, attempts: u32) -> Duration {
        (self.backoff_step * attempts as i32).min(self.backoff_cap)
    }
}
